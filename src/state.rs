//! Mutable game state, per session.
//!
//! `State` is constructed once from `Defs.game.start_room` and mutated only
//! by [`crate::effects`]. It is the only thing that gets serialized for a
//! save (see [`crate::save`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Defs, Id, Props};

/// Per-entity runtime overrides, lazily created on first write.
///
/// `location` follows the spec's sentinel convention: empty string means "no
/// override, fall through to the base definition"; [`crate::NOWHERE_SENTINEL`]
/// means "carried / nowhere in the world"; any other non-empty string is a
/// room id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub topics: Option<BTreeMap<String, bool>>,
}

/// The player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub location: Id,
    pub inventory: Vec<Id>,
    pub stats: BTreeMap<String, i64>,
}

impl Player {
    pub fn new(start_room: Id) -> Self {
        Player {
            location: start_room,
            inventory: Vec::new(),
            stats: BTreeMap::new(),
        }
    }
}

/// Active combat, or all-zero when not in combat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatState {
    pub active: bool,
    pub enemy: Option<Id>,
    pub round: u32,
    pub player_defending: bool,
    pub previous_location: Option<Id>,
}

impl CombatState {
    /// End combat by zeroing the entire structure, per spec invariant 8.
    pub fn clear(&mut self) {
        *self = CombatState::default();
    }
}

/// The full mutable state of a running game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub turn: u64,
    pub player: Player,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub entity_state: BTreeMap<String, EntityState>,
    pub rng_seed: i64,
    #[serde(default)]
    pub rng_position: i64,
    #[serde(default)]
    pub command_log: Vec<String>,
    #[serde(default)]
    pub combat: CombatState,
}

impl State {
    /// Construct a fresh state from `defs`, copying initial stats by value.
    pub fn new(defs: &Defs, rng_seed: i64) -> Self {
        let mut player = Player::new(defs.game.start_room.clone());
        player.stats = defs.game.initial_stats.clone();
        State {
            turn: 0,
            player,
            flags: BTreeMap::new(),
            counters: BTreeMap::new(),
            entity_state: BTreeMap::new(),
            rng_seed,
            rng_position: 0,
            command_log: Vec::new(),
            combat: CombatState::default(),
        }
    }

    /// Construct a blank state with no game loaded, for reconstruction from
    /// a save file where field values are supplied separately.
    pub fn new_empty(rng_seed: i64) -> Self {
        State {
            turn: 0,
            player: Player::new(Id::from("")),
            flags: BTreeMap::new(),
            counters: BTreeMap::new(),
            entity_state: BTreeMap::new(),
            rng_seed,
            rng_position: 0,
            command_log: Vec::new(),
            combat: CombatState::default(),
        }
    }

    /// Get or create the override slot for an entity (or the `room:<id>`
    /// pseudo-entity used for exit overrides).
    pub fn entity_state_mut(&mut self, id: &str) -> &mut EntityState {
        self.entity_state.entry(id.to_string()).or_default()
    }

    pub fn entity_state_ref(&self, id: &str) -> Option<&EntityState> {
        self.entity_state.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_defs_from_str;

    #[test]
    fn new_state_copies_initial_stats() {
        let defs = load_defs_from_str(crate::loader::test_fixture_json()).unwrap();
        let state = State::new(&defs, 42);
        assert_eq!(state.player.stats.get("hp"), Some(&10));
        assert_eq!(state.player.location, defs.game.start_room);
        assert!(state.entity_state.is_empty());
    }
}
