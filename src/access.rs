//! Layered read accessors.
//!
//! Every accessor that can be affected by runtime overrides consults
//! `State` first, then falls through to the base `Defs`. This function is
//! the literal implementation of spec invariants 6 and 7 ("an entity's
//! effective property / location is the override if present, else the
//! base value, else absent"). Grounded on the two-layer lookup pattern in
//! the teacher's `world.rs` (`nearby_reachable_items`, `player_room_ref`).

use crate::model::{Defs, Id, Value};
use crate::state::State;
use crate::NOWHERE_SENTINEL;

pub fn get_flag(state: &State, name: &str) -> bool {
    state.flags.get(name).copied().unwrap_or(false)
}

pub fn get_counter(state: &State, name: &str) -> i64 {
    state.counters.get(name).copied().unwrap_or(0)
}

pub fn has_item(state: &State, id: &str) -> bool {
    state.player.inventory.iter().any(|i| i.as_str() == id)
}

/// Effective property: state override shadows base definition, else absent.
pub fn get_entity_prop<'a>(state: &'a State, defs: &'a Defs, id: &str, key: &str) -> Option<&'a Value> {
    if let Some(es) = state.entity_state_ref(id) {
        if let Some(v) = es.props.get(key) {
            return Some(v);
        }
    }
    defs.entities.get(&Id::new(id)).and_then(|e| e.props.get(key))
}

/// Effective location: non-empty state override wins, else the base
/// `location` prop (as a string), else empty.
pub fn entity_location(state: &State, defs: &Defs, id: &str) -> String {
    if let Some(es) = state.entity_state_ref(id) {
        if !es.location.is_empty() {
            return es.location.clone();
        }
    }
    defs.entities
        .get(&Id::new(id))
        .and_then(|e| e.props.get("location"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Whether an entity's effective location is the "carried/nowhere" sentinel.
pub fn is_nowhere(location: &str) -> bool {
    location == NOWHERE_SENTINEL
}

/// Ids whose effective location equals `room`.
pub fn entities_in_room(state: &State, defs: &Defs, room: &str) -> Vec<Id> {
    let mut ids: Vec<Id> = defs
        .entities
        .keys()
        .filter(|id| entity_location(state, defs, id.as_str()) == room)
        .cloned()
        .collect();
    ids.sort();
    ids
}

/// Base exits, with `exit:<dir>` overrides on the `room:<id>` pseudo-entity
/// layered on top. An empty-string override deletes that direction.
pub fn room_exits(state: &State, defs: &Defs, room: &str) -> Vec<(String, Id)> {
    let mut exits: std::collections::BTreeMap<String, Id> =
        defs.room(&Id::new(room)).map(|r| r.exits.clone()).unwrap_or_default();

    let pseudo_id = format!("room:{room}");
    if let Some(es) = state.entity_state_ref(&pseudo_id) {
        for (key, value) in &es.props {
            if let Some(dir) = key.strip_prefix("exit:") {
                match value.as_str() {
                    Some("") => {
                        exits.remove(dir);
                    },
                    Some(target) => {
                        exits.insert(dir.to_string(), Id::new(target));
                    },
                    None => {},
                }
            }
        }
    }
    exits.into_iter().collect()
}

/// `target` is `"player"` or an entity id.
pub fn get_stat(state: &State, defs: &Defs, target: &str, stat: &str) -> i64 {
    if target == "player" {
        return state.player.stats.get(stat).copied().unwrap_or(0);
    }
    get_entity_prop(state, defs, target, stat)
        .map(coerce_int)
        .unwrap_or(0)
}

fn coerce_int(v: &Value) -> i64 {
    match v {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        Value::Str(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

pub fn in_combat(state: &State) -> bool {
    state.combat.active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_defs_from_str, test_fixture_json};

    #[test]
    fn override_shadows_base_prop() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        assert_eq!(get_entity_prop(&state, &defs, "key", "takeable").and_then(Value::as_bool), Some(true));
        state.entity_state_mut("key").props.insert("takeable".into(), Value::Bool(false));
        assert_eq!(get_entity_prop(&state, &defs, "key", "takeable").and_then(Value::as_bool), Some(false));
    }

    #[test]
    fn location_override_nowhere_sentinel() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        assert_eq!(entity_location(&state, &defs, "key"), "hall");
        state.entity_state_mut("key").location = NOWHERE_SENTINEL.to_string();
        assert!(is_nowhere(&entity_location(&state, &defs, "key")));
    }

    #[test]
    fn room_exit_override_closes_direction() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        assert_eq!(room_exits(&state, &defs, "hall").len(), 1);
        state
            .entity_state_mut("room:hall")
            .props
            .insert("exit:north".into(), Value::Str(String::new()));
        assert!(room_exits(&state, &defs, "hall").is_empty());
    }
}
