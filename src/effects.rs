//! Effect application: the sole state mutator.
//!
//! Generalizes the teacher's `trigger/action.rs` (`TriggerAction` /
//! `dispatch_action`, a tagged enum matched by a free function that
//! mutates `AmbleWorld` one variant at a time) into the spec's effect
//! table. Each effect is atomic; `stop` halts iteration; unknown types are
//! ignored for forward compatibility (spec 5).

use crate::access::{get_entity_prop, get_stat};
use crate::model::{Defs, Effect, Value};
use crate::state::State;
use crate::NOWHERE_SENTINEL;

/// Who is acting this effect list: the player, or an enemy id during its
/// combat sub-turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Player,
    Enemy(String),
}

/// Read-only context carried alongside mutation: the verb/object/target
/// that produced this effect list, plus who is acting.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    pub verb: String,
    pub object_id: String,
    pub target_id: String,
    pub actor: Option<Actor>,
}

/// Outcome of applying an effect list: events raised for the next dispatch
/// pass, plus output lines produced along the way.
#[derive(Debug, Default)]
pub struct ApplyResult {
    pub events: Vec<String>,
    pub output: Vec<String>,
}

/// Apply `effects` in order, mutating `state`. Returns raised events and
/// output lines. Stops early on `Effect::Stop`.
pub fn apply(state: &mut State, defs: &Defs, effects: &[Effect], ctx: &Ctx) -> ApplyResult {
    let mut result = ApplyResult::default();

    for effect in effects {
        match effect {
            Effect::Say { text } => {
                result.output.push(interpolate(text, state, defs, ctx));
            },
            Effect::GiveItem { item } => {
                let item = interpolate(item, state, defs, ctx);
                if !state.player.inventory.iter().any(|i| i.as_str() == item) {
                    state.player.inventory.push(item.clone().into());
                }
                state.entity_state_mut(&item).location = NOWHERE_SENTINEL.to_string();
                result.events.push("item_taken".to_string());
            },
            Effect::RemoveItem { item } => {
                let item = interpolate(item, state, defs, ctx);
                if let Some(pos) = state.player.inventory.iter().position(|i| i.as_str() == item) {
                    state.player.inventory.remove(pos);
                }
                result.events.push("item_dropped".to_string());
            },
            Effect::SetFlag { flag, value } => {
                state.flags.insert(flag.clone(), *value);
                result.events.push("flag_changed".to_string());
            },
            Effect::IncCounter { counter, amount } => {
                *state.counters.entry(counter.clone()).or_insert(0) += amount;
            },
            Effect::SetCounter { counter, value } => {
                state.counters.insert(counter.clone(), *value);
            },
            Effect::SetProp { entity, prop, value } => {
                state.entity_state_mut(entity).props.insert(prop.clone(), value.clone());
            },
            Effect::MoveEntity { entity, room } => {
                state.entity_state_mut(entity).location = room.clone();
                result.events.push("entity_moved".to_string());
            },
            Effect::MovePlayer { room } => {
                state.player.location = room.clone().into();
                result.events.push("room_entered".to_string());
            },
            Effect::OpenExit { room, direction, target } => {
                let pseudo = format!("room:{room}");
                state
                    .entity_state_mut(&pseudo)
                    .props
                    .insert(format!("exit:{direction}"), Value::Str(target.clone()));
            },
            Effect::CloseExit { room, direction } => {
                let pseudo = format!("room:{room}");
                state
                    .entity_state_mut(&pseudo)
                    .props
                    .insert(format!("exit:{direction}"), Value::Str(String::new()));
            },
            Effect::EmitEvent { event } => {
                result.events.push(event.clone());
            },
            Effect::StartDialogue { .. } => {
                result.events.push("dialogue_started".to_string());
            },
            Effect::StartCombat { enemy } => {
                start_combat(state, defs, enemy);
                result.events.push("combat_started".to_string());
            },
            Effect::EndCombat => {
                state.combat.clear();
                result.events.push("combat_ended".to_string());
            },
            Effect::Damage { target, amount } => {
                apply_damage(state, defs, target, *amount, &mut result);
            },
            Effect::Heal { target, amount } => {
                apply_heal(state, defs, target, *amount, &mut result);
            },
            Effect::SetStat { target, stat, value } => {
                set_stat(state, target, stat, *value);
            },
            Effect::Stop => break,
        }
    }

    result
}

fn set_stat(state: &mut State, target: &str, stat: &str, value: i64) {
    if target == "player" {
        state.player.stats.insert(stat.to_string(), value);
    } else {
        state.entity_state_mut(target).props.insert(stat.to_string(), Value::Int(value));
    }
}

fn get_current_stat(state: &State, defs: &Defs, target: &str, stat: &str) -> i64 {
    get_stat(state, defs, target, stat)
}

fn start_combat(state: &mut State, defs: &Defs, enemy: &str) {
    state.combat.active = true;
    state.combat.enemy = Some(enemy.to_string().into());
    state.combat.round = 0;
    state.combat.player_defending = false;
    state.combat.previous_location = Some(state.player.location.clone());

    for stat in ["hp", "max_hp", "attack", "defense"] {
        if state.entity_state_ref(enemy).and_then(|es| es.props.get(stat)).is_none() {
            if let Some(v) = get_entity_prop(state, defs, enemy, stat).cloned() {
                state.entity_state_mut(enemy).props.insert(stat.to_string(), v);
            }
        }
    }
    if state.entity_state_ref(enemy).and_then(|es| es.props.get("alive")).is_none() {
        state.entity_state_mut(enemy).props.insert("alive".to_string(), Value::Bool(true));
    }
}

fn apply_damage(state: &mut State, defs: &Defs, target: &str, amount: i64, result: &mut ApplyResult) {
    let current = get_current_stat(state, defs, target, "hp");
    let remaining = (current - amount).max(0);
    set_stat(state, target, "hp", remaining);
    result.events.push(format!("entity_damaged:{target}:{amount}:{remaining}"));

    if remaining == 0 {
        if target == "player" {
            state.flags.insert("game_over".to_string(), true);
            state.combat.clear();
            result.events.push("player_defeated".to_string());
        } else {
            state.entity_state_mut(target).props.insert("alive".to_string(), Value::Bool(false));
            state.combat.clear();
            result.events.push("enemy_defeated".to_string());
            result.events.push("combat_ended".to_string());
        }
    }
}

fn apply_heal(state: &mut State, defs: &Defs, target: &str, amount: i64, result: &mut ApplyResult) {
    let current = get_current_stat(state, defs, target, "hp");
    let max = if target == "player" {
        state.player.stats.get("max_hp").copied().unwrap_or(i64::MAX)
    } else {
        get_entity_prop(state, defs, target, "max_hp").and_then(Value::as_int).unwrap_or(i64::MAX)
    };
    let healed = (current + amount).min(max);
    set_stat(state, target, "hp", healed);
    result.events.push("entity_healed".to_string());
}

/// Interpolate `{verb}`, `{object}`, `{target}`, `{player.location}`,
/// `{player.inventory}`, `{room.description}`, `{object.name}`,
/// `{object.description}`, `{target.name}` templates.
pub fn interpolate(text: &str, state: &State, defs: &Defs, ctx: &Ctx) -> String {
    let mut out = text.to_string();

    let inventory_list = || {
        if state.player.inventory.is_empty() {
            "You are carrying nothing.".to_string()
        } else {
            state
                .player
                .inventory
                .iter()
                .map(|id| {
                    get_entity_prop(state, defs, id.as_str(), "name")
                        .and_then(Value::as_str)
                        .unwrap_or(id.as_str())
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let room_description = defs.room(&state.player.location).map(|r| r.description.clone()).unwrap_or_default();

    let replacements: Vec<(&str, String)> = vec![
        ("{verb}", ctx.verb.clone()),
        ("{object}", ctx.object_id.clone()),
        ("{target}", ctx.target_id.clone()),
        ("{player.location}", state.player.location.to_string()),
        ("{player.inventory}", inventory_list()),
        ("{room.description}", room_description),
        (
            "{object.name}",
            get_entity_prop(state, defs, &ctx.object_id, "name").map(Value::display_string).unwrap_or_default(),
        ),
        (
            "{object.description}",
            get_entity_prop(state, defs, &ctx.object_id, "description")
                .map(Value::display_string)
                .unwrap_or_default(),
        ),
        (
            "{target.name}",
            get_entity_prop(state, defs, &ctx.target_id, "name").map(Value::display_string).unwrap_or_default(),
        ),
    ];

    for (token, value) in replacements {
        out = out.replace(token, &value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{entity_location, is_nowhere};
    use crate::loader::{load_defs_from_str, test_fixture_json};

    fn ctx(verb: &str, object: &str) -> Ctx {
        Ctx {
            verb: verb.to_string(),
            object_id: object.to_string(),
            target_id: String::new(),
            actor: Some(Actor::Player),
        }
    }

    #[test]
    fn give_item_sets_nowhere_sentinel_and_inventory() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        let effects = vec![Effect::GiveItem { item: "key".to_string() }];
        let result = apply(&mut state, &defs, &effects, &ctx("take", "key"));
        assert_eq!(state.player.inventory, vec!["key".into()]);
        assert!(is_nowhere(&entity_location(&state, &defs, "key")));
        assert_eq!(result.events, vec!["item_taken"]);
    }

    #[test]
    fn stop_halts_iteration() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        let effects = vec![
            Effect::Say { text: "first".into() },
            Effect::Stop,
            Effect::Say { text: "second".into() },
        ];
        let result = apply(&mut state, &defs, &effects, &ctx("wait", ""));
        assert_eq!(result.output, vec!["first"]);
    }

    #[test]
    fn lethal_damage_ends_combat_and_marks_dead() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        apply(&mut state, &defs, &[Effect::StartCombat { enemy: "goblin".into() }], &ctx("attack", "goblin"));
        let result = apply(&mut state, &defs, &[Effect::Damage { target: "goblin".into(), amount: 5 }], &ctx("attack", "goblin"));
        assert!(result.events.contains(&"enemy_defeated".to_string()));
        assert!(result.events.contains(&"combat_ended".to_string()));
        assert!(!state.combat.active);
        assert_eq!(
            get_entity_prop(&state, &defs, "goblin", "alive").and_then(Value::as_bool),
            Some(false)
        );
    }

    #[test]
    fn heal_clamps_to_max_hp() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        apply(&mut state, &defs, &[Effect::StartCombat { enemy: "goblin".into() }], &ctx("attack", "goblin"));
        apply(&mut state, &defs, &[Effect::Heal { target: "goblin".into(), amount: 100 }], &ctx("attack", "goblin"));
        assert_eq!(get_stat(&state, &defs, "goblin", "hp"), 10);
    }

    #[test]
    fn interpolation_fills_templates() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        let c = ctx("take", "key");
        assert_eq!(interpolate("You {verb} the {object}.", &state, &defs, &c), "You take the key.");
        assert_eq!(interpolate("{player.inventory}", &state, &defs, &c), "You are carrying nothing.");
    }
}
