//! Shared condition evaluation, used by the rules engine, event dispatch,
//! and dialogue topic gating (spec 4.E/4.G/4.H all evaluate the same
//! `Condition` variant list). An unknown tag would evaluate false; an empty
//! list is vacuously true, matching the `all()` short circuit on an empty
//! iterator.

use crate::access::{get_counter, get_entity_prop, get_flag, get_stat, has_item, in_combat};
use crate::model::{Condition, Defs};
use crate::state::State;

pub fn evaluate_all(conditions: &[Condition], state: &State, defs: &Defs) -> bool {
    conditions.iter().all(|c| evaluate(c, state, defs))
}

pub fn evaluate(condition: &Condition, state: &State, defs: &Defs) -> bool {
    match condition {
        Condition::HasItem { item } => has_item(state, item.as_str()),
        Condition::FlagSet { flag } => get_flag(state, flag),
        Condition::FlagNot { flag } => !get_flag(state, flag),
        Condition::FlagIs { flag, value } => get_flag(state, flag) == *value,
        Condition::CounterGt { counter, value } => get_counter(state, counter) > *value,
        Condition::CounterLt { counter, value } => get_counter(state, counter) < *value,
        Condition::InRoom { room } => state.player.location == *room,
        Condition::PropIs { entity, prop, value } => get_entity_prop(state, defs, entity.as_str(), prop) == Some(value),
        Condition::InCombat => in_combat(state),
        Condition::InCombatWith { enemy } => in_combat(state) && state.combat.enemy.as_ref() == Some(enemy),
        Condition::StatGt { target, stat, value } => get_stat(state, defs, target, stat) > *value,
        Condition::StatLt { target, stat, value } => get_stat(state, defs, target, stat) < *value,
        Condition::Not { inner } => !evaluate(inner, state, defs),
    }
}

/// Whether `entity`'s effective property constraints all match (used by
/// rule match criteria for `object_prop`/`target_prop`).
pub fn props_match(state: &State, defs: &Defs, entity: &str, constraints: &[(String, crate::model::Value)]) -> bool {
    constraints
        .iter()
        .all(|(key, expected)| get_entity_prop(state, defs, entity, key) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_defs_from_str, test_fixture_json};

    #[test]
    fn flag_conditions() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        assert!(evaluate(&Condition::FlagNot { flag: "x".into() }, &state, &defs));
        state.flags.insert("x".to_string(), true);
        assert!(evaluate(&Condition::FlagSet { flag: "x".into() }, &state, &defs));
        assert!(!evaluate(&Condition::FlagNot { flag: "x".into() }, &state, &defs));
    }

    #[test]
    fn not_negates() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        let cond = Condition::Not {
            inner: Box::new(Condition::FlagSet { flag: "x".into() }),
        };
        assert!(evaluate(&cond, &state, &defs));
    }

    #[test]
    fn empty_condition_list_is_vacuously_true() {
        assert!(evaluate_all(&[], &State::new(&load_defs_from_str(test_fixture_json()).unwrap(), 1), &load_defs_from_str(test_fixture_json()).unwrap()));
    }
}
