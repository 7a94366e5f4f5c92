//! Rules engine: given state + intent + resolved ids, select effects.
//!
//! Generalizes the teacher's flat global-trigger search (`trigger.rs`'s
//! `check_triggers`, a single `all()` over a fixed `Vec<Trigger>`) into the
//! spec's four-bucket, ranked, scoped search: each bucket (room, target
//! entity, object entity, global) is tried in turn and the first bucket
//! that yields any matching rule wins outright ("first match wins" -- spec
//! invariant), with ranking only breaking ties *within* a bucket.

use crate::conditions::{evaluate_all, props_match};
use crate::model::{Defs, Effect, Id, Kind, MatchCriteria, RuleDef};
use crate::state::State;

/// Result of a rules-engine pass: the effects to run, and whether anything
/// matched (vs. the orchestrator needing to fall back).
pub struct RuleOutcome {
    pub effects: Vec<Effect>,
    pub matched: bool,
}

/// Run the bucketed rule search described in spec 4.E.
pub fn select_effects(
    state: &State,
    defs: &Defs,
    verb: &str,
    object_id: Option<&Id>,
    target_id: Option<&Id>,
) -> RuleOutcome {
    let room_id = state.player.location.as_str();

    let buckets: Vec<Vec<&RuleDef>> = vec![
        defs.room(&state.player.location).map(|r| r.rules.iter().collect()).unwrap_or_default(),
        target_id
            .and_then(|id| defs.entity(id))
            .map(|e| e.rules.iter().collect())
            .unwrap_or_default(),
        object_id
            .filter(|id| Some(*id) != target_id)
            .and_then(|id| defs.entity(id))
            .map(|e| e.rules.iter().collect())
            .unwrap_or_default(),
        defs.global_rules.iter().collect(),
    ];

    for bucket in buckets {
        let mut survivors: Vec<&RuleDef> = bucket
            .into_iter()
            .filter(|rule| rule_survives(rule, state, defs, verb, object_id, target_id))
            .collect();

        if survivors.is_empty() {
            continue;
        }

        survivors.sort_by_key(|r| (u32::MAX - r.match_criteria.specificity(), -r.priority, r.source_order));

        return RuleOutcome {
            effects: survivors[0].effects.clone(),
            matched: true,
        };
    }

    RuleOutcome {
        effects: fallback_effects(defs, verb, object_id, room_id),
        matched: false,
    }
}

fn rule_survives(
    rule: &RuleDef,
    state: &State,
    defs: &Defs,
    verb: &str,
    object_id: Option<&Id>,
    target_id: Option<&Id>,
) -> bool {
    let m: &MatchCriteria = &rule.match_criteria;

    if m.verb != verb {
        return false;
    }
    if let Some(want) = &m.object {
        if Some(want) != object_id {
            return false;
        }
    }
    if let Some(want) = &m.target {
        if Some(want) != target_id {
            return false;
        }
    }
    if let Some(kind) = m.object_kind {
        match object_id.and_then(|id| defs.entity(id)) {
            Some(def) if def.kind == kind => {},
            _ => return false,
        }
    }
    if let Some(obj) = object_id {
        if !props_match(state, defs, obj.as_str(), &m.object_prop) {
            return false;
        }
    } else if !m.object_prop.is_empty() {
        return false;
    }
    if let Some(target) = target_id {
        if !props_match(state, defs, target.as_str(), &m.target_prop) {
            return false;
        }
    } else if !m.target_prop.is_empty() {
        return false;
    }

    evaluate_all(&rule.conditions, state, defs)
}

/// Emit a single `say` effect chosen from the entity -> room -> global
/// fallback cascade, or the literal default line.
fn fallback_effects(defs: &Defs, verb: &str, object_id: Option<&Id>, room_id: &str) -> Vec<Effect> {
    let entity_fallback = |id: &Id, key: &str| -> Option<String> {
        defs.entity(id)
            .and_then(|e| e.props.get("fallbacks"))
            .and_then(|v| v.as_map())
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let room_fallback = |key: &str| -> Option<String> {
        defs.room(&Id::new(room_id))
            .and_then(|r| r.fallbacks.get(key))
            .cloned()
    };

    let text = object_id
        .and_then(|id| entity_fallback(id, verb))
        .or_else(|| object_id.and_then(|id| entity_fallback(id, "default")))
        .or_else(|| room_fallback(verb))
        .or_else(|| room_fallback("default"))
        .unwrap_or_else(|| "You can't do that.".to_string());

    vec![Effect::Say { text }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_defs_from_str, test_fixture_json};

    #[test]
    fn room_rule_wins_over_fallback() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        let outcome = select_effects(&state, &defs, "take", Some(&Id::new("key")), None);
        assert!(outcome.matched);
        assert!(matches!(&outcome.effects[0], Effect::Say { text } if text.contains("carefully lift")));
    }

    #[test]
    fn no_rule_falls_back_to_default_message() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        let outcome = select_effects(&state, &defs, "take", Some(&Id::new("book")), None);
        assert!(!outcome.matched);
        assert!(matches!(&outcome.effects[0], Effect::Say { text } if text == "You can't do that."));
    }

    #[test]
    fn higher_specificity_wins_within_bucket() {
        let mut defs = load_defs_from_str(test_fixture_json()).unwrap();
        let room = defs.rooms.get_mut(&Id::new("hall")).unwrap();
        room.rules.push(RuleDef {
            id: "generic_take".to_string(),
            scope: None,
            match_criteria: MatchCriteria {
                verb: "take".to_string(),
                object: None,
                target: None,
                object_kind: None,
                object_prop: Vec::new(),
                target_prop: Vec::new(),
            },
            conditions: Vec::new(),
            effects: vec![Effect::Say { text: "generic".into() }],
            priority: 100,
            source_order: 99,
        });
        let state = State::new(&defs, 1);
        let outcome = select_effects(&state, &defs, "take", Some(&Id::new("key")), None);
        // specific rule (object set) beats the generic one even though the
        // generic rule has much higher priority.
        assert!(matches!(&outcome.effects[0], Effect::Say { text } if text.contains("carefully lift")));
    }

    #[test]
    fn equal_specificity_lower_source_order_wins() {
        let mut defs = load_defs_from_str(test_fixture_json()).unwrap();
        let room = defs.rooms.get_mut(&Id::new("hall")).unwrap();
        room.rules.push(RuleDef {
            id: "hall_take_key_2".to_string(),
            scope: None,
            match_criteria: room.rules[0].match_criteria.clone(),
            conditions: Vec::new(),
            effects: vec![Effect::Say { text: "second rule".into() }],
            priority: 0,
            source_order: 1,
        });
        let state = State::new(&defs, 1);
        let outcome = select_effects(&state, &defs, "take", Some(&Id::new("key")), None);
        assert!(matches!(&outcome.effects[0], Effect::Say { text } if text.contains("carefully lift")));
    }

    #[test]
    fn room_bucket_beats_global_bucket_even_if_global_ranks_higher() {
        let mut defs = load_defs_from_str(test_fixture_json()).unwrap();
        defs.global_rules.push(RuleDef {
            id: "global_take_key".to_string(),
            scope: None,
            match_criteria: MatchCriteria {
                verb: "take".to_string(),
                object: Some(Id::new("key")),
                target: Some(Id::new("key")),
                object_kind: None,
                object_prop: vec![("x".into(), crate::model::Value::Bool(true))],
                target_prop: Vec::new(),
            },
            conditions: Vec::new(),
            effects: vec![Effect::Say { text: "global wins?".into() }],
            priority: 1000,
            source_order: 0,
        });
        let state = State::new(&defs, 1);
        let outcome = select_effects(&state, &defs, "take", Some(&Id::new("key")), None);
        assert!(matches!(&outcome.effects[0], Effect::Say { text } if text.contains("carefully lift")));
    }
}
