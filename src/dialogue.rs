//! NPC dialogue: topic availability and selection.
//!
//! Generalizes the teacher's mood-keyed random line lists (`npc.rs`'s
//! `Npc::random_dialogue`, keyed by `NpcState`) into the spec's
//! condition-gated topic map. Neither function here mutates state; a
//! selected topic's effects are handed to [`crate::effects::apply`] by the
//! caller.

use crate::conditions::evaluate_all;
use crate::model::{Defs, Effect};
use crate::state::State;

/// Topic keys whose `requires` conditions are all currently true, sorted
/// alphabetically (determinism source: spec 9 requires sorting before
/// rendering).
pub fn available_topics(npc: &str, state: &State, defs: &Defs) -> Vec<String> {
    let Some(def) = defs.entity(&crate::model::Id::new(npc)) else {
        return Vec::new();
    };
    let mut keys: Vec<String> = def
        .topics
        .iter()
        .filter(|(_, topic)| evaluate_all(&topic.requires, state, defs))
        .map(|(key, _)| key.clone())
        .collect();
    keys.sort();
    keys
}

/// Select a topic by key. Returns `("", [])` if the key is unknown or its
/// conditions currently fail.
pub fn select_topic(npc: &str, key: &str, state: &State, defs: &Defs) -> (String, Vec<Effect>) {
    let Some(def) = defs.entity(&crate::model::Id::new(npc)) else {
        return (String::new(), Vec::new());
    };
    match def.topics.get(key) {
        Some(topic) if evaluate_all(&topic.requires, state, defs) => (topic.text.clone(), topic.effects.clone()),
        _ => (String::new(), Vec::new()),
    }
}

/// Whether an entity has any topics at all (un-talkable otherwise).
pub fn is_talkable(npc: &str, defs: &Defs) -> bool {
    defs.entity(&crate::model::Id::new(npc)).is_some_and(|e| !e.topics.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_defs_from_str, test_fixture_json};

    #[test]
    fn topic_gated_by_flag() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        assert_eq!(available_topics("barkeep", &state, &defs), vec!["greeting".to_string()]);

        let (text, _effects) = select_topic("barkeep", "rumors", &state, &defs);
        assert!(text.is_empty());

        state.flags.insert("met_barkeep".to_string(), true);
        assert_eq!(
            available_topics("barkeep", &state, &defs),
            vec!["greeting".to_string(), "rumors".to_string()]
        );
        let (text, _) = select_topic("barkeep", "rumors", &state, &defs);
        assert!(!text.is_empty());
    }

    #[test]
    fn entity_without_topics_is_untalkable() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        assert!(!is_talkable("key", &defs));
        assert!(is_talkable("barkeep", &defs));
    }
}
