//! Resolver: noun strings -> entity ids, scoped to the player's visibility.
//!
//! Grounded on `entity_search.rs`'s `find_item_match`: gather a candidate
//! set from the relevant scope, match case-insensitively against name,
//! name-words, id, and id-with-underscores, then report not-found or
//! ambiguous. Purely read-only.

use crate::access::{entities_in_room, get_entity_prop};
use crate::error::ResolveError;
use crate::model::{Defs, Id, Value};
use crate::state::State;

/// Resolve a single noun phrase to an entity id.
///
/// # Errors
/// `ResolveError::NotFound` when no candidate matches; `ResolveError::Ambiguity`
/// when more than one does.
pub fn resolve(state: &State, defs: &Defs, name: &str) -> Result<Id, ResolveError> {
    if name.is_empty() {
        return Err(ResolveError::NotFound(name.to_string()));
    }

    if let Some(id) = defs.entities.keys().find(|id| id.as_str() == name) {
        return Ok(id.clone());
    }

    let mut candidates: Vec<Id> = entities_in_room(state, defs, state.player.location.as_str());
    for item in &state.player.inventory {
        if !candidates.contains(item) {
            candidates.push(item.clone());
        }
    }

    let query = name.to_lowercase();
    let matches: Vec<Id> = candidates
        .into_iter()
        .filter(|id| entity_matches(state, defs, id, &query))
        .collect();

    match matches.len() {
        0 => Err(ResolveError::NotFound(name.to_string())),
        1 => Ok(matches.into_iter().next().unwrap()),
        _ => Err(ResolveError::Ambiguity {
            query: name.to_string(),
            candidates: matches,
        }),
    }
}

fn entity_matches(state: &State, defs: &Defs, id: &Id, query: &str) -> bool {
    if !defs.entities.contains_key(id) {
        return false;
    }
    let effective_name = get_entity_prop(state, defs, id.as_str(), "name").and_then(Value::as_str).unwrap_or("");
    if effective_name.to_lowercase() == query {
        return true;
    }
    if effective_name
        .split_whitespace()
        .any(|word| word.to_lowercase() == query)
    {
        return true;
    }
    if id.as_str().to_lowercase() == query {
        return true;
    }
    if id.as_str().to_lowercase() == query.replace(' ', "_") {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_defs_from_str, test_fixture_json};

    #[test]
    fn resolves_unambiguous_name() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        assert_eq!(resolve(&state, &defs, "key").unwrap(), Id::new("key"));
    }

    #[test]
    fn not_found_for_absent_noun() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let state = State::new(&defs, 1);
        assert!(matches!(resolve(&state, &defs, "sword"), Err(ResolveError::NotFound(_))));
    }

    #[test]
    fn ambiguous_when_two_share_a_word() {
        let json = test_fixture_json().replace(
            r#"{"id": "book", "kind": "item", "props": {"name": "book", "description": "An old book.", "location": "hall", "takeable": true}, "topics": {}, "rules": []}"#,
            r#"{"id": "book", "kind": "item", "props": {"name": "book", "description": "An old book.", "location": "hall", "takeable": true}, "topics": {}, "rules": []},
            {"id": "book2", "kind": "item", "props": {"name": "book", "description": "Another book.", "location": "hall", "takeable": true}, "topics": {}, "rules": []}"#,
        );
        let defs = load_defs_from_str(&json).unwrap();
        let state = State::new(&defs, 1);
        assert!(matches!(resolve(&state, &defs, "book"), Err(ResolveError::Ambiguity { .. })));
    }

    #[test]
    fn entity_moved_out_of_room_is_unresolvable_by_room_context() {
        let defs = load_defs_from_str(test_fixture_json()).unwrap();
        let mut state = State::new(&defs, 1);
        state.entity_state_mut("key").location = "garden".to_string();
        assert!(matches!(resolve(&state, &defs, "key"), Err(ResolveError::NotFound(_))));
    }
}
