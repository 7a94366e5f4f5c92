//! Parser: raw input -> structured [`Intent`].
//!
//! Implements spec 4.C's tokenization procedure directly rather than
//! reusing the teacher's `pest` grammar: the spec pins down the exact
//! algorithm (trim/lowercase, direction shortcut, two-word verb table,
//! alias table, article stripping, first-preposition split), so the
//! faithful adaptation is to encode that procedure, not to reach for a
//! grammar engine built for a different shape of language. The parser is
//! stateless, deterministic, and never fails.

/// A parsed command: verb plus up to two noun phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    pub verb: String,
    pub object: String,
    pub target: String,
}

const PREPOSITIONS: &[&str] = &["on", "at", "to", "with", "in", "from", "about"];
const ARTICLES: &[&str] = &["the", "a", "an"];

fn direction_alias(token: &str) -> Option<&'static str> {
    Some(match token {
        "n" | "north" => "north",
        "s" | "south" => "south",
        "e" | "east" => "east",
        "w" | "west" => "west",
        "ne" | "northeast" => "northeast",
        "nw" | "northwest" => "northwest",
        "se" | "southeast" => "southeast",
        "sw" | "southwest" => "southwest",
        "u" | "up" => "up",
        "d" | "down" => "down",
        _ => return None,
    })
}

fn verb_alias(token: &str) -> String {
    match token {
        "get" | "grab" | "hold" | "carry" => "take",
        "hit" | "kill" | "fight" | "strike" => "attack",
        "inv" | "i" => "inventory",
        "z" => "wait",
        "speak" | "chat" => "talk",
        other => other,
    }
    .to_string()
}

/// Parse `input` into an [`Intent`]. Never fails; unrecognized verbs pass
/// through unchanged so rules may handle them.
pub fn parse(input: &str) -> Intent {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return Intent::default();
    }

    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    if tokens.len() == 1 {
        if let Some(dir) = direction_alias(tokens[0]) {
            return Intent {
                verb: "go".to_string(),
                object: dir.to_string(),
                target: String::new(),
            };
        }
    }

    let (verb, rest_start) = two_word_verb(&tokens).unwrap_or_else(|| (verb_alias(tokens[0]), 1));

    let remainder_tokens: Vec<&str> = tokens[rest_start..]
        .iter()
        .copied()
        .filter(|t| !ARTICLES.contains(t))
        .collect();

    let (object, target) = split_on_preposition(&remainder_tokens);

    Intent { verb, object, target }
}

/// Recognize two-word verb phrases by inspecting the first two tokens.
/// Returns `(verb, tokens_consumed)` on a match.
fn two_word_verb(tokens: &[&str]) -> Option<(String, usize)> {
    if tokens.len() < 2 {
        return None;
    }
    let (a, b) = (tokens[0], tokens[1]);
    let verb = match (a, b) {
        ("look", "at" | "in" | "under") => "examine",
        ("pick", "up") => "take",
        ("talk", "to" | "with") | ("speak", "to" | "with") | ("chat", "to" | "with") => "talk",
        ("put", "on") => "wear",
        ("put", "down") => "drop",
        ("take", "off") => "remove",
        ("turn", "on") | ("switch", "on") => "activate",
        ("turn", "off") | ("switch", "off") => "deactivate",
        _ => return None,
    };
    Some((verb.to_string(), 2))
}

/// Split remaining tokens on the first preposition. Tokens before the
/// preposition become `object`; tokens after become `target`. If no
/// preposition is present, everything becomes `object`.
fn split_on_preposition(tokens: &[&str]) -> (String, String) {
    if let Some(idx) = tokens.iter().position(|t| PREPOSITIONS.contains(t)) {
        let object = tokens[..idx].join(" ");
        let target = tokens[idx + 1..].join(" ");
        (object, target)
    } else {
        (tokens.join(" "), String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty_intent() {
        assert_eq!(parse(""), Intent::default());
        assert_eq!(parse("   "), Intent::default());
    }

    #[test]
    fn single_token_direction() {
        assert_eq!(
            parse("n"),
            Intent {
                verb: "go".into(),
                object: "north".into(),
                target: String::new()
            }
        );
        assert_eq!(parse("north").object, "north");
    }

    #[test]
    fn two_word_verbs() {
        assert_eq!(parse("look at key").verb, "examine");
        assert_eq!(parse("pick up key").verb, "take");
        assert_eq!(parse("talk to barkeep").verb, "talk");
        assert_eq!(parse("put on hat").verb, "wear");
        assert_eq!(parse("put down hat").verb, "drop");
        assert_eq!(parse("take off hat").verb, "remove");
        assert_eq!(parse("turn on lamp").verb, "activate");
        assert_eq!(parse("switch off lamp").verb, "deactivate");
    }

    #[test]
    fn verb_alias_table() {
        assert_eq!(parse("get key").verb, "take");
        assert_eq!(parse("kill goblin").verb, "attack");
        assert_eq!(parse("inv").verb, "inventory");
        assert_eq!(parse("z").verb, "wait");
        assert_eq!(parse("frobnicate gadget").verb, "frobnicate");
    }

    #[test]
    fn strips_articles_and_splits_on_preposition() {
        let intent = parse("put the key in the chest");
        assert_eq!(intent.verb, "put");
        assert_eq!(intent.object, "key");
        assert_eq!(intent.target, "chest");
    }

    #[test]
    fn no_preposition_puts_everything_in_object() {
        let intent = parse("take the golden key");
        assert_eq!(intent.object, "golden key");
        assert_eq!(intent.target, "");
    }

    #[test]
    fn ask_about_topic_splits_on_about() {
        let intent = parse("ask barkeep about rumors");
        assert_eq!(intent.object, "barkeep");
        assert_eq!(intent.target, "rumors");
    }
}
