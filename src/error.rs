//! Typed error surfaces.
//!
//! Load-time errors are fatal and collected in one pass ([`LoadError`]);
//! runtime errors are recoverable and normally become player-visible output
//! lines rather than `Result::Err`s (see `crate::orchestrator`). The one
//! runtime error that needs a typed shape is resolver failure, because the
//! orchestrator must distinguish "resolved" from "not resolved" before it
//! can decide whether to fall back to raw strings.

use thiserror::Error;

use crate::model::Id;

/// One problem found while validating a loaded game. Multiple issues are
/// collected before the loader gives up, per spec 7.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadIssue {
    #[error("missing game definition")]
    MissingGame,
    #[error("room '{room}' has exit '{direction}' targeting undefined room '{target}'")]
    UnknownExitTarget { room: String, direction: String, target: String },
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),
    #[error("rule '{rule}' references undefined entity/room '{reference}'")]
    DanglingReference { rule: String, reference: String },
    #[error("start room '{0}' is not defined")]
    UnknownStartRoom(String),
    #[error("failed to parse {file}: {message}")]
    ParseError { file: String, message: String },
}

/// All fatal problems found while loading a game; refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load game ({} issue(s)): {}", .0.len(), render_issues(.0))]
pub struct LoadError(pub Vec<LoadIssue>);

fn render_issues(issues: &[LoadIssue]) -> String {
    issues.iter().map(std::string::ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Resolver failure: a noun string did not resolve to exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("you don't see \"{0}\" here")]
    NotFound(String),
    #[error("which {query}? ({})", candidates.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", "))]
    Ambiguity { query: String, candidates: Vec<Id> },
}

impl ResolveError {
    pub fn query(&self) -> &str {
        match self {
            ResolveError::NotFound(q) => q,
            ResolveError::Ambiguity { query, .. } => query,
        }
    }
}
