//! questcore
//!
//! Deterministic, data-driven runtime for text-adventure games. A game is a
//! declarative bundle of rooms, entities, rules, event handlers and NPC
//! dialogue; the engine processes one player command per turn and produces
//! output lines plus a mutated world state.
//!
//! The hard parts live in [`rules`] (rule selection) and [`effects`] (the
//! sole state mutator) -- everything else exists to feed them or to read
//! their results.

pub mod access;
pub mod combat;
pub mod conditions;
pub mod dialogue;
pub mod effects;
pub mod error;
pub mod events;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod rng;
pub mod rules;
pub mod save;
pub mod state;

pub use error::{LoadError, LoadIssue, ResolveError};
pub use loader::load_defs;
pub use model::{Condition, Defs, Effect, EntityDef, GameDef, Id, MatchCriteria, RoomDef, RuleDef, TopicDef, Value};
pub use orchestrator::{Engine, TurnResult};
pub use rng::Rng;
pub use state::{CombatState, EntityState, Player, State};

/// Build version of the engine, surfaced by `--version` and embedded in saves.
pub const QUESTCORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sentinel written to an entity's location override to mean "carried /
/// nowhere in the world" as opposed to the empty string, which means "no
/// override, fall through to the base definition". See spec note on
/// `give_item`.
pub const NOWHERE_SENTINEL: &str = " ";
