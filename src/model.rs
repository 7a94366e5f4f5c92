//! Immutable game definitions -- the vocabulary of a loaded game.
//!
//! Everything here is built once by [`crate::loader`] and never mutated
//! afterward. Runtime state (`crate::state`) shadows these values through
//! the override layering described in `crate::access`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A stable content identifier, e.g. `"hall"`, `"key"`, `"goblin"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn new(s: impl Into<String>) -> Self {
        Id(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Id {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(s)
    }
}

/// A dynamically typed property value. Entity/room property bags are
/// heterogeneous (bool/int/string/list/map) by design; typed accessors
/// return `None` on a kind mismatch rather than panicking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Render for template interpolation / display. Never panics.
    pub fn display_string(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items.iter().map(Value::display_string).collect::<Vec<_>>().join(", "),
            Value::Map(_) => String::new(),
        }
    }
}

pub type Props = BTreeMap<String, Value>;

/// Kind of an [`EntityDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Item,
    Npc,
    Enemy,
    Entity,
}

/// A room definition: id, description, exits, per-verb fallback messages and
/// attached rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDef {
    pub id: Id,
    pub description: String,
    #[serde(default)]
    pub exits: BTreeMap<String, Id>,
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

/// An entity definition: item, NPC, enemy or generic scenery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub id: Id,
    pub kind: Kind,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicDef>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

/// A single NPC conversation topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDef {
    pub text: String,
    #[serde(default)]
    pub requires: Vec<Condition>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// Where a [`RuleDef`] is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Room(Id),
    Entity(Id),
}

/// The declarative subset of the intent (plus property constraints) a rule
/// requires in order to be eligible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub verb: String,
    #[serde(default)]
    pub object: Option<Id>,
    #[serde(default)]
    pub target: Option<Id>,
    #[serde(default)]
    pub object_kind: Option<Kind>,
    #[serde(default)]
    pub object_prop: Vec<(String, Value)>,
    #[serde(default)]
    pub target_prop: Vec<(String, Value)>,
}

impl MatchCriteria {
    /// Specificity score used for ranking within a bucket: see spec 4.E.
    pub fn specificity(&self) -> u32 {
        let mut score = 0;
        if self.target.is_some() {
            score += 4;
        }
        if self.object.is_some() {
            score += 2;
        }
        if !self.object_prop.is_empty() || !self.target_prop.is_empty() {
            score += 1;
        }
        score
    }
}

/// A declarative condition evaluated against current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    HasItem { item: Id },
    FlagSet { flag: String },
    FlagNot { flag: String },
    FlagIs { flag: String, value: bool },
    CounterGt { counter: String, value: i64 },
    CounterLt { counter: String, value: i64 },
    InRoom { room: Id },
    PropIs { entity: Id, prop: String, value: Value },
    InCombat,
    InCombatWith { enemy: Id },
    StatGt { target: String, stat: String, value: i64 },
    StatLt { target: String, stat: String, value: i64 },
    Not { inner: Box<Condition> },
}

/// An atomic state mutation, the sole unit of work the effect layer
/// executes. See spec 4.F for the full semantics table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Say { text: String },
    GiveItem { item: String },
    RemoveItem { item: String },
    SetFlag { flag: String, value: bool },
    IncCounter { counter: String, amount: i64 },
    SetCounter { counter: String, value: i64 },
    SetProp { entity: String, prop: String, value: Value },
    MoveEntity { entity: String, room: String },
    MovePlayer { room: String },
    OpenExit { room: String, direction: String, target: String },
    CloseExit { room: String, direction: String },
    EmitEvent { event: String },
    StartDialogue { npc: String },
    StartCombat { enemy: String },
    EndCombat,
    Damage { target: String, amount: i64 },
    Heal { target: String, amount: i64 },
    SetStat { target: String, stat: String, value: i64 },
    Stop,
}

/// `(match + conditions -> effects)` with id, scope and ranking metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(rename = "match")]
    pub match_criteria: MatchCriteria,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub source_order: u32,
}

/// An event-type-keyed, condition-gated handler. See `crate::events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandler {
    pub event_type: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// Top-level game metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDef {
    pub title: String,
    pub author: String,
    pub version: String,
    pub start_room: Id,
    pub intro: String,
    #[serde(default)]
    pub initial_stats: BTreeMap<String, i64>,
}

/// The full, immutable definition of a loaded game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defs {
    pub game: GameDef,
    pub rooms: BTreeMap<Id, RoomDef>,
    pub entities: BTreeMap<Id, EntityDef>,
    pub handlers: Vec<EventHandler>,
    pub global_rules: Vec<RuleDef>,
}

impl Defs {
    pub fn room(&self, id: &Id) -> Option<&RoomDef> {
        self.rooms.get(id)
    }

    pub fn entity(&self, id: &Id) -> Option<&EntityDef> {
        self.entities.get(id)
    }
}
