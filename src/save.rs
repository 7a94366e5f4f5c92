//! Save-game serialization and disk layout.
//!
//! Grounded on the teacher's `save_files.rs`: `anyhow::Context` on every
//! fallible path op, `log::warn` on load failures, saves addressed by a bare
//! slot name. Two differences follow the spec rather than the teacher: the
//! wire format is JSON (`serde_json`, not `ron`), and there is a single save
//! directory per user rather than one per world, since a `questcore` install
//! only ever runs one game at a time.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::model::Defs;
use crate::state::{CombatState, State};
use crate::QUESTCORE_VERSION;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// On-disk save schema (spec 6). Every field beyond `version`/`game`/`turn`
/// tolerates a missing key so an older save still loads, with absent values
/// substituted by their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub game: String,
    #[serde(default)]
    pub turn: u64,
    #[serde(default)]
    pub player: SavedPlayer,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub entity_state: BTreeMap<String, SavedEntityState>,
    #[serde(default)]
    pub rng_seed: i64,
    /// Not named in the save schema's literal field list, but required to
    /// reconstruct the RNG stream exactly on load (spec 4.J); stored
    /// alongside the named fields rather than folded into `rng_seed`.
    #[serde(default)]
    pub rng_position: i64,
    #[serde(default)]
    pub command_log: Vec<String>,
    #[serde(default)]
    pub combat: CombatState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedPlayer {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedEntityState {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub props: crate::model::Props,
}

impl SaveFile {
    /// Build a save record from a live session.
    pub fn capture(state: &State, defs: &Defs) -> Self {
        SaveFile {
            version: QUESTCORE_VERSION.to_string(),
            game: defs.game.title.clone(),
            turn: state.turn,
            player: SavedPlayer {
                location: state.player.location.to_string(),
                inventory: state.player.inventory.iter().map(|id| id.to_string()).collect(),
                stats: state.player.stats.clone(),
            },
            flags: state.flags.clone(),
            counters: state.counters.clone(),
            entity_state: state
                .entity_state
                .iter()
                .map(|(id, es)| {
                    (
                        id.clone(),
                        SavedEntityState {
                            location: es.location.clone(),
                            props: es.props.clone(),
                        },
                    )
                })
                .collect(),
            rng_seed: state.rng_seed,
            rng_position: state.rng_position,
            command_log: state.command_log.clone(),
            combat: state.combat.clone(),
        }
    }

    /// Reconstitute a [`State`] from this save. The `version`/`game` fields
    /// are informational only (spec 6): a mismatch is not an error.
    pub fn into_state(self) -> State {
        let mut state = State::new_empty(self.rng_seed);
        state.turn = self.turn;
        state.player.location = self.player.location.into();
        state.player.inventory = self.player.inventory.into_iter().map(Into::into).collect();
        state.player.stats = self.player.stats;
        state.flags = self.flags;
        state.counters = self.counters;
        state.entity_state = self
            .entity_state
            .into_iter()
            .map(|(id, es)| {
                (
                    id,
                    crate::state::EntityState {
                        location: es.location,
                        props: es.props,
                        topics: None,
                    },
                )
            })
            .collect();
        state.rng_position = self.rng_position;
        state.command_log = self.command_log;
        state.combat = self.combat;
        state
    }
}

/// `<home>/.questcore/saves`, creating it (mode 0o755) if missing.
///
/// # Errors
/// Returns an error if the home directory cannot be located or the save
/// directory cannot be created.
pub fn save_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let dir = home.join(".questcore").join("saves");
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("creating save directory {}", dir.display()))?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(DIR_MODE))
            .with_context(|| format!("setting permissions on {}", dir.display()))?;
    }
    Ok(dir)
}

fn slot_path(name: &str) -> Result<PathBuf> {
    Ok(save_dir()?.join(format!("{name}.json")))
}

/// Write `state` to the named slot (default slot is the caller's concern,
/// per spec `/save [name]` defaulting to `quicksave`).
///
/// # Errors
/// Returns an error if the save directory is unavailable, serialization
/// fails, or the file cannot be written.
pub fn save(name: &str, state: &State, defs: &Defs) -> Result<PathBuf> {
    let path = slot_path(name)?;
    let record = SaveFile::capture(state, defs);
    let json = serde_json::to_string_pretty(&record).context("serializing save file")?;
    fs::write(&path, json).with_context(|| format!("writing save file {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(FILE_MODE))
        .with_context(|| format!("setting permissions on {}", path.display()))?;
    Ok(path)
}

/// Load the named slot. Missing optional keys in the JSON are substituted
/// with empty/default values rather than failing.
///
/// # Errors
/// Returns an error if the file is missing, unreadable, or not valid JSON.
pub fn load(name: &str) -> Result<State> {
    let path = slot_path(name)?;
    let raw = fs::read_to_string(&path).with_context(|| format!("reading save file {}", path.display()))?;
    let record: SaveFile = serde_json::from_str(&raw).with_context(|| format!("parsing save file {}", path.display()))?;
    if record.version != QUESTCORE_VERSION {
        warn!(
            "save '{name}' was written by version {} (running {})",
            if record.version.is_empty() { "unknown" } else { &record.version },
            QUESTCORE_VERSION
        );
    }
    Ok(record.into_state())
}
