//! Whole-crate integration tests: load a game from real TOML files on disk
//! (the path the unit tests in `loader.rs` never exercise, since those use
//! the in-memory JSON fixture) and drive a few full turns through
//! `Engine::step`, mirroring the teacher's flat `tests/basic.rs` style.

use std::fs;

use questcore::{Engine, Id};

fn write_game(dir: &std::path::Path) {
    fs::write(
        dir.join("game.toml"),
        r#"
[game]
title = "Lantern Keep"
author = "tester"
version = "0.1.0"
start_room = "gate"
intro = "The keep looms ahead."

[game.initial_stats]
hp = 10
attack = 4
defense = 2
"#,
    )
    .unwrap();

    fs::write(
        dir.join("rooms.toml"),
        r#"
[[rooms]]
id = "gate"
description = "A rusted iron gate."
rules = []

[rooms.exits]
in = "courtyard"

[[rooms]]
id = "courtyard"
description = "A mossy courtyard."
rules = []

[rooms.exits]
out = "gate"
"#,
    )
    .unwrap();

    fs::write(
        dir.join("entities.toml"),
        r#"
[[entities]]
id = "lantern"
kind = "item"
rules = []

[entities.props]
name = "lantern"
location = "courtyard"
takeable = true
"#,
    )
    .unwrap();

    fs::write(
        dir.join("rules.toml"),
        r#"
[[rules]]
id = "courtyard_take_lantern"
scope = { Room = "courtyard" }
priority = 0
source_order = 0
conditions = []

[rules.match]
verb = "take"
object = "lantern"

[[rules.effects]]
type = "say"
text = "The lantern flares to life in your hand."

[[rules.effects]]
type = "give_item"
item = "lantern"
"#,
    )
    .unwrap();

    fs::write(dir.join("events.toml"), "handlers = []\n").unwrap();
}

#[test]
fn loads_from_directory_and_plays_a_turn() {
    let dir = tempfile::tempdir().unwrap();
    write_game(dir.path());

    let mut engine = Engine::from_dir(dir.path(), 1).unwrap();
    assert_eq!(engine.defs.game.title, "Lantern Keep");
    assert_eq!(engine.state.player.location, Id::from("gate"));

    let result = engine.step("go in");
    assert_eq!(engine.state.player.location, Id::from("courtyard"));
    assert!(result.output.iter().any(|l| l.contains("courtyard") || l.contains("mossy")));
}

#[test]
fn room_rule_fires_before_plain_takeable_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write_game(dir.path());

    let mut engine = Engine::from_dir(dir.path(), 1).unwrap();
    engine.step("go in");
    let result = engine.step("take lantern");
    assert!(result.output.iter().any(|l| l.contains("flares to life")));
    assert!(engine.state.player.inventory.contains(&Id::from("lantern")));
}

#[test]
fn unknown_game_directory_surfaces_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    // no game.toml written: missing `Game` definition is the one fatal
    // issue that fires even for an entirely empty directory.
    let err = Engine::from_dir(dir.path(), 1).unwrap_err();
    assert!(err.to_string().contains("missing game definition") || err.to_string().contains("issue"));
}

#[test]
fn save_and_resume_restores_location_and_inventory() {
    let dir = tempfile::tempdir().unwrap();
    write_game(dir.path());
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let mut engine = Engine::from_dir(dir.path(), 1).unwrap();
    engine.step("go in");
    engine.step("take lantern");

    let path = questcore::save::save("slot-a", &engine.state, &engine.defs).unwrap();
    assert!(path.exists());

    let restored_state = questcore::save::load("slot-a").unwrap();
    let restored = Engine::resume(Engine::from_dir(dir.path(), 1).unwrap().defs, restored_state);
    assert_eq!(restored.state.player.location, Id::from("courtyard"));
    assert!(restored.state.player.inventory.contains(&Id::from("lantern")));
}
