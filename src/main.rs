//! questcore binary: load a game directory and run an interactive session.
//!
//! Structured after the teacher's `amble_engine` entrypoint -- `env_logger`
//! init, then a read-eval-print loop -- but the command surface (spec 6) is
//! a flat set of CLI flags rather than a grammar file, so argument handling
//! is hand-rolled instead of delegated to a parser crate.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use colored::Colorize;
use env_logger::Env;
use log::{info, warn};
use questcore::{Engine, QUESTCORE_VERSION};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use textwrap::{fill, termwidth};

struct Args {
    game_dir: PathBuf,
    plain: bool,
    script: Option<PathBuf>,
    trace: bool,
}

fn parse_args() -> Result<Option<Args>, String> {
    let mut plain = false;
    let mut script = None;
    let mut trace = false;
    let mut game_dir = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" => return Ok(None),
            "--plain" => plain = true,
            "--trace" => trace = true,
            "--script" => {
                let path = iter.next().ok_or("--script requires a file argument")?;
                script = Some(PathBuf::from(path));
            },
            other if other.starts_with("--") => return Err(format!("unknown flag: {other}")),
            other => game_dir = Some(PathBuf::from(other)),
        }
    }

    let game_dir = game_dir.ok_or_else(|| "missing <game_directory>".to_string())?;
    Ok(Some(Args { game_dir, plain, script, trace }))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("questcore {QUESTCORE_VERSION}");
            return Ok(());
        },
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("usage: questcore [--version] [--plain] [--script <file>] [--trace] <game_directory>");
            std::process::exit(1);
        },
    };

    info!("loading game from {}", args.game_dir.display());
    let seed = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(1);
    let mut engine = match Engine::from_dir(&args.game_dir, seed) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        },
    };
    info!("loaded \"{}\"", engine.defs.game.title);

    let title = engine.defs.game.title.clone();
    let intro = engine.defs.game.intro.clone();
    print_banner(&title, &intro, args.plain);

    if let Some(script_path) = &args.script {
        return run_script(&mut engine, script_path, args.plain, args.trace);
    }
    run_repl(&mut engine, args.plain, args.trace)
}

fn print_banner(title: &str, intro: &str, plain: bool) {
    let width = termwidth();
    if plain {
        println!("{:^width$}", title, width = width);
    } else {
        println!("{:^width$}", title.bright_yellow().bold(), width = width);
    }
    if !intro.is_empty() {
        println!("{}", fill(intro, width));
    }
    println!();
}

/// Run every line of `path` as a turn, printing each result, then exit --
/// used for scripted smoke tests and demo playthroughs.
///
/// # Errors
/// Returns an error if the script file cannot be read.
fn run_script(engine: &mut Engine, path: &std::path::Path, plain: bool, mut trace: bool) -> Result<()> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(control) = handle_meta(engine, line, &mut trace)? {
            if control == Control::Quit {
                break;
            }
            continue;
        }
        print_turn(engine, line, plain, trace);
    }
    Ok(())
}

/// Interactive loop: read a line, dispatch it as a meta-command or a game
/// turn, print the result, repeat until `/quit` or EOF.
///
/// # Errors
/// Propagates failures from meta-command handlers (save/load I/O errors).
fn run_repl(engine: &mut Engine, plain: bool, mut trace: bool) -> Result<()> {
    let mut editor = DefaultEditor::new().context("initializing line editor")?;
    let interactive = io::stdin().is_terminal();

    loop {
        let prompt = format!("[{}]> ", engine.state.player.location);
        let line = if interactive {
            match editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    warn!("input error: {err}");
                    break;
                },
            }
        } else {
            let mut buf = String::new();
            if io::stdin().read_line(&mut buf)? == 0 {
                break;
            }
            buf
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match handle_meta(engine, line, &mut trace)? {
            Some(Control::Quit) => break,
            Some(Control::Handled) => continue,
            None => print_turn(engine, line, plain, trace),
        }
    }
    Ok(())
}

#[derive(PartialEq, Eq)]
enum Control {
    Quit,
    Handled,
}

/// Dispatch a slash-prefixed meta-command. Returns `None` if `line` is an
/// ordinary game command.
///
/// # Errors
/// Propagates I/O failures from `/save` and `/load`.
fn handle_meta(engine: &mut Engine, line: &str, trace: &mut bool) -> Result<Option<Control>> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(None);
    };
    let mut parts = rest.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let arg = parts.next();

    match cmd {
        "quit" | "exit" => Ok(Some(Control::Quit)),
        "save" => {
            let name = arg.unwrap_or("quicksave");
            match questcore::save::save(name, &engine.state, &engine.defs) {
                Ok(path) => println!("Saved to {}", path.display()),
                Err(err) => println!("Save failed: {err}"),
            }
            Ok(Some(Control::Handled))
        },
        "load" => {
            let name = arg.unwrap_or("quicksave");
            match questcore::save::load(name) {
                Ok(state) => {
                    engine.state = state;
                    engine.rng = questcore::Rng::restore(engine.state.rng_seed, engine.state.rng_position);
                    describe_current_room(engine);
                },
                Err(err) => println!("Load failed: {err}"),
            }
            Ok(Some(Control::Handled))
        },
        "help" => {
            println!("Common verbs: go, look, take, drop, examine, talk, inventory, wait.");
            println!("In combat: attack, defend, flee, use, inventory, look.");
            Ok(Some(Control::Handled))
        },
        "state" => {
            print_state(engine);
            Ok(Some(Control::Handled))
        },
        "trace" => {
            *trace = !*trace;
            println!("trace {}", if *trace { "on" } else { "off" });
            Ok(Some(Control::Handled))
        },
        other => {
            println!("unknown meta-command: /{other}");
            Ok(Some(Control::Handled))
        },
    }
}

fn print_turn(engine: &mut Engine, input: &str, plain: bool, trace: bool) {
    let result = engine.step(input);
    for line in &result.output {
        if plain {
            println!("{line}");
        } else {
            println!("{}", style_line(line));
        }
    }
    if trace {
        if !result.effects.is_empty() {
            println!("{}", format!("  effects: {:?}", result.effects).dimmed());
        }
        if !result.events.is_empty() {
            println!("{}", format!("  events: {:?}", result.events).dimmed());
        }
    }
}

fn style_line(line: &str) -> String {
    if line.starts_with("you don't see") || line.starts_with("which ") {
        line.red().to_string()
    } else if line.starts_with("Exits:") || line.starts_with("You see:") {
        line.cyan().to_string()
    } else {
        line.to_string()
    }
}

fn describe_current_room(engine: &Engine) {
    for line in engine.describe_current_room() {
        println!("{line}");
    }
}

fn print_state(engine: &Engine) {
    println!("Turn: {}", engine.state.turn);
    println!("Location: {}", engine.state.player.location);
    println!(
        "Inventory: {}",
        if engine.state.player.inventory.is_empty() {
            "(empty)".to_string()
        } else {
            engine.state.player.inventory.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        }
    );
    for (flag, value) in &engine.state.flags {
        if *value {
            println!("flag: {flag}");
        }
    }
    for (counter, value) in &engine.state.counters {
        if *value != 0 {
            println!("counter: {counter} = {value}");
        }
    }
}
