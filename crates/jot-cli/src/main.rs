mod config;
mod render;
mod shell;

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use jot_core::config::Config;
use jot_core::dispatch;
use jot_core::parse_action;
use jot_core::Dispatch;
use jot_core::DocumentId;
use jot_core::NoteEntry;
use jot_core::NotesState;
use jot_exec::InlineExecutor;
use jot_exec::LocalBackend;
use jot_exec::NotesRuntime;
use jot_exec::TaskExecutor;
use jot_exec::ThreadedExecutor;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "JOT_LOG";
const SEED_ENV: &str = "JOT_SEED";

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            return Ok(());
        }
        "--version" | "-V" | "version" => {
            println!("jot {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let options = parse_options(args.collect())?;
    let config = config::load_config()?;
    init_tracing(&config);

    match command.as_str() {
        "list" => list_notes(&options, &config),
        "show" => {
            let id = options.positional(0, "a note id")?;
            show_note(&options, &config, DocumentId::from(id))
        }
        "new" => {
            let text = options.positional(0, "note text")?;
            new_note(&options, &config, text)
        }
        "edit" => {
            let id = options.positional(0, "a note id")?;
            let text = options.positional(1, "note text")?;
            edit_note(&options, &config, DocumentId::from(id), text)
        }
        "shell" => run_interactive(&options, &config),
        "replay" => {
            let path = options.positional(0, "an event file")?;
            replay(Path::new(path))
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    root: Option<PathBuf>,
    seed: Option<String>,
    title: Option<String>,
    positionals: Vec<String>,
}

impl Options {
    fn positional(&self, index: usize, what: &str) -> Result<&str, Box<dyn std::error::Error>> {
        self.positionals
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| format!("missing {what}").into())
    }

    fn seed(&self) -> Result<String, Box<dyn std::error::Error>> {
        self.seed
            .clone()
            .or_else(|| env::var(SEED_ENV).ok())
            .ok_or_else(|| format!("--seed HEX or {SEED_ENV} is required").into())
    }
}

fn parse_options(args: Vec<String>) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--root" | "--seed" | "--title" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(format!("{flag} requires a value").into());
                };
                match flag {
                    "--root" => options.root = Some(PathBuf::from(value)),
                    "--seed" => options.seed = Some(value.clone()),
                    _ => options.title = Some(value.clone()),
                }
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                options.positionals.push(other.to_string());
                i += 1;
            }
        }
    }
    Ok(options)
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn open_backend(options: &Options, config: &Config) -> io::Result<LocalBackend> {
    let root = config::store_root(options.root.clone(), config);
    info!(root = %root.display(), "opening store");
    LocalBackend::open(root)
}

/// Signs in and waits for the handshake to settle.
fn signed_in<E: TaskExecutor>(
    executor: E,
    options: &Options,
) -> Result<NotesRuntime<E>, Box<dyn std::error::Error>> {
    let seed = options.seed()?;
    let mut runtime = NotesRuntime::new(executor);
    runtime.authenticate(&seed)?;
    runtime.wait_idle();
    settle(&mut runtime)?;
    Ok(runtime)
}

/// Turns collaborator failures into a command error.
fn settle<E: TaskExecutor>(
    runtime: &mut NotesRuntime<E>,
) -> Result<(), Box<dyn std::error::Error>> {
    let failures = runtime.take_failures();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; ").into())
    }
}

fn inline(backend: LocalBackend) -> InlineExecutor {
    InlineExecutor::new(Arc::new(backend))
}

fn list_notes(options: &Options, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(options, config)?;
    let runtime = signed_in(inline(backend), options)?;
    let notes = runtime.state().notes();
    if notes.is_empty() {
        println!("no notes");
    }
    for (id, entry) in notes.iter() {
        println!("{id}\t{}\t{}", entry.status_label(), entry.title());
    }
    Ok(())
}

fn show_note(
    options: &Options,
    config: &Config,
    id: DocumentId,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(options, config)?;
    let mut runtime = signed_in(inline(backend), options)?;
    runtime.open_note(&id)?;
    runtime.wait_idle();
    settle(&mut runtime)?;
    match runtime.state().note(&id) {
        Some(NoteEntry::Stored {
            title, document, ..
        }) => {
            println!("# {title} (v{})", document.version);
            println!("{}", document.text());
            Ok(())
        }
        _ => Err(format!("note {id} could not be loaded").into()),
    }
}

fn new_note(
    options: &Options,
    config: &Config,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let title = options.title.as_deref().unwrap_or("Untitled");
    let backend = open_backend(options, config)?;
    let mut runtime = signed_in(inline(backend), options)?;
    runtime.open_draft()?;
    runtime.save_draft(title, text)?;
    runtime.wait_idle();
    settle(&mut runtime)?;
    match runtime.state().current_note() {
        Some((id, _)) => {
            println!("{id}");
            Ok(())
        }
        None => Err("draft was not saved".into()),
    }
}

fn edit_note(
    options: &Options,
    config: &Config,
    id: DocumentId,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(options, config)?;
    let mut runtime = signed_in(inline(backend), options)?;
    runtime.open_note(&id)?;
    runtime.wait_idle();
    settle(&mut runtime)?;
    runtime.save_note(&id, text)?;
    runtime.wait_idle();
    settle(&mut runtime)?;
    if let Some(document) = runtime.state().note(&id).and_then(NoteEntry::document) {
        println!("{id} v{}", document.version);
    }
    Ok(())
}

fn run_interactive(options: &Options, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(options, config)?;
    let mut runtime = NotesRuntime::new(ThreadedExecutor::new(Arc::new(backend)));
    if let Ok(seed) = options.seed() {
        runtime.authenticate(&seed)?;
        runtime.wait_idle();
    }
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    shell::run_shell(&mut runtime, stdin.lock(), &mut stdout)?;
    Ok(())
}

/// Counts from applying an event log through the staleness guard.
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    applied: usize,
    ignored: usize,
    rejected: usize,
}

fn replay(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)?;
    let (state, summary) = replay_events(&raw)?;
    eprintln!(
        "applied {} ignored {} rejected {}",
        summary.applied, summary.ignored, summary.rejected
    );
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Malformed lines abort the replay; rejected events are skipped.
fn replay_events(raw: &str) -> Result<(NotesState, ReplaySummary), Box<dyn std::error::Error>> {
    let mut state = NotesState::new();
    let mut summary = ReplaySummary::default();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let action =
            parse_action(line).map_err(|err| format!("line {}: {err}", index + 1))?;
        let name = action.name();
        match dispatch(&state, action) {
            Ok(Dispatch::Applied(next)) => {
                state = next;
                summary.applied += 1;
            }
            Ok(Dispatch::Ignored(reason)) => {
                info!(line = index + 1, action = name, reason = reason.label(), "ignored");
                summary.ignored += 1;
            }
            Err(err) => {
                warn!(line = index + 1, action = name, error = %err, "rejected");
                summary.rejected += 1;
            }
        }
    }
    state.validate()?;
    Ok((state, summary))
}

fn print_help() {
    println!("jot {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  jot list --seed HEX");
    println!("  jot show --seed HEX ID");
    println!("  jot new --seed HEX [--title TITLE] TEXT");
    println!("  jot edit --seed HEX ID TEXT");
    println!("  jot shell [--seed HEX]");
    println!("  jot replay FILE");
    println!("Options:");
    println!("  --root DIR    store directory (default: platform data dir)");
    println!("  --help");
    println!("  --version");
    println!("Environment: {SEED_ENV}, {LOG_ENV}, JOT_CONFIG");
}
