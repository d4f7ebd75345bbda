use std::io;
use std::io::BufRead;
use std::io::Write;

use jot_core::Navigation;
use jot_exec::NotesRuntime;
use jot_exec::TaskExecutor;

use crate::render::render;
use crate::render::resolve_note;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Auth(String),
    Home,
    Draft,
    Open(String),
    Title(String),
    Write(String),
    Save,
    Discard,
    Status,
    Wait,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let needs_arg = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("{head} requires {what}"))
        } else {
            Ok(rest.to_string())
        }
    };
    let command = match head {
        "auth" => ShellCommand::Auth(needs_arg("a seed")?),
        "home" => ShellCommand::Home,
        "draft" | "new" => ShellCommand::Draft,
        "open" => ShellCommand::Open(needs_arg("a note")?),
        "title" => ShellCommand::Title(needs_arg("a title")?),
        "write" => ShellCommand::Write(rest.to_string()),
        "save" => ShellCommand::Save,
        "discard" => ShellCommand::Discard,
        "status" | "ls" => ShellCommand::Status,
        "wait" => ShellCommand::Wait,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}

/// Unsaved input for the screen being edited. `text` stays `None` until
/// something is written, so saving an untouched note keeps its content.
#[derive(Debug, Default)]
struct Buffer {
    title: String,
    text: Option<String>,
}

pub fn run_shell<E, R, W>(runtime: &mut NotesRuntime<E>, input: R, out: &mut W) -> io::Result<()>
where
    E: TaskExecutor,
    R: BufRead,
    W: Write,
{
    let mut buffer = Buffer::default();
    runtime.pump();
    let mut screen = runtime.state().navigation();
    write!(out, "{}", render(runtime.state()))?;
    for line in input.lines() {
        let line = line?;
        runtime.pump();
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                writeln!(out, "{message}")?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if command == ShellCommand::Help {
            print_shell_help(out)?;
            continue;
        }

        if let Err(err) = execute(runtime, &mut buffer, command) {
            writeln!(out, "rejected: {err}")?;
        }
        runtime.pump();
        // the buffer belongs to one screen
        let now = runtime.state().navigation();
        if now != screen {
            buffer = Buffer::default();
            screen = now;
        }
        for failure in runtime.take_failures() {
            writeln!(out, "failed: {failure}")?;
        }
        write!(out, "{}", render(runtime.state()))?;
        if runtime.in_flight() > 0 {
            writeln!(out, "({} pending, `wait` to block)", runtime.in_flight())?;
        }
    }
    Ok(())
}

fn execute<E: TaskExecutor>(
    runtime: &mut NotesRuntime<E>,
    buffer: &mut Buffer,
    command: ShellCommand,
) -> Result<(), jot_core::InvariantViolation> {
    match command {
        ShellCommand::Auth(seed) => runtime.authenticate(&seed),
        ShellCommand::Home => runtime.go_home(),
        ShellCommand::Draft => runtime.open_draft(),
        ShellCommand::Open(arg) => {
            let id = resolve_note(runtime.state(), &arg);
            runtime.open_note(&id)
        }
        ShellCommand::Title(title) => {
            buffer.title = title;
            Ok(())
        }
        ShellCommand::Write(text) => {
            buffer.text = Some(text);
            Ok(())
        }
        ShellCommand::Save => match runtime.state().navigation() {
            Navigation::Note { document_id } => {
                let text = match &buffer.text {
                    Some(text) => text.clone(),
                    None => runtime
                        .state()
                        .note(&document_id)
                        .and_then(|entry| entry.document())
                        .map(|document| document.text().to_string())
                        .unwrap_or_default(),
                };
                runtime.save_note(&document_id, &text)
            }
            _ => {
                let title = if buffer.title.is_empty() {
                    "Untitled"
                } else {
                    buffer.title.as_str()
                };
                runtime.save_draft(title, buffer.text.as_deref().unwrap_or_default())
            }
        },
        ShellCommand::Discard => runtime.delete_draft(),
        ShellCommand::Wait => {
            runtime.wait_idle();
            Ok(())
        }
        ShellCommand::Status | ShellCommand::Help | ShellCommand::Quit => Ok(()),
    }
}

fn print_shell_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  auth SEED     sign in with a 64 hex character seed")?;
    writeln!(out, "  home          list notes")?;
    writeln!(out, "  draft         start a new note")?;
    writeln!(out, "  open N|ID     open a note by list position or id")?;
    writeln!(out, "  title TEXT    set the draft title")?;
    writeln!(out, "  write TEXT    set the text to save")?;
    writeln!(out, "  save          save the draft or the open note")?;
    writeln!(out, "  discard       drop the draft and go home")?;
    writeln!(out, "  status        redraw the current screen")?;
    writeln!(out, "  wait          block until pending work finishes")?;
    writeln!(out, "  quit")
}
