use jot_core::AuthState;
use jot_core::DocumentId;
use jot_core::Navigation;
use jot_core::NoteEntry;
use jot_core::NotesState;

/// Text for the current screen, derived from the snapshot alone.
pub fn render(state: &NotesState) -> String {
    let mut out = String::new();
    match &state.auth {
        AuthState::Pending => out.push_str("Not signed in. Use `auth <seed>`.\n"),
        AuthState::Loading => out.push_str("Signing in...\n"),
        AuthState::Failed => out.push_str("Sign-in failed. Check the seed and retry.\n"),
        AuthState::Authenticated(session) => {
            out.push_str(&format!("Signed in as {}\n", session.index.identity()));
            match &session.navigation {
                Navigation::Home => render_list(state, &mut out),
                Navigation::Draft => out.push_str(&format!(
                    "[draft] {}\n",
                    session.draft_status.label()
                )),
                Navigation::Note { document_id } => render_note(state, document_id, &mut out),
            }
        }
    }
    out
}

fn render_list(state: &NotesState, out: &mut String) {
    if state.notes().is_empty() {
        out.push_str("No notes yet.\n");
        return;
    }
    for (position, (id, entry)) in state.notes().iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {} ({}) [{}]\n",
            position + 1,
            entry.title(),
            id,
            entry.status_label()
        ));
    }
}

fn render_note(state: &NotesState, id: &DocumentId, out: &mut String) {
    let Some(entry) = state.note(id) else {
        return;
    };
    out.push_str(&format!("# {} [{}]\n", entry.title(), entry.status_label()));
    match entry {
        NoteEntry::IndexLoaded { .. } => out.push_str("(loading)\n"),
        NoteEntry::Stored { document, .. } => {
            out.push_str(&format!(
                "v{} {}\n{}\n",
                document.version,
                document.content.date.format("%Y-%m-%d %H:%M"),
                document.text()
            ));
        }
    }
}

/// Resolves `open` arguments: a 1-based position in the home list, or an id.
pub fn resolve_note(state: &NotesState, arg: &str) -> DocumentId {
    if let Ok(position) = arg.parse::<usize>() {
        if let Some(id) = position
            .checked_sub(1)
            .and_then(|idx| state.notes().ids().nth(idx))
        {
            return id.clone();
        }
    }
    DocumentId::from(arg)
}
