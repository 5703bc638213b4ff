use crate::error::RequestError;
use crate::model::Note;
use crate::store::NotesState;

/// Which presentation the notes screen should show for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesView<'a> {
    Loading,
    Empty,
    List(&'a [Note]),
    Failed { error: &'a RequestError, offline: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Refetch once the connection is back.
    Reconnect,
    Reload,
}

pub fn select(state: &NotesState, online: bool) -> NotesView<'_> {
    if let Some(error) = state.error.as_ref() {
        return NotesView::Failed {
            error,
            offline: !online,
        };
    }
    if state.notes.is_empty() {
        if state.is_loading {
            NotesView::Loading
        } else {
            NotesView::Empty
        }
    } else {
        NotesView::List(&state.notes)
    }
}

impl NotesView<'_> {
    pub fn headline(&self) -> &'static str {
        match self {
            NotesView::Loading => "Loading",
            NotesView::Empty => "No notes",
            NotesView::List(_) => "Notes",
            NotesView::Failed { offline: true, .. } => "You are offline",
            NotesView::Failed { offline: false, .. } => "Error",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            NotesView::Empty => Some("You don't have any notes yet. Create a new one below."),
            NotesView::Failed { offline: true, .. } => {
                Some("Notes will refresh automatically once the connection is back.")
            }
            NotesView::Failed { offline: false, .. } => {
                Some("The notes server could not complete the request. It may be down.")
            }
            _ => None,
        }
    }

    pub fn recovery(&self) -> Option<Recovery> {
        match self {
            NotesView::Failed { error, .. } if error.is_network() => Some(Recovery::Reconnect),
            NotesView::Failed { .. } => Some(Recovery::Reload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify_status;

    fn note(id: i64) -> Note {
        Note {
            id: Some(id),
            title: format!("t{}", id),
            content: "c".into(),
        }
    }

    #[test]
    fn loading_until_first_fetch() {
        let state = NotesState::default();
        assert_eq!(select(&state, true), NotesView::Loading);
    }

    #[test]
    fn empty_after_fetch() {
        let state = NotesState {
            is_loading: false,
            ..NotesState::default()
        };
        let view = select(&state, true);
        assert_eq!(view, NotesView::Empty);
        assert_eq!(view.headline(), "No notes");
        assert!(view.recovery().is_none());
    }

    #[test]
    fn list_when_notes_present() {
        let state = NotesState {
            notes: vec![note(1), note(2)],
            is_loading: false,
            error: None,
        };
        match select(&state, true) {
            NotesView::List(notes) => assert_eq!(notes.len(), 2),
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn error_wins_over_notes_and_tracks_connectivity() {
        let network = RequestError::NetworkFailure {
            reason: "connection refused".into(),
        };
        let state = NotesState {
            notes: vec![note(1)],
            is_loading: false,
            error: Some(network),
        };

        let offline = select(&state, false);
        assert!(matches!(offline, NotesView::Failed { offline: true, .. }));
        assert_eq!(offline.headline(), "You are offline");
        assert_eq!(offline.recovery(), Some(Recovery::Reconnect));

        let online = select(&state, true);
        assert!(matches!(online, NotesView::Failed { offline: false, .. }));
        assert_eq!(online.headline(), "Error");
    }

    #[test]
    fn server_error_recovers_by_reload() {
        let state = NotesState {
            notes: vec![],
            is_loading: false,
            error: Some(classify_status(500, Some("Internal Server Error"), "")),
        };
        let view = select(&state, true);
        assert_eq!(view.recovery(), Some(Recovery::Reload));
        assert!(view.hint().unwrap().contains("server"));
    }
}
