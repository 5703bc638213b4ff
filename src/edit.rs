use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RequestError;
use crate::model::{Note, NotePatch, UNSET};
use crate::store::NotesStore;

/// The note currently open in the editor and its unsaved draft.
///
/// The draft is copied from the store when the session opens and is never
/// touched by later refreshes, so a heartbeat cannot eat keystrokes. A failed
/// save leaves the session open with the draft intact.
pub struct EditSession {
    store: Arc<NotesStore>,
    note_id: Option<i64>,
    draft: Option<Note>,
}

impl EditSession {
    pub fn new(store: Arc<NotesStore>) -> Self {
        Self {
            store,
            note_id: None,
            draft: None,
        }
    }

    pub fn note_id(&self) -> Option<i64> {
        self.note_id
    }

    pub fn draft(&self) -> Option<&Note> {
        self.draft.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    /// Open the session on `id` (snapshotting it from the store) or close it
    /// with `None`. Returns whether a session is open afterwards.
    pub fn set_note_id(&mut self, id: Option<i64>) -> bool {
        let Some(id) = id else {
            self.close();
            return false;
        };
        match self.store.find(id) {
            Some(note) => {
                debug!(id, "edit session opened");
                self.note_id = Some(id);
                self.draft = Some(note);
                true
            }
            None => {
                warn!(id, "note not in the current list; edit session not opened");
                self.close();
                false
            }
        }
    }

    /// Merge `patch` into the draft. Returns false when nothing is open.
    pub fn set_note(&mut self, patch: NotePatch) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.apply(patch);
                true
            }
            None => false,
        }
    }

    /// A draft needs a real title before it can be saved.
    pub fn can_save(&self) -> bool {
        self.draft.as_ref().is_some_and(|d| {
            let title = d.title.trim();
            !title.is_empty() && title != UNSET
        })
    }

    pub fn content_len(&self) -> usize {
        self.draft.as_ref().map_or(0, Note::content_len)
    }

    pub async fn save_note(&mut self) -> Result<Note, RequestError> {
        let Some(draft) = self.draft.clone() else {
            return Err(RequestError::Invalid("no note is open for editing".into()));
        };
        if !self.can_save() {
            return Err(RequestError::Invalid("note title must not be empty".into()));
        }
        let saved = self.store.update_note(&draft).await?;
        self.close();
        Ok(saved)
    }

    pub fn cancel(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(id) = self.note_id.take() {
            debug!(id, "edit session closed");
        }
        self.draft = None;
    }
}
