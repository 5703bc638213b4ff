#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use notes_sync::notify::{Level, Notification, Notifier};
use notes_sync::{NewNote, Note, NotesApi, RequestError};
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Create,
    Update,
    Delete,
    Clear,
    Count,
}

#[derive(Default)]
struct Server {
    notes: Vec<Note>,
    next_id: i64,
}

/// In-memory notes server that records every call and can be told to fail
/// or stall specific operations.
#[derive(Clone, Default)]
pub struct FakeNotesApi {
    server: Arc<Mutex<Server>>,
    calls: Arc<Mutex<Vec<Op>>>,
    failures: Arc<Mutex<HashMap<Op, VecDeque<RequestError>>>>,
    list_gates: Arc<Mutex<VecDeque<oneshot::Receiver<()>>>>,
}

impl FakeNotesApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_notes(notes: &[(&str, &str)]) -> Self {
        let api = Self::new();
        for (title, content) in notes {
            api.seed(title, content).await;
        }
        api
    }

    /// Insert directly on the "server", bypassing the call log.
    pub async fn seed(&self, title: &str, content: &str) -> Note {
        let mut server = self.server.lock().await;
        server.next_id += 1;
        let note = Note {
            id: Some(server.next_id),
            title: title.into(),
            content: content.into(),
        };
        server.notes.push(note.clone());
        note
    }

    /// Change a note behind the client's back, like another tab would.
    pub async fn rename_on_server(&self, id: i64, title: &str) {
        let mut server = self.server.lock().await;
        if let Some(note) = server.notes.iter_mut().find(|n| n.id == Some(id)) {
            note.title = title.into();
        }
    }

    pub async fn remove_on_server(&self, id: i64) {
        self.server.lock().await.notes.retain(|n| n.id != Some(id));
    }

    pub async fn server_notes(&self) -> Vec<Note> {
        self.server.lock().await.notes.clone()
    }

    pub async fn fail_next(&self, op: Op, err: RequestError) {
        self.failures.lock().await.entry(op).or_default().push_back(err);
    }

    /// The next `list` snapshots the server, then waits until the returned
    /// sender fires (or is dropped) before answering.
    pub async fn stall_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().await.push_back(rx);
        tx
    }

    pub async fn calls(&self) -> Vec<Op> {
        self.calls.lock().await.clone()
    }

    pub async fn count_calls(&self, op: Op) -> usize {
        self.calls.lock().await.iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: Op) -> Result<(), RequestError> {
        self.calls.lock().await.push(op);
        let mut failures = self.failures.lock().await;
        match failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn not_found(id: i64) -> RequestError {
    RequestError::ServerError {
        code: 404,
        message: format!("Note {} not found", id),
        detail: None,
        codename: Some("NOTE_NOT_FOUND".into()),
    }
}

pub fn unreachable() -> RequestError {
    RequestError::NetworkFailure {
        reason: "connection refused".into(),
    }
}

#[async_trait]
impl NotesApi for FakeNotesApi {
    async fn list(&self) -> Result<Vec<Note>, RequestError> {
        self.enter(Op::List).await?;
        let snapshot = self.server.lock().await.notes.clone();
        let gate = self.list_gates.lock().await.pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(snapshot)
    }

    async fn create(&self, note: &NewNote) -> Result<Note, RequestError> {
        self.enter(Op::Create).await?;
        let mut server = self.server.lock().await;
        server.next_id += 1;
        let created = Note {
            id: Some(server.next_id),
            title: note.title.trim().to_string(),
            content: note.content.clone(),
        };
        server.notes.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, note: &Note) -> Result<Note, RequestError> {
        self.enter(Op::Update).await?;
        let mut server = self.server.lock().await;
        let stored = server
            .notes
            .iter_mut()
            .find(|n| n.id == Some(id))
            .ok_or_else(|| not_found(id))?;
        stored.title = note.title.trim().to_string();
        stored.content = note.content.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RequestError> {
        self.enter(Op::Delete).await?;
        let mut server = self.server.lock().await;
        let before = server.notes.len();
        server.notes.retain(|n| n.id != Some(id));
        if server.notes.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), RequestError> {
        self.enter(Op::Clear).await?;
        self.server.lock().await.notes.clear();
        Ok(())
    }

    async fn count(&self) -> Result<u64, RequestError> {
        self.enter(Op::Count).await?;
        Ok(self.server.lock().await.notes.len() as u64)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    seen: parking_lot::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}
