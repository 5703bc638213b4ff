//! The notes store: an in-memory projection of the server's notes, kept
//! fresh by explicit refetches and a background heartbeat.
//!
//! Reads never fail past this boundary; their errors land in
//! [`NotesState::error`]. Writes record their errors *and* return them so the
//! caller can avoid showing false success. At most one list fetch is in
//! flight: starting a new one cancels the previous one, and a generation
//! check discards any response that lost that race.
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::api::{abortable, NotesApi};
use crate::config::{Config, ReconcileMode};
use crate::connectivity::ConnectivityObserver;
use crate::error::RequestError;
use crate::model::{NewNote, Note};
use crate::notify::{LogNotifier, Notification, Notifier};

/// Snapshot published to observers after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesState {
    pub notes: Vec<Note>,
    pub is_loading: bool,
    pub error: Option<RequestError>,
}

impl Default for NotesState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            is_loading: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the local list; carries the new length.
    Applied(usize),
    /// Superseded by a newer fetch or stopped. Nothing changed.
    Cancelled,
    /// Recorded in state and notified.
    Failed(RequestError),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub heartbeat: Duration,
    /// How the post-write refetch runs.
    pub reconcile: ReconcileMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            reconcile: ReconcileMode::Await,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            heartbeat: cfg.heartbeat(),
            reconcile: cfg.sync.reconcile,
        }
    }
}

#[derive(Default)]
struct FetchSlot {
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

pub struct NotesStore {
    this: Weak<NotesStore>,
    api: Arc<dyn NotesApi>,
    notifier: Arc<dyn Notifier>,
    options: StoreOptions,
    connectivity: Option<ConnectivityObserver>,
    state: watch::Sender<NotesState>,
    fetch: Mutex<FetchSlot>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
}

pub struct NotesStoreBuilder {
    api: Arc<dyn NotesApi>,
    notifier: Arc<dyn Notifier>,
    options: StoreOptions,
    connectivity: Option<ConnectivityObserver>,
}

impl NotesStoreBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Gate the heartbeat on `observer` and refetch whenever it reports a
    /// return to online, whether or not the heartbeat is running.
    ///
    /// The reconnect watcher is spawned by [`build`](Self::build), which then
    /// has to run inside a tokio runtime.
    pub fn connectivity(mut self, observer: ConnectivityObserver) -> Self {
        self.connectivity = Some(observer);
        self
    }

    pub fn build(self) -> Arc<NotesStore> {
        let (state, _) = watch::channel(NotesState::default());
        let store = Arc::new_cyclic(|this| NotesStore {
            this: this.clone(),
            api: self.api,
            notifier: self.notifier,
            options: self.options,
            connectivity: self.connectivity,
            state,
            fetch: Mutex::new(FetchSlot::default()),
            heartbeat: Mutex::new(None),
            reconnect: Mutex::new(None),
        });
        if let Some(observer) = store.connectivity.as_ref() {
            let task = reconnects(Arc::downgrade(&store), observer.subscribe());
            *store.reconnect.lock() = Some(tokio::spawn(task));
        }
        store
    }
}

impl NotesStore {
    pub fn builder(api: Arc<dyn NotesApi>) -> NotesStoreBuilder {
        NotesStoreBuilder {
            api,
            notifier: Arc::new(LogNotifier),
            options: StoreOptions::default(),
            connectivity: None,
        }
    }

    pub fn snapshot(&self) -> NotesState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotesState> {
        self.state.subscribe()
    }

    pub fn find(&self, id: i64) -> Option<Note> {
        self.state
            .borrow()
            .notes
            .iter()
            .find(|n| n.id == Some(id))
            .cloned()
    }

    pub fn connectivity(&self) -> Option<&ConnectivityObserver> {
        self.connectivity.as_ref()
    }

    /// Replace the local list with the server's. Cancels any fetch still in
    /// flight; never returns an error, see [`FetchOutcome`].
    #[instrument(skip_all)]
    pub async fn fetch_all(&self) -> FetchOutcome {
        let (generation, cancel) = self.begin_fetch();
        let result = abortable(self.api.list(), cancel).await;
        self.finish_fetch(generation, result)
    }

    pub async fn refetch(&self) -> FetchOutcome {
        self.fetch_all().await
    }

    #[instrument(skip_all)]
    pub async fn create_note(&self, note: NewNote) -> Result<Note, RequestError> {
        let result = self.api.create(&note).await;
        let created = self.settle(result, "Error creating note")?;
        info!(id = ?created.id, "note created");
        self.succeeded("Note created successfully").await;
        Ok(created)
    }

    #[instrument(skip_all)]
    pub async fn update_note(&self, note: &Note) -> Result<Note, RequestError> {
        let result = match note.id {
            Some(id) => self.api.update(id, note).await,
            None => Err(RequestError::Invalid(
                "cannot update a note without an id".into(),
            )),
        };
        let updated = self.settle(result, "Error updating note")?;
        info!(id = ?note.id, "note updated");
        self.succeeded("Note updated successfully").await;
        Ok(updated)
    }

    #[instrument(skip_all)]
    pub async fn delete_note(&self, id: i64) -> Result<(), RequestError> {
        let result = self.api.delete(id).await;
        self.settle(result, "Error deleting note")?;
        info!(id, "note deleted");
        self.succeeded("Note deleted successfully").await;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn clear_notes(&self) -> Result<(), RequestError> {
        let result = self.api.clear().await;
        self.settle(result, "Error clearing notes")?;
        info!("notes cleared");
        self.succeeded("Notes cleared successfully").await;
        Ok(())
    }

    /// Server-side note count. Leaves the local list alone.
    #[instrument(skip_all)]
    pub async fn count(&self) -> Result<u64, RequestError> {
        let result = self.api.count().await;
        self.settle(result, "Error fetching count")
    }

    /// Spawn the heartbeat: fetch now, then every `options.heartbeat`.
    /// No-op if it is already running.
    pub fn start(&self) {
        let mut slot = self.heartbeat.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("heartbeat already running");
            return;
        }
        let every = self.options.heartbeat;
        *slot = Some(tokio::spawn(heartbeat(self.this.clone(), every)));
        info!(?every, "heartbeat started");
    }

    /// Stop the heartbeat and cancel any fetch in flight.
    pub fn stop(&self) {
        if let Some(task) = self.heartbeat.lock().take() {
            task.abort();
            info!("heartbeat stopped");
        }
        self.cancel_in_flight();
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn online(&self) -> bool {
        self.connectivity.as_ref().map_or(true, |c| c.is_online())
    }

    fn finish_fetch(&self, generation: u64, result: Result<Vec<Note>, RequestError>) -> FetchOutcome {
        let mut slot = self.fetch.lock();
        if slot.generation != generation {
            debug!(generation, "fetch superseded; discarding response");
            return FetchOutcome::Cancelled;
        }
        slot.cancel = None;

        match result {
            Ok(notes) => {
                let count = notes.len();
                self.state.send_modify(|s| {
                    s.notes = notes;
                    s.error = None;
                    s.is_loading = false;
                });
                drop(slot);
                debug!(count, "notes refreshed");
                FetchOutcome::Applied(count)
            }
            Err(err) if err.is_ignorable() => {
                debug!(generation, "fetch cancelled");
                FetchOutcome::Cancelled
            }
            Err(err) => {
                self.state.send_modify(|s| {
                    s.error = Some(err.clone());
                    s.is_loading = false;
                });
                drop(slot);
                warn!(%err, "failed to fetch notes");
                self.notifier.notify(Notification::error(format!(
                    "Error fetching notes: {}",
                    err.message()
                )));
                FetchOutcome::Failed(err)
            }
        }
    }

    fn begin_fetch(&self) -> (u64, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.fetch.lock();
        slot.generation += 1;
        // Dropping the previous sender resolves that fetch's cancel branch.
        if slot.cancel.replace(tx).is_some() {
            debug!(generation = slot.generation, "cancelling in-flight fetch");
        }
        (slot.generation, rx)
    }

    fn cancel_in_flight(&self) {
        let mut slot = self.fetch.lock();
        slot.generation += 1;
        slot.cancel = None;
    }

    fn settle<T>(&self, result: Result<T, RequestError>, context: &str) -> Result<T, RequestError> {
        result.map_err(|err| {
            self.record_failure(context, &err);
            err
        })
    }

    fn record_failure(&self, context: &str, err: &RequestError) {
        if err.is_ignorable() {
            return;
        }
        warn!(%err, context, "notes request failed");
        self.state.send_modify(|s| s.error = Some(err.clone()));
        self.notifier
            .notify(Notification::error(format!("{}: {}", context, err.message())));
    }

    async fn succeeded(&self, message: &str) {
        self.notifier.notify(Notification::success(message));
        match self.options.reconcile {
            ReconcileMode::Await => {
                self.fetch_all().await;
            }
            ReconcileMode::Spawn => {
                let this = self.this.clone();
                tokio::spawn(async move {
                    fetch_detached(&this).await;
                });
            }
        }
    }
}

impl Drop for NotesStore {
    fn drop(&mut self) {
        for task in [self.heartbeat.get_mut().take(), self.reconnect.get_mut().take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.fetch.get_mut().cancel = None;
    }
}

/// Fetch through a weak reference. The store is only borrowed to start the
/// request and to apply its result, so dropping the last handle mid-request
/// runs `Drop`, which cancels the request. `None` once the store is gone.
async fn fetch_detached(weak: &Weak<NotesStore>) -> Option<FetchOutcome> {
    let (api, generation, cancel) = {
        let store = weak.upgrade()?;
        let (generation, cancel) = store.begin_fetch();
        (store.api.clone(), generation, cancel)
    };
    let result = abortable(api.list(), cancel).await;
    let store = weak.upgrade()?;
    Some(store.finish_fetch(generation, result))
}

async fn heartbeat(weak: Weak<NotesStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let online = match weak.upgrade() {
            Some(store) => store.online(),
            None => break,
        };
        if !online {
            debug!("offline; skipping heartbeat");
            continue;
        }
        if fetch_detached(&weak).await.is_none() {
            break;
        }
    }
}

/// Refetch on every offline -> online transition.
async fn reconnects(weak: Weak<NotesStore>, mut online: watch::Receiver<bool>) {
    while online.changed().await.is_ok() {
        if !*online.borrow_and_update() {
            continue;
        }
        info!("back online; refetching notes");
        if fetch_detached(&weak).await.is_none() {
            break;
        }
    }
}
