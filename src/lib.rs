//! Client-side data layer for a remote notes REST API: a cached, polled
//! notes list with cancellable fetches, normalized errors, edit sessions and
//! connectivity tracking.
pub mod api;
pub mod config;
pub mod connectivity;
pub mod edit;
pub mod error;
pub mod model;
pub mod notify;
pub mod store;
pub mod view;

pub use api::{HttpNotesClient, NotesApi};
pub use error::RequestError;
pub use model::{NewNote, Note, NotePatch};
pub use store::{FetchOutcome, NotesState, NotesStore, StoreOptions};
