//! Session state: the local persisted schema, the file-backed store, and
//! the remote-backed accessor for the canonical server session.

pub mod service;
pub mod state;
pub mod store;

pub use service::{SessionApi, SessionService, SessionSnapshot};
pub use state::{Engine, LongTextStrategy, SessionState, SmartviewSelection};
pub use store::SessionStore;
