//! File-backed session store with migration-on-read.
//!
//! `load` never fails: missing storage yields a fresh session, unparseable
//! storage is logged and replaced by a fresh session, and records written by
//! older builds merge over current defaults (see the serde defaults on
//! [`SessionState`]). A failed write degrades to an in-memory copy so the
//! rest of the process keeps a consistent view.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use crate::session::state::{Engine, SessionState, SmartviewSelection};

pub struct SessionStore {
    path: PathBuf,
    // Latest state when the disk write failed; served by `load` until a
    // write succeeds again.
    fallback: Mutex<Option<SessionState>>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the persisted session, falling back to a fresh default with a
    /// new session id when storage is missing or corrupt.
    pub fn load(&self) -> SessionState {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(mut state) => {
                    state.normalize_legacy_scope();
                    state
                }
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        %err,
                        "stored session is unparseable; starting fresh"
                    );
                    self.fallback_or_default()
                }
            },
            Err(_) => self.fallback_or_default(),
        }
    }

    /// Persist the session. A write failure is logged and the state is kept
    /// in memory instead of crashing the workflow.
    pub fn save(&self, state: &SessionState) {
        match self.write_to_disk(state) {
            Ok(()) => {
                if let Ok(mut guard) = self.fallback.lock() {
                    *guard = None;
                }
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    %err,
                    "failed to persist session; keeping it in memory"
                );
                if let Ok(mut guard) = self.fallback.lock() {
                    *guard = Some(state.clone());
                }
            }
        }
    }

    /// Remove the persisted record; the next `load` yields a fresh session.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.fallback.lock() {
            *guard = None;
        }
        if self.path.exists() {
            if let Err(err) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), %err, "failed to clear session store");
            }
        }
    }

    /// Start a fresh session id while carrying forward reusable artifacts.
    pub fn reset_session(&self) -> SessionState {
        let next = self.load().reset();
        self.save(&next);
        next
    }

    pub fn update_engine(&self, engine: Engine) -> SessionState {
        self.update(|state| state.engine = Some(engine))
    }

    pub fn update_template_id(&self, template_id: &str) -> SessionState {
        self.update(|state| state.last_template_id = Some(template_id.to_string()))
    }

    pub fn update_mapping_id(&self, mapping_id: &str) -> SessionState {
        self.update(|state| state.last_mapping_id = Some(mapping_id.to_string()))
    }

    pub fn update_fetched_data_id(&self, data_id: &str) -> SessionState {
        self.update(|state| state.last_fetched_data_id = Some(data_id.to_string()))
    }

    pub fn update_artifact_id(&self, artifact_id: &str) -> SessionState {
        self.update(|state| state.last_artifact_id = Some(artifact_id.to_string()))
    }

    pub fn update_fetched_data_flag(&self, fetched: bool) -> SessionState {
        self.update(|state| state.has_fetched_data = fetched)
    }

    pub fn update_smartview_selection(&self, selection: SmartviewSelection) -> SessionState {
        self.update(|state| state.smartview_selection = Some(selection))
    }

    // Read-modify-write: one field change over the freshest stored state,
    // never a blind overwrite from caller-supplied partial data.
    fn update(&self, apply: impl FnOnce(&mut SessionState)) -> SessionState {
        let mut state = self.load();
        apply(&mut state);
        self.save(&state);
        state
    }

    fn write_to_disk(&self, state: &SessionState) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }

    fn fallback_or_default(&self) -> SessionState {
        self.fallback
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_default()
    }
}
