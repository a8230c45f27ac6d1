//! Persisted session collection over the key-value store. The whole list is
//! read, mutated and written back on every change; the single-threaded
//! mutation discipline of the session manager is what makes that safe.

use super::entity::PersistedSession;
use crate::infrastructure::store::{KvStore, get_typed, set_typed};
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub const SESSIONS_KEY: &str = "sessions";

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<PersistedSession>> {
        Ok(get_typed(self.store.as_ref(), SESSIONS_KEY)?.unwrap_or_default())
    }

    fn save(&self, sessions: &[PersistedSession]) -> Result<()> {
        set_typed(self.store.as_ref(), SESSIONS_KEY, &sessions)
    }

    pub fn get(&self, session_id: &str) -> Result<Option<PersistedSession>> {
        Ok(self.list()?.into_iter().find(|s| s.id == session_id))
    }

    /// `max(existing numbers) + 1`, or 1 for an empty collection. Numbers of
    /// deleted sessions are never reused for gap filling.
    pub fn next_session_number(&self) -> Result<u32> {
        let max = self.list()?.iter().map(|s| s.number).max().unwrap_or(0);
        Ok(max + 1)
    }

    pub fn insert(&self, session: PersistedSession) -> Result<()> {
        let mut sessions = self.list()?;
        if sessions.iter().any(|s| s.id == session.id) {
            return Err(anyhow!("Session '{}' already persisted", session.id));
        }
        sessions.push(session);
        self.save(&sessions)
    }

    pub fn remove(&self, session_id: &str) -> Result<Option<PersistedSession>> {
        let mut sessions = self.list()?;
        let position = sessions.iter().position(|s| s.id == session_id);
        let removed = position.map(|i| sessions.remove(i));
        if removed.is_some() {
            self.save(&sessions)?;
        }
        Ok(removed)
    }

    pub fn rename(&self, session_id: &str, new_name: &str) -> Result<()> {
        let mut sessions = self.list()?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| anyhow!("Session '{session_id}' not found"))?;
        session.name = new_name.to_string();
        self.save(&sessions)
    }
}
