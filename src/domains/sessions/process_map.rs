//! In-memory registries of live processes. Presence of an entry is the
//! authoritative "this session is running" signal, independent of the
//! persisted record. Owned by the session manager and injected where needed
//! so orchestration stays testable against fakes.

use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProcess {
    pub terminal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerProcess {
    pub terminal_id: String,
}

#[derive(Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<DashMap<String, SessionProcess>>,
}

impl ProcessRegistry {
    pub fn get(&self, session_id: &str) -> Option<SessionProcess> {
        self.inner.get(session_id).map(|e| e.value().clone())
    }

    pub fn set(&self, session_id: &str, process: SessionProcess) {
        self.inner.insert(session_id.to_string(), process);
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionProcess> {
        self.inner.remove(session_id).map(|(_, p)| p)
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.inner.contains_key(session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }
}

#[derive(Clone, Default)]
pub struct PollerRegistry {
    inner: Arc<DashMap<String, PollerProcess>>,
}

impl PollerRegistry {
    pub fn get(&self, session_id: &str) -> Option<PollerProcess> {
        self.inner.get(session_id).map(|e| e.value().clone())
    }

    pub fn set(&self, session_id: &str, process: PollerProcess) {
        self.inner.insert(session_id.to_string(), process);
    }

    pub fn remove(&self, session_id: &str) -> Option<PollerProcess> {
        self.inner.remove(session_id).map(|(_, p)| p)
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.inner.contains_key(session_id)
    }
}
