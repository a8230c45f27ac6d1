use crate::domains::mcp::parser::ServerStatus;
use crate::domains::sessions::entity::PersistedSession;
use tokio::sync::broadcast;

/// Events the core emits toward the embedding shell. Raw terminal bytes are
/// forwarded verbatim; everything else is structured state.
#[derive(Debug, Clone)]
pub enum LeitEvent {
    SessionOutput {
        session_id: String,
        bytes: Vec<u8>,
    },
    SessionCreated {
        session: Box<PersistedSession>,
    },
    SessionError {
        message: String,
    },
    SessionReopened {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
    },
    SessionsLoaded {
        sessions: Vec<PersistedSession>,
    },
    AgentStarted {
        session_id: String,
    },
    ServersUpdated {
        session_id: String,
        servers: Vec<ServerStatus>,
    },
    TerminalClosed {
        terminal_id: String,
    },
}

impl LeitEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LeitEvent::SessionOutput { .. } => "leitwerk:session-output",
            LeitEvent::SessionCreated { .. } => "leitwerk:session-created",
            LeitEvent::SessionError { .. } => "leitwerk:session-error",
            LeitEvent::SessionReopened { .. } => "leitwerk:session-reopened",
            LeitEvent::SessionDeleted { .. } => "leitwerk:session-deleted",
            LeitEvent::SessionsLoaded { .. } => "leitwerk:sessions-loaded",
            LeitEvent::AgentStarted { .. } => "leitwerk:agent-started",
            LeitEvent::ServersUpdated { .. } => "leitwerk:servers-updated",
            LeitEvent::TerminalClosed { .. } => "leitwerk:terminal-closed",
        }
    }
}

/// Broadcast fan-out to however many shell-side listeners are attached.
/// Emission never fails: with no subscribers the event is simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LeitEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: LeitEvent) {
        if !matches!(event, LeitEvent::SessionOutput { .. }) {
            log::debug!("Emitting event {}", event.name());
        }
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeitEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
