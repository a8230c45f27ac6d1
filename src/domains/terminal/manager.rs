use super::command_builder::build_shell_spec;
use crate::errors::LeitError;
use crate::infrastructure::events::{EventBus, LeitEvent};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use portable_pty::{Child, MasterPty, PtySize, native_pty_system};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

const OUTPUT_CHANNEL_CAPACITY: usize = 1024;
const READ_BUFFER_SIZE: usize = 8192;

/// One chunk of PTY output, or the end of the stream. `Exited` is delivered
/// both on natural process exit and after a kill, and doubles as the explicit
/// spawn-failure signal: a shell that dies before ever reaching readiness
/// surfaces here instead of hanging silently.
#[derive(Debug, Clone)]
pub enum TerminalOutput {
    Chunk(Vec<u8>),
    Exited,
}

/// Whether raw output chunks are forwarded to the shell-facing event bus.
/// Poller and runner terminals are `Hidden`; their output is parsed, never
/// displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputVisibility {
    Forwarded { session_id: String },
    Hidden,
}

#[derive(Debug, Clone)]
pub struct CreateTerminalRequest {
    pub id: String,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub env: Vec<(String, String)>,
    pub visibility: OutputVisibility,
}

impl CreateTerminalRequest {
    pub fn hidden(id: String, cwd: PathBuf) -> Self {
        Self {
            id,
            cwd,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            env: Vec::new(),
            visibility: OutputVisibility::Hidden,
        }
    }
}

/// Process-boundary seam for everything that talks to a terminal. The real
/// implementation is [`TerminalManager`]; tests inject a scripted fake.
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    /// Spawns the terminal and returns a receiver that observes its output
    /// from the first chunk on.
    async fn create(
        &self,
        req: CreateTerminalRequest,
    ) -> Result<broadcast::Receiver<TerminalOutput>>;
    async fn write(&self, id: &str, data: Vec<u8>) -> Result<()>;
    async fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()>;
    async fn kill(&self, id: &str) -> Result<()>;
    async fn exists(&self, id: &str) -> bool;
    fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<TerminalOutput>>;
}

struct TerminalHandle {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    tx: broadcast::Sender<TerminalOutput>,
}

pub struct TerminalManager {
    terminals: DashMap<String, Arc<TerminalHandle>>,
    events: EventBus,
}

impl TerminalManager {
    pub fn new(events: EventBus) -> Self {
        Self {
            terminals: DashMap::new(),
            events,
        }
    }

    pub fn kill_all(&self) {
        let ids: Vec<String> = self.terminals.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, handle)) = self.terminals.remove(&id) {
                Self::kill_handle(&id, &handle);
            }
        }
    }

    fn kill_handle(id: &str, handle: &TerminalHandle) {
        if let Ok(mut child) = handle.child.lock() {
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill terminal '{id}': {e}");
            }
        }
    }

    fn spawn_reader(
        &self,
        id: String,
        visibility: OutputVisibility,
        mut reader: Box<dyn Read + Send>,
        tx: broadcast::Sender<TerminalOutput>,
    ) {
        let events = self.events.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let bytes = buf[..n].to_vec();
                        let _ = tx.send(TerminalOutput::Chunk(bytes.clone()));
                        if let OutputVisibility::Forwarded { session_id } = &visibility {
                            events.emit(LeitEvent::SessionOutput {
                                session_id: session_id.clone(),
                                bytes,
                            });
                        }
                    }
                    Err(e) => {
                        log::debug!("Reader for terminal '{id}' stopped: {e}");
                        break;
                    }
                }
            }
            let _ = tx.send(TerminalOutput::Exited);
            events.emit(LeitEvent::TerminalClosed { terminal_id: id });
        });
    }
}

#[async_trait]
impl TerminalBackend for TerminalManager {
    async fn create(
        &self,
        req: CreateTerminalRequest,
    ) -> Result<broadcast::Receiver<TerminalOutput>> {
        if self.terminals.contains_key(&req.id) {
            return Err(anyhow!(LeitError::TerminalOperationFailed {
                terminal_id: req.id.clone(),
                operation: "create".to_string(),
                message: "terminal already exists".to_string(),
            }));
        }

        let spec = build_shell_spec(req.cols, req.rows, &req.env);
        log::info!(
            "Creating terminal '{}' in {} ({})",
            req.id,
            req.cwd.display(),
            spec.program
        );

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: req.rows,
                cols: req.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| anyhow!("Failed to open pty for terminal '{}': {e}", req.id))?;

        let builder = spec.into_builder(&req.cwd);
        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| anyhow!("Failed to spawn shell for terminal '{}': {e}", req.id))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone pty reader")?;
        let writer = pair.master.take_writer().context("Failed to take pty writer")?;

        let (tx, rx) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
        let handle = Arc::new(TerminalHandle {
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            child: Mutex::new(child),
            tx: tx.clone(),
        });
        self.terminals.insert(req.id.clone(), handle);
        self.spawn_reader(req.id, req.visibility, reader, tx);
        Ok(rx)
    }

    async fn write(&self, id: &str, data: Vec<u8>) -> Result<()> {
        let handle = self
            .terminals
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                anyhow!(LeitError::TerminalNotFound {
                    terminal_id: id.to_string(),
                })
            })?;
        let mut writer = handle
            .writer
            .lock()
            .map_err(|_| anyhow!("Writer lock poisoned for terminal '{id}'"))?;
        writer.write_all(&data).map_err(|e| {
            anyhow!(LeitError::TerminalOperationFailed {
                terminal_id: id.to_string(),
                operation: "write".to_string(),
                message: e.to_string(),
            })
        })?;
        writer.flush().ok();
        Ok(())
    }

    async fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        let handle = self
            .terminals
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                anyhow!(LeitError::TerminalNotFound {
                    terminal_id: id.to_string(),
                })
            })?;
        let master = handle
            .master
            .lock()
            .map_err(|_| anyhow!("Master lock poisoned for terminal '{id}'"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| {
                anyhow!(LeitError::TerminalOperationFailed {
                    terminal_id: id.to_string(),
                    operation: "resize".to_string(),
                    message: e.to_string(),
                })
            })
    }

    async fn kill(&self, id: &str) -> Result<()> {
        match self.terminals.remove(id) {
            Some((_, handle)) => {
                Self::kill_handle(id, &handle);
                Ok(())
            }
            None => {
                // Killing an already-gone terminal is expected during
                // close/delete races, not an error.
                log::debug!("Kill requested for unknown terminal '{id}'");
                Ok(())
            }
        }
    }

    async fn exists(&self, id: &str) -> bool {
        self.terminals.contains_key(id)
    }

    fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<TerminalOutput>> {
        self.terminals
            .get(id)
            .map(|e| e.value().tx.subscribe())
            .ok_or_else(|| {
                anyhow!(LeitError::TerminalNotFound {
                    terminal_id: id.to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn create_write_kill_roundtrip() {
        let manager = TerminalManager::new(EventBus::default());
        let tmp = tempfile::TempDir::new().unwrap();
        let req = CreateTerminalRequest::hidden("t1".to_string(), tmp.path().to_path_buf());

        let mut rx = manager.create(req).await.unwrap();
        assert!(manager.exists("t1").await);

        manager.write("t1", b"true\r".to_vec()).await.unwrap();
        manager.resize("t1", 100, 30).await.unwrap();

        manager.kill("t1").await.unwrap();
        assert!(!manager.exists("t1").await);

        // After the kill the reader drains to Exited.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(TerminalOutput::Exited)) => break,
                Ok(Ok(TerminalOutput::Chunk(_))) => continue,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
                other => panic!("expected Exited, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let manager = TerminalManager::new(EventBus::default());
        let tmp = tempfile::TempDir::new().unwrap();
        let req = CreateTerminalRequest::hidden("dup".to_string(), tmp.path().to_path_buf());
        manager.create(req.clone()).await.unwrap();
        assert!(manager.create(req).await.is_err());
        manager.kill_all();
    }

    #[tokio::test]
    async fn write_to_missing_terminal_fails() {
        let manager = TerminalManager::new(EventBus::default());
        let err = manager.write("ghost", b"x".to_vec()).await.unwrap_err();
        assert!(err.downcast_ref::<LeitError>().is_some());
    }

    #[tokio::test]
    async fn kill_of_missing_terminal_is_silent() {
        let manager = TerminalManager::new(EventBus::default());
        assert!(manager.kill("ghost").await.is_ok());
    }
}
