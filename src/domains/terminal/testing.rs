//! Scripted in-memory [`TerminalBackend`] for exercising drivers, pollers and
//! the command runner without spawning real PTYs. Responses are produced
//! synchronously from a responder closure, so tests stay deterministic.

use super::manager::{CreateTerminalRequest, TerminalBackend, TerminalOutput};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

type Responder = Box<dyn Fn(&str, &str) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedTerminal {
    channels: Mutex<HashMap<String, broadcast::Sender<TerminalOutput>>>,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    resizes: Mutex<Vec<(String, u16, u16)>>,
    responder: Mutex<Option<Responder>>,
    initial_output: Mutex<Option<Vec<u8>>>,
}

impl ScriptedTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure invoked for every write; a returned byte vector is delivered
    /// back as terminal output before `write` resolves.
    pub fn set_responder(
        &self,
        responder: impl Fn(&str, &str) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    /// Output delivered as soon as a terminal is created (the shell banner
    /// plus first prompt, typically).
    pub fn set_initial_output(&self, bytes: &[u8]) {
        *self.initial_output.lock().unwrap() = Some(bytes.to_vec());
    }

    pub fn push_output(&self, id: &str, bytes: &[u8]) {
        let channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.get(id) {
            let _ = tx.send(TerminalOutput::Chunk(bytes.to_vec()));
        }
    }

    pub fn push_exited(&self, id: &str) {
        let channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.get(id) {
            let _ = tx.send(TerminalOutput::Exited);
        }
    }

    pub fn writes_for(&self, id: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(wid, _)| wid == id)
            .map(|(_, data)| String::from_utf8_lossy(data).to_string())
            .collect()
    }

    pub fn resizes_for(&self, id: &str) -> Vec<(u16, u16)> {
        self.resizes
            .lock()
            .unwrap()
            .iter()
            .filter(|(rid, _, _)| rid == id)
            .map(|(_, c, r)| (*c, *r))
            .collect()
    }
}

#[async_trait]
impl TerminalBackend for ScriptedTerminal {
    async fn create(
        &self,
        req: CreateTerminalRequest,
    ) -> Result<broadcast::Receiver<TerminalOutput>> {
        let (tx, rx) = broadcast::channel(256);
        {
            let mut channels = self.channels.lock().unwrap();
            if channels.contains_key(&req.id) {
                return Err(anyhow!("terminal '{}' already exists", req.id));
            }
            channels.insert(req.id.clone(), tx.clone());
        }
        if let Some(bytes) = self.initial_output.lock().unwrap().clone() {
            let _ = tx.send(TerminalOutput::Chunk(bytes));
        }
        Ok(rx)
    }

    async fn write(&self, id: &str, data: Vec<u8>) -> Result<()> {
        let text = String::from_utf8_lossy(&data).to_string();
        self.writes.lock().unwrap().push((id.to_string(), data));

        let response = {
            let responder = self.responder.lock().unwrap();
            responder.as_ref().and_then(|r| r(id, &text))
        };
        if let Some(bytes) = response {
            self.push_output(id, &bytes);
        }
        Ok(())
    }

    async fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        self.resizes
            .lock()
            .unwrap()
            .push((id.to_string(), cols, rows));
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.remove(id) {
            let _ = tx.send(TerminalOutput::Exited);
        }
        Ok(())
    }

    async fn exists(&self, id: &str) -> bool {
        self.channels.lock().unwrap().contains_key(id)
    }

    fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<TerminalOutput>> {
        let channels = self.channels.lock().unwrap();
        channels
            .get(id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| anyhow!("terminal '{id}' not found"))
    }
}
