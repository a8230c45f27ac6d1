//! One-shot administrative commands over a single shared hidden terminal.
//!
//! Completion is detected by the shell-readiness heuristic: the command echo
//! arrives first, then the command's output, then a fresh prompt. Calls are
//! serialized through an internal mutex — two in-flight commands on one
//! terminal would corrupt both results' output boundaries.

use crate::domains::terminal::manager::{CreateTerminalRequest, TerminalBackend, TerminalOutput};
use crate::domains::terminal::readiness;
use crate::domains::terminal::RUNNER_TERMINAL_ID;
use crate::errors::LeitError;
use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;

pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CommandRunner {
    terminal: Arc<dyn TerminalBackend>,
    cwd: PathBuf,
    /// Guards the whole run: spawn-once flag and the output boundary.
    state: Mutex<RunnerState>,
}

#[derive(Default)]
struct RunnerState {
    spawned: bool,
}

impl CommandRunner {
    pub fn new(terminal: Arc<dyn TerminalBackend>, cwd: PathBuf) -> Self {
        Self {
            terminal,
            cwd,
            state: Mutex::new(RunnerState::default()),
        }
    }

    /// Runs one command line and returns its output with the echo and the
    /// trailing prompt stripped. Times out with [`LeitError::CommandTimedOut`]
    /// after ten seconds; the shared terminal is left running for the next
    /// call (a hang is assumed to be transient program state, not terminal
    /// corruption).
    pub async fn run(&self, command_line: &str) -> Result<String> {
        let mut state = self.state.lock().await;

        if !state.spawned {
            self.spawn_terminal().await?;
            state.spawned = true;
        }

        let mut rx = self.terminal.subscribe(RUNNER_TERMINAL_ID)?;
        let mut data = command_line.as_bytes().to_vec();
        data.push(b'\r');
        self.terminal.write(RUNNER_TERMINAL_ID, data).await?;

        let raw = collect_until_ready(&mut rx, command_line).await?;
        Ok(strip_command_output(&raw))
    }

    /// Lazily spawns the shared terminal and waits for its first prompt, so
    /// the first command is not typed into a half-initialized shell.
    async fn spawn_terminal(&self) -> Result<()> {
        log::info!("Spawning shared command-runner terminal");
        let mut rx = self
            .terminal
            .create(CreateTerminalRequest::hidden(
                RUNNER_TERMINAL_ID.to_string(),
                self.cwd.clone(),
            ))
            .await?;
        collect_until_ready(&mut rx, "shell startup").await?;
        Ok(())
    }
}

async fn collect_until_ready(
    rx: &mut broadcast::Receiver<TerminalOutput>,
    command_line: &str,
) -> Result<String> {
    let deadline = Instant::now() + COMMAND_TIMEOUT;
    let mut buffer = String::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(anyhow!(LeitError::CommandTimedOut {
                command: command_line.to_string(),
            }));
        }

        match tokio::time::timeout(remaining, rx.recv()).await {
            Err(_) => {
                return Err(anyhow!(LeitError::CommandTimedOut {
                    command: command_line.to_string(),
                }));
            }
            Ok(Ok(TerminalOutput::Chunk(bytes))) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                if readiness::shell_ready(&buffer, 0).is_some() {
                    return Ok(buffer);
                }
            }
            Ok(Ok(TerminalOutput::Exited)) | Ok(Err(broadcast::error::RecvError::Closed)) => {
                return Err(anyhow!("Command-runner terminal exited"));
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                log::warn!("Command runner lagged, {skipped} chunks dropped");
            }
        }
    }
}

/// Drops the first line (the command echo) and the last line (the fresh
/// prompt) of a completed command's raw output.
pub fn strip_command_output(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    if !lines.is_empty() {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::terminal::readiness::BRACKETED_PASTE_ENABLE;
    use crate::domains::terminal::testing::ScriptedTerminal;

    fn runner_with_echoing_shell() -> (CommandRunner, Arc<ScriptedTerminal>) {
        let terminal = Arc::new(ScriptedTerminal::new());
        terminal.set_initial_output(format!("banner\n{BRACKETED_PASTE_ENABLE}").as_bytes());
        terminal.set_responder(|id, written| {
            if id != RUNNER_TERMINAL_ID {
                return None;
            }
            let command = written.trim_end_matches('\r');
            Some(
                format!("{command}\nout<{command}>\n{BRACKETED_PASTE_ENABLE}$ ").into_bytes(),
            )
        });
        let runner = CommandRunner::new(terminal.clone(), std::env::temp_dir());
        (runner, terminal)
    }

    #[tokio::test]
    async fn run_strips_echo_and_prompt() {
        let (runner, _terminal) = runner_with_echoing_shell();
        let output = runner.run("claude mcp remove linear").await.unwrap();
        assert_eq!(output, "out<claude mcp remove linear>");
    }

    #[tokio::test]
    async fn terminal_is_spawned_once_and_reused() {
        let (runner, terminal) = runner_with_echoing_shell();
        runner.run("first").await.unwrap();
        runner.run("second").await.unwrap();
        assert!(terminal.exists(RUNNER_TERMINAL_ID).await);
        // Both commands went through the same terminal.
        let writes = terminal.writes_for(RUNNER_TERMINAL_ID);
        assert_eq!(writes, vec!["first\r".to_string(), "second\r".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_runs_keep_their_output_boundaries() {
        let (runner, _terminal) = runner_with_echoing_shell();
        let runner = Arc::new(runner);

        let a = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run("alpha").await.unwrap() })
        };
        let b = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run("beta").await.unwrap() })
        };

        let out_a = a.await.unwrap();
        let out_b = b.await.unwrap();
        assert_eq!(out_a, "out<alpha>");
        assert_eq!(out_b, "out<beta>");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_distinguishable_and_leaves_terminal_running() {
        let terminal = Arc::new(ScriptedTerminal::new());
        terminal.set_initial_output(BRACKETED_PASTE_ENABLE.as_bytes());
        // No responder: the command never completes.
        let runner = CommandRunner::new(terminal.clone(), std::env::temp_dir());

        let err = runner.run("claude mcp get linear").await.unwrap_err();
        match err.downcast_ref::<LeitError>() {
            Some(LeitError::CommandTimedOut { command }) => {
                assert_eq!(command, "claude mcp get linear");
            }
            other => panic!("expected CommandTimedOut, got {other:?}"),
        }
        assert!(terminal.exists(RUNNER_TERMINAL_ID).await);
    }

    #[test]
    fn strip_handles_short_output() {
        assert_eq!(strip_command_output("echo\nprompt"), "");
        assert_eq!(strip_command_output("single"), "");
        assert_eq!(strip_command_output(""), "");
        assert_eq!(strip_command_output("echo\nbody\nprompt"), "body");
    }
}
