//! Brings a freshly spawned session shell to the point where the coding agent
//! is running: wait for shell readiness, feed setup commands one at a time,
//! then type the agent launch command.

use super::manager::{TerminalBackend, TerminalOutput};
use super::readiness;
use crate::domains::agents::{AgentLaunchContext, CodingAgent};
use crate::infrastructure::events::{EventBus, LeitEvent};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    AwaitingReady,
    RunningSetup(usize),
    LaunchingAgent,
    Attached,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The agent launch command was typed into the shell.
    Attached,
    /// The shell process exited (or its output channel closed) first.
    ExitedEarly { state: DriverState },
}

pub struct SessionDriverParams {
    pub session_id: String,
    pub terminal_id: String,
    pub agent: CodingAgent,
    pub session_uuid: String,
    pub resume: bool,
    pub skip_permissions: bool,
    pub mcp_config_path: Option<PathBuf>,
    pub setup_commands: Vec<String>,
    pub initial_prompt: Option<String>,
    pub binary_override: Option<String>,
    pub extra_args: String,
    /// Fired once, the moment the launch command has been written. The
    /// session manager uses this to start the status poller.
    pub attached: Option<oneshot::Sender<()>>,
}

/// Runs the readiness state machine over the terminal's output stream.
///
/// Output chunks arrive in emission order; the scan offset is advanced past
/// every consumed readiness marker and past everything buffered at the moment
/// an auto-typed command is written, so a stale prompt never gates the next
/// step twice.
pub async fn drive_session(
    terminal: Arc<dyn TerminalBackend>,
    events: EventBus,
    mut rx: broadcast::Receiver<TerminalOutput>,
    mut params: SessionDriverParams,
) -> Result<DriveOutcome> {
    let mut buffer = String::new();
    let mut offset = 0usize;
    let mut next_setup = 0usize;
    let mut state = DriverState::AwaitingReady;

    loop {
        let chunk = match rx.recv().await {
            Ok(TerminalOutput::Chunk(bytes)) => bytes,
            Ok(TerminalOutput::Exited) | Err(broadcast::error::RecvError::Closed) => {
                if state == DriverState::Attached {
                    return Ok(DriveOutcome::Attached);
                }
                log::warn!(
                    "Terminal '{}' exited before agent launch (state {state:?})",
                    params.terminal_id
                );
                return Ok(DriveOutcome::ExitedEarly { state });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!(
                    "Driver for terminal '{}' lagged, {skipped} chunks dropped",
                    params.terminal_id
                );
                continue;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        match state {
            DriverState::AwaitingReady | DriverState::RunningSetup(_) => {
                let Some(matched) = readiness::shell_ready(&buffer, offset) else {
                    continue;
                };
                offset = matched;

                if next_setup < params.setup_commands.len() {
                    let command = params.setup_commands[next_setup].clone();
                    log::info!(
                        "Session '{}': running setup command {}/{}",
                        params.session_id,
                        next_setup + 1,
                        params.setup_commands.len()
                    );
                    write_line(&terminal, &params.terminal_id, &command).await?;
                    // The next readiness signal must come from this command's
                    // completion, not from output already on screen.
                    offset = buffer.len();
                    state = DriverState::RunningSetup(next_setup);
                    next_setup += 1;
                } else {
                    state = DriverState::LaunchingAgent;
                    let ctx = AgentLaunchContext {
                        session_uuid: &params.session_uuid,
                        resume: params.resume,
                        skip_permissions: params.skip_permissions,
                        mcp_config_path: params.mcp_config_path.as_deref(),
                        binary_override: params.binary_override.as_deref(),
                        extra_args: &params.extra_args,
                    };
                    let launch = params.agent.launch_command(&ctx);
                    log::info!(
                        "Session '{}': launching agent ({})",
                        params.session_id,
                        params.agent
                    );
                    write_line(&terminal, &params.terminal_id, &launch).await?;
                    offset = buffer.len();
                    state = DriverState::Attached;
                    events.emit(LeitEvent::AgentStarted {
                        session_id: params.session_id.clone(),
                    });
                    if let Some(attached) = params.attached.take() {
                        let _ = attached.send(());
                    }
                    if params.initial_prompt.is_none() || params.resume {
                        return Ok(DriveOutcome::Attached);
                    }
                }
            }
            DriverState::Attached => {
                // Only reached while an initial prompt is pending: wait for
                // the agent's own idle prompt before typing into it.
                if readiness::agent_prompt_idle(&buffer, offset) {
                    if let Some(prompt) = params.initial_prompt.take() {
                        log::info!(
                            "Session '{}': sending initial prompt to agent",
                            params.session_id
                        );
                        write_line(&terminal, &params.terminal_id, &prompt).await?;
                    }
                    return Ok(DriveOutcome::Attached);
                }
            }
            DriverState::LaunchingAgent => unreachable!("transient state"),
        }
    }
}

async fn write_line(
    terminal: &Arc<dyn TerminalBackend>,
    terminal_id: &str,
    line: &str,
) -> Result<()> {
    let mut data = line.as_bytes().to_vec();
    data.push(b'\r');
    terminal.write(terminal_id, data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::terminal::manager::CreateTerminalRequest;
    use crate::domains::terminal::readiness::BRACKETED_PASTE_ENABLE;
    use crate::domains::terminal::testing::ScriptedTerminal;
    use std::time::Duration;

    const TERM_ID: &str = "session-test~00000000-agent";

    fn params(setup: Vec<&str>, resume: bool) -> SessionDriverParams {
        SessionDriverParams {
            session_id: "test".to_string(),
            terminal_id: TERM_ID.to_string(),
            agent: CodingAgent::Claude,
            session_uuid: "cafebabe-0000-0000-0000-000000000000".to_string(),
            resume,
            skip_permissions: false,
            mcp_config_path: None,
            setup_commands: setup.into_iter().map(String::from).collect(),
            initial_prompt: None,
            binary_override: Some("claude".to_string()),
            extra_args: String::new(),
            attached: None,
        }
    }

    fn ready_responding_terminal() -> Arc<ScriptedTerminal> {
        let terminal = Arc::new(ScriptedTerminal::new());
        terminal.set_initial_output(format!("welcome\n{BRACKETED_PASTE_ENABLE}").as_bytes());
        terminal.set_responder(|_, written| {
            // Echo plus a fresh prompt once the "command" finishes.
            Some(format!("{written}\ndone\n{BRACKETED_PASTE_ENABLE}").into_bytes())
        });
        terminal
    }

    async fn drive(
        terminal: Arc<ScriptedTerminal>,
        params: SessionDriverParams,
    ) -> DriveOutcome {
        let rx = terminal
            .create(CreateTerminalRequest::hidden(
                TERM_ID.to_string(),
                std::env::temp_dir(),
            ))
            .await
            .unwrap();
        let backend: Arc<dyn TerminalBackend> = terminal;
        tokio::time::timeout(
            Duration::from_secs(5),
            drive_session(backend, EventBus::default(), rx, params),
        )
        .await
        .expect("driver should finish")
        .expect("driver should not error")
    }

    #[tokio::test]
    async fn setup_commands_run_strictly_in_order() {
        let terminal = ready_responding_terminal();
        let outcome = drive(terminal.clone(), params(vec!["A", "B", "C"], false)).await;
        assert_eq!(outcome, DriveOutcome::Attached);

        let writes = terminal.writes_for(TERM_ID);
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], "A\r");
        assert_eq!(writes[1], "B\r");
        assert_eq!(writes[2], "C\r");
        assert!(writes[3].starts_with("claude --session-id"));
    }

    #[tokio::test]
    async fn no_setup_commands_launches_agent_directly() {
        let terminal = ready_responding_terminal();
        let outcome = drive(terminal.clone(), params(vec![], false)).await;
        assert_eq!(outcome, DriveOutcome::Attached);

        let writes = terminal.writes_for(TERM_ID);
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with("claude --session-id"));
        assert!(writes[0].ends_with('\r'));
    }

    #[tokio::test]
    async fn reopen_launches_agent_with_resume_flag() {
        let terminal = ready_responding_terminal();
        drive(terminal.clone(), params(vec![], true)).await;

        let writes = terminal.writes_for(TERM_ID);
        assert!(writes[0].starts_with("claude --resume cafebabe"));
    }

    #[tokio::test]
    async fn early_exit_surfaces_instead_of_hanging() {
        let terminal = Arc::new(ScriptedTerminal::new());
        let rx = terminal
            .create(CreateTerminalRequest::hidden(
                TERM_ID.to_string(),
                std::env::temp_dir(),
            ))
            .await
            .unwrap();
        terminal.push_exited(TERM_ID);

        let backend: Arc<dyn TerminalBackend> = terminal.clone();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            drive_session(backend, EventBus::default(), rx, params(vec!["A"], false)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            outcome,
            DriveOutcome::ExitedEarly {
                state: DriverState::AwaitingReady
            }
        );
        assert!(terminal.writes_for(TERM_ID).is_empty());
    }

    #[tokio::test]
    async fn initial_prompt_waits_for_agent_idle() {
        let terminal = Arc::new(ScriptedTerminal::new());
        terminal.set_initial_output(BRACKETED_PASTE_ENABLE.as_bytes());
        terminal.set_responder(|_, written| {
            if written.starts_with("claude") {
                // Streaming output first, then the agent's bare idle prompt.
                Some(b"claude starting...\nhello\n> \n".to_vec())
            } else {
                Some(format!("{written}\n{BRACKETED_PASTE_ENABLE}").into_bytes())
            }
        });

        let mut p = params(vec![], false);
        p.initial_prompt = Some("fix the failing test".to_string());
        let outcome = drive(terminal.clone(), p).await;
        assert_eq!(outcome, DriveOutcome::Attached);

        let writes = terminal.writes_for(TERM_ID);
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with("claude --session-id"));
        assert_eq!(writes[1], "fix the failing test\r");
    }

    #[tokio::test]
    async fn attached_signal_fires_on_launch() {
        let terminal = ready_responding_terminal();
        let (tx, rx_attached) = oneshot::channel();
        let mut p = params(vec![], false);
        p.attached = Some(tx);
        drive(terminal, p).await;
        assert!(rx_attached.await.is_ok());
    }
}
