//! Periodic, hidden refresh of per-project server status. One poller PTY per
//! session; output is parsed, never displayed.

use super::parser;
use crate::domains::agents::CodingAgent;
use crate::domains::sessions::process_map::PollerRegistry;
use crate::domains::terminal::manager::{CreateTerminalRequest, TerminalBackend, TerminalOutput};
use crate::domains::terminal::readiness::BRACKETED_PASTE_ENABLE;
use crate::infrastructure::events::{EventBus, LeitEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Prompt evidence used to clear the accumulation buffer between cycles.
/// Narrower than the general readiness tokens: status glyphs appear inside
/// listing lines and must not truncate a listing that is still streaming.
const RESET_TOKENS: &[&str] = &["$ ", "% ", "\u{276f}"];

pub struct StatusPollerParams {
    pub session_id: String,
    pub terminal_id: String,
    pub agent: CodingAgent,
    pub cwd: PathBuf,
}

fn prompt_reappeared(tail: &str) -> bool {
    if tail.contains(BRACKETED_PASTE_ENABLE) {
        return true;
    }
    RESET_TOKENS.iter().any(|t| tail.contains(t))
}

/// Spawns the poller task. The loop self-cancels by checking registry
/// membership before each cycle; removing the registry entry (and killing the
/// terminal) is the cancellation mechanism.
pub fn spawn_status_poller(
    terminal: Arc<dyn TerminalBackend>,
    events: EventBus,
    pollers: PollerRegistry,
    params: StatusPollerParams,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some(status_command) = params.agent.status_list_command() else {
            log::debug!(
                "Agent {} has no status listing; poller for '{}' not started",
                params.agent,
                params.session_id
            );
            pollers.remove(&params.session_id);
            return;
        };

        let rx = match terminal
            .create(CreateTerminalRequest::hidden(
                params.terminal_id.clone(),
                params.cwd.clone(),
            ))
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                log::warn!(
                    "Failed to create poller terminal for session '{}': {e}",
                    params.session_id
                );
                pollers.remove(&params.session_id);
                return;
            }
        };

        poll_loop(terminal, events, pollers, params, status_command, rx).await;
    })
}

async fn poll_loop(
    terminal: Arc<dyn TerminalBackend>,
    events: EventBus,
    pollers: PollerRegistry,
    params: StatusPollerParams,
    status_command: String,
    mut rx: broadcast::Receiver<TerminalOutput>,
) {
    tokio::time::sleep(SETTLE_DELAY).await;

    let mut buffer = String::new();

    loop {
        if !pollers.has(&params.session_id) {
            log::debug!("Poller for session '{}' cancelled", params.session_id);
            break;
        }

        let mut data = status_command.as_bytes().to_vec();
        data.push(b'\r');
        if let Err(e) = terminal.write(&params.terminal_id, data).await {
            log::debug!(
                "Poller write failed for session '{}', stopping: {e}",
                params.session_id
            );
            break;
        }
        let command_mark = buffer.len();

        // Results arrive asynchronously; drain output until the next cycle.
        let deadline = Instant::now() + POLL_INTERVAL;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Err(_) => break,
                Ok(Ok(TerminalOutput::Chunk(bytes))) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    if let Some(servers) = parser::parse_server_list(&buffer) {
                        events.emit(LeitEvent::ServersUpdated {
                            session_id: params.session_id.clone(),
                            servers,
                        });
                    }

                    // Bound buffer growth: once the prompt has come back
                    // after the issued command, everything so far is consumed.
                    if buffer.len() > command_mark
                        && let Some(tail) = buffer.get(command_mark..)
                        && tail.contains(&status_command)
                        && prompt_reappeared(tail)
                    {
                        buffer.clear();
                    }
                }
                Ok(Ok(TerminalOutput::Exited))
                | Ok(Err(broadcast::error::RecvError::Closed)) => {
                    log::debug!(
                        "Poller terminal for session '{}' exited",
                        params.session_id
                    );
                    pollers.remove(&params.session_id);
                    return;
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    log::warn!(
                        "Poller for session '{}' lagged, {skipped} chunks dropped",
                        params.session_id
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::process_map::PollerProcess;
    use crate::domains::terminal::testing::ScriptedTerminal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SESSION: &str = "s1";
    const TERM: &str = "session-s1~x-poller";

    async fn next_servers_update(
        rx: &mut broadcast::Receiver<LeitEvent>,
    ) -> Vec<parser::ServerStatus> {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(300), rx.recv())
                .await
                .expect("expected a servers-updated event")
                .unwrap();
            if let LeitEvent::ServersUpdated { servers, .. } = event {
                return servers;
            }
        }
    }

    fn poller_setup(
        listing_for_cycle: impl Fn(usize) -> String + Send + Sync + 'static,
    ) -> (Arc<ScriptedTerminal>, EventBus, PollerRegistry) {
        let terminal = Arc::new(ScriptedTerminal::new());
        let cycles = AtomicUsize::new(0);
        terminal.set_responder(move |id, written| {
            if id != TERM || !written.contains("mcp list") {
                return None;
            }
            let cycle = cycles.fetch_add(1, Ordering::SeqCst);
            let command = written.trim_end_matches('\r');
            Some(
                format!(
                    "{command}\n{}\n{BRACKETED_PASTE_ENABLE}$ ",
                    listing_for_cycle(cycle)
                )
                .into_bytes(),
            )
        });

        let events = EventBus::default();
        let pollers = PollerRegistry::default();
        pollers.set(
            SESSION,
            PollerProcess {
                terminal_id: TERM.to_string(),
            },
        );
        (terminal, events, pollers)
    }

    fn params() -> StatusPollerParams {
        StatusPollerParams {
            session_id: SESSION.to_string(),
            terminal_id: TERM.to_string(),
            agent: CodingAgent::Claude,
            cwd: std::env::temp_dir(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn later_listing_replaces_earlier_one() {
        let (terminal, events, pollers) = poller_setup(|cycle| {
            if cycle == 0 {
                "filesystem: npx server-fs (stdio) - \u{2713} Connected\n\
                 linear: https://mcp.linear.app/sse (sse) - \u{2713} Connected"
                    .to_string()
            } else {
                "filesystem: npx server-fs (stdio) - \u{2713} Connected".to_string()
            }
        });
        let mut event_rx = events.subscribe();

        let handle = spawn_status_poller(terminal.clone(), events, pollers.clone(), params());

        let first = next_servers_update(&mut event_rx).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|s| s.connected));

        // The second complete listing omits "linear": no stale carryover.
        let second = next_servers_update(&mut event_rx).await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "filesystem");

        pollers.remove(SESSION);
        let _ = tokio::time::timeout(Duration::from_secs(120), handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_servers_sentinel_emits_empty_set() {
        let (terminal, events, pollers) =
            poller_setup(|_| "No MCP servers configured. Use `claude mcp add` to add one.".into());
        let mut event_rx = events.subscribe();

        let handle = spawn_status_poller(terminal, events, pollers.clone(), params());

        let servers = next_servers_update(&mut event_rx).await;
        assert!(servers.is_empty());

        pollers.remove(SESSION);
        let _ = tokio::time::timeout(Duration::from_secs(120), handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn removing_registry_entry_stops_the_loop() {
        let (terminal, events, pollers) =
            poller_setup(|_| "a: x (stdio) - \u{2713} Connected".to_string());
        let mut event_rx = events.subscribe();

        let handle =
            spawn_status_poller(terminal.clone(), events, pollers.clone(), params());
        let _ = next_servers_update(&mut event_rx).await;

        pollers.remove(SESSION);
        tokio::time::timeout(Duration::from_secs(120), handle)
            .await
            .expect("poller should stop after registry removal")
            .unwrap();

        let writes = terminal.writes_for(TERM);
        assert_eq!(writes.len(), 1, "no further poll after cancellation");
    }
}
