//! Orchestration of the full session lifecycle: validate, provision, spawn,
//! drive to the agent, poll, and tear down.

use crate::domains::git;
use crate::domains::mcp::{
    self, CommandRunner, StatusPollerParams, parse_server_details, spawn_status_poller,
};
use crate::domains::sessions::entity::{PersistedSession, SessionConfig, SessionType};
use crate::domains::sessions::process_map::{
    PollerProcess, PollerRegistry, ProcessRegistry, SessionProcess,
};
use crate::domains::sessions::registry::SessionRegistry;
use crate::domains::settings::{McpServerConfig, SettingsService, TerminalSettings};
use crate::domains::terminal::driver::{DriveOutcome, SessionDriverParams, drive_session};
use crate::domains::terminal::manager::{
    CreateTerminalRequest, DEFAULT_COLS, DEFAULT_ROWS, OutputVisibility, TerminalBackend,
};
use crate::domains::terminal::{terminal_id_for_poller, terminal_id_for_session};
use crate::domains::worktree::{self, ProvisionRequest};
use crate::errors::LeitError;
use crate::infrastructure::events::{EventBus, LeitEvent};
use crate::infrastructure::store::KvStore;
use anyhow::{Result, anyhow};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionManager {
    registry: SessionRegistry,
    settings: SettingsService,
    processes: ProcessRegistry,
    pollers: PollerRegistry,
    terminals: Arc<dyn TerminalBackend>,
    runner: Arc<CommandRunner>,
    events: EventBus,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn KvStore>,
        terminals: Arc<dyn TerminalBackend>,
        events: EventBus,
    ) -> Self {
        let runner_cwd = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            registry: SessionRegistry::new(store.clone()),
            settings: SettingsService::new(store),
            processes: ProcessRegistry::default(),
            pollers: PollerRegistry::default(),
            runner: Arc::new(CommandRunner::new(terminals.clone(), runner_cwd)),
            terminals,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    /// Loads the persisted collection and announces it; called once at
    /// application startup.
    pub fn startup(&self) -> Result<Vec<PersistedSession>> {
        let sessions = self.registry.list()?;
        log::info!("Restored {} persisted sessions", sessions.len());
        self.events.emit(LeitEvent::SessionsLoaded {
            sessions: sessions.clone(),
        });
        Ok(sessions)
    }

    pub fn list_sessions(&self) -> Result<Vec<PersistedSession>> {
        self.registry.list()
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<PersistedSession>> {
        self.registry.get(session_id)
    }

    /// A session is running iff it has a live terminal process.
    pub fn is_running(&self, session_id: &str) -> bool {
        self.processes.has(session_id)
    }

    pub async fn create_session(&self, config: SessionConfig) -> Result<PersistedSession> {
        match self.create_session_inner(config).await {
            Ok(session) => {
                self.events.emit(LeitEvent::SessionCreated {
                    session: Box::new(session.clone()),
                });
                Ok(session)
            }
            Err(e) => {
                self.events.emit(LeitEvent::SessionError {
                    message: format!("Failed to create session: {e}"),
                });
                Err(e)
            }
        }
    }

    async fn create_session_inner(&self, config: SessionConfig) -> Result<PersistedSession> {
        self.validate_config(&config)?;

        let number = self.registry.next_session_number()?;
        let id = Uuid::new_v4().to_string();
        let session_uuid = Uuid::new_v4().to_string();
        let name = config
            .branch_name
            .clone()
            .unwrap_or_else(|| format!("session{number}"));

        let (worktree_path, git_branch) = match config.session_type {
            SessionType::Worktree => {
                let provisioned = worktree::provision(&ProvisionRequest {
                    project_dir: &config.project_directory,
                    worktree_root: &self.settings.worktree_root(),
                    parent_branch: config.parent_branch.as_deref().unwrap_or_default(),
                    session_number: number,
                    session_uuid: &session_uuid,
                    custom_name: config.branch_name.as_deref(),
                })?;
                (provisioned.worktree_path, Some(provisioned.branch_name))
            }
            SessionType::Local => (config.project_directory.clone(), None),
        };

        let mcp_config_path = self.write_mcp_config(&config, &worktree_path)?;

        let session = PersistedSession {
            id,
            number,
            name,
            config: config.clone(),
            worktree_path,
            created_at: Utc::now(),
            session_uuid,
            git_branch,
            mcp_config_path,
        };
        self.registry.insert(session.clone())?;

        if let Err(e) = self.settings.set_last_session_config(&config) {
            log::warn!("Failed to remember last session config: {e}");
        }

        self.spawn_session_runtime(&session, false).await?;
        Ok(session)
    }

    fn validate_config(&self, config: &SessionConfig) -> Result<()> {
        if !config.project_directory.is_dir() {
            return Err(anyhow!(LeitError::invalid_input(
                "project_directory",
                format!("{} is not a directory", config.project_directory.display()),
            )));
        }

        if config.session_type == SessionType::Worktree {
            let parent = config.parent_branch.as_deref().unwrap_or_default();
            if parent.trim().is_empty() {
                return Err(anyhow!(LeitError::invalid_input(
                    "parent_branch",
                    "worktree sessions need a parent branch",
                )));
            }
            if !git::repository_has_commits(&config.project_directory).unwrap_or(false) {
                return Err(anyhow!(LeitError::invalid_input(
                    "project_directory",
                    "not a git repository with at least one commit",
                )));
            }
        }

        if let Some(branch) = config.branch_name.as_deref()
            && config.session_type == SessionType::Worktree
            && git::branch_exists(&config.project_directory, branch).unwrap_or(false)
        {
            return Err(anyhow!(LeitError::invalid_input(
                "branch_name",
                format!("branch '{branch}' already exists"),
            )));
        }

        Ok(())
    }

    /// Materializes the project's MCP server definitions into a per-session
    /// config file the agent is pointed at.
    fn write_mcp_config(
        &self,
        config: &SessionConfig,
        worktree_path: &Path,
    ) -> Result<Option<PathBuf>> {
        if !config.coding_agent.supports_status_poller() {
            return Ok(None);
        }
        let servers = self.settings.mcp_servers()?;
        if servers.is_empty() {
            return Ok(None);
        }

        let dir = worktree_path.join(".leitwerk");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("mcp.json");
        let doc = serde_json::json!({ "mcpServers": servers });
        std::fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        log::info!("Wrote MCP config to {}", path.display());
        Ok(Some(path))
    }

    async fn spawn_session_runtime(
        &self,
        session: &PersistedSession,
        resume: bool,
    ) -> Result<()> {
        let terminal_id = terminal_id_for_session(&session.id);
        let rx = self
            .terminals
            .create(CreateTerminalRequest {
                id: terminal_id.clone(),
                cwd: session.worktree_path.clone(),
                cols: DEFAULT_COLS,
                rows: DEFAULT_ROWS,
                env: Vec::new(),
                visibility: OutputVisibility::Forwarded {
                    session_id: session.id.clone(),
                },
            })
            .await?;
        self.processes.set(
            &session.id,
            SessionProcess {
                terminal_id: terminal_id.clone(),
            },
        );

        let (attached_tx, attached_rx) = oneshot::channel();
        let params = SessionDriverParams {
            session_id: session.id.clone(),
            terminal_id,
            agent: session.config.coding_agent,
            session_uuid: session.session_uuid.clone(),
            resume,
            skip_permissions: session.config.skip_permissions,
            mcp_config_path: session.mcp_config_path.clone(),
            setup_commands: session.config.setup_commands.clone(),
            initial_prompt: if resume {
                None
            } else {
                session.config.initial_prompt.clone()
            },
            binary_override: None,
            extra_args: self.settings.agent_extra_args(session.config.coding_agent),
            attached: Some(attached_tx),
        };

        // Once the agent launch command is written, start the status poller.
        {
            let manager = self.clone();
            let session = session.clone();
            tokio::spawn(async move {
                if attached_rx.await.is_ok() {
                    manager.ensure_poller(&session);
                }
            });
        }

        let terminals = self.terminals.clone();
        let events = self.events.clone();
        let processes = self.processes.clone();
        let session_id = session.id.clone();
        let driver_terminal_id = params.terminal_id.clone();
        tokio::spawn(async move {
            // Only clear the map entry this driver's terminal owns; a reopen
            // may already have installed a fresh one.
            let remove_own_entry = || {
                if processes
                    .get(&session_id)
                    .is_some_and(|p| p.terminal_id == driver_terminal_id)
                {
                    processes.remove(&session_id);
                }
            };
            match drive_session(terminals, events.clone(), rx, params).await {
                Ok(DriveOutcome::Attached) => {}
                Ok(DriveOutcome::ExitedEarly { state }) => {
                    remove_own_entry();
                    events.emit(LeitEvent::SessionError {
                        message: format!(
                            "Session terminal exited before the agent launched ({state:?})"
                        ),
                    });
                }
                Err(e) => {
                    remove_own_entry();
                    events.emit(LeitEvent::SessionError {
                        message: format!("Session driver failed: {e}"),
                    });
                }
            }
        });

        Ok(())
    }

    fn ensure_poller(&self, session: &PersistedSession) {
        if !session.config.coding_agent.supports_status_poller() {
            return;
        }
        if self.pollers.has(&session.id) {
            return;
        }
        let terminal_id = terminal_id_for_poller(&session.id);
        self.pollers.set(
            &session.id,
            PollerProcess {
                terminal_id: terminal_id.clone(),
            },
        );
        spawn_status_poller(
            self.terminals.clone(),
            self.events.clone(),
            self.pollers.clone(),
            StatusPollerParams {
                session_id: session.id.clone(),
                terminal_id,
                agent: session.config.coding_agent,
                cwd: session.worktree_path.clone(),
            },
        );
    }

    /// Respawns the terminal for a closed session and resumes the agent with
    /// the persisted session uuid.
    pub async fn reopen_session(&self, session_id: &str) -> Result<()> {
        let session = self.registry.get(session_id)?.ok_or_else(|| {
            anyhow!(LeitError::SessionNotFound {
                session_id: session_id.to_string(),
            })
        })?;

        if self.processes.has(session_id) {
            log::warn!("Session '{session_id}' is already running, ignoring reopen");
            return Ok(());
        }

        self.spawn_session_runtime(&session, true).await?;
        self.events.emit(LeitEvent::SessionReopened {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Kills the session's processes but keeps the persisted record.
    pub async fn close_session(&self, session_id: &str) {
        self.kill_session_processes(session_id).await;
    }

    async fn kill_session_processes(&self, session_id: &str) {
        if let Some(process) = self.processes.remove(session_id) {
            if let Err(e) = self.terminals.kill(&process.terminal_id).await {
                log::warn!("Failed to kill terminal for session '{session_id}': {e}");
            }
        }
        if let Some(poller) = self.pollers.remove(session_id) {
            if let Err(e) = self.terminals.kill(&poller.terminal_id).await {
                log::warn!("Failed to kill poller for session '{session_id}': {e}");
            }
        }
    }

    /// Removes the record, the worktree and the branch, and kills any live
    /// processes. Repository cleanup is best-effort: the record removal must
    /// succeed even when the worktree was already deleted externally.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let record = self.registry.get(session_id)?;

        self.kill_session_processes(session_id).await;

        if let Some(session) = &record
            && session.is_worktree()
        {
            worktree::teardown(
                &session.config.project_directory,
                &session.worktree_path,
                session.git_branch.as_deref(),
            );
        }

        if self.registry.remove(session_id)?.is_none() && record.is_none() {
            log::warn!("Delete requested for unknown session '{session_id}'");
        }

        self.events.emit(LeitEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    pub fn rename_session(&self, session_id: &str, new_name: &str) -> Result<()> {
        self.registry.rename(session_id, new_name)
    }

    /// Raw input from the UI terminal. A closed session receiving stale
    /// events is expected; it is silently ignored.
    pub async fn write_session_input(&self, session_id: &str, data: Vec<u8>) {
        let Some(process) = self.processes.get(session_id) else {
            log::debug!("Input for closed session '{session_id}' ignored");
            return;
        };
        if let Err(e) = self.terminals.write(&process.terminal_id, data).await {
            log::warn!("Failed to write to session '{session_id}': {e}");
        }
    }

    pub async fn resize_session(&self, session_id: &str, cols: u16, rows: u16) {
        let Some(process) = self.processes.get(session_id) else {
            log::debug!("Resize for closed session '{session_id}' ignored");
            return;
        };
        if let Err(e) = self
            .terminals
            .resize(&process.terminal_id, cols, rows)
            .await
        {
            log::warn!("Failed to resize session '{session_id}': {e}");
        }
    }

    /// Branch list with the repository's primary branch first; all other
    /// branches keep their original relative order.
    pub fn list_branches(&self, directory: &Path) -> Result<Vec<String>> {
        let branches = git::list_branches(directory)?;
        Ok(git::sort_primary_branches_first(branches))
    }

    pub fn save_settings(&self, settings: &TerminalSettings) -> Result<()> {
        self.settings.save_terminal_settings(settings)
    }

    /// Triggers an asynchronous status refresh; results arrive through the
    /// `servers-updated` event.
    pub async fn list_servers(&self, session_id: &str) -> Result<()> {
        let session = self.registry.get(session_id)?.ok_or_else(|| {
            anyhow!(LeitError::SessionNotFound {
                session_id: session_id.to_string(),
            })
        })?;

        if let Some(poller) = self.pollers.get(session_id) {
            if let Some(command) = session.config.coding_agent.status_list_command() {
                let mut data = command.into_bytes();
                data.push(b'\r');
                self.terminals.write(&poller.terminal_id, data).await?;
            }
        } else if self.processes.has(session_id) {
            self.ensure_poller(&session);
        } else {
            log::debug!("Server refresh for closed session '{session_id}' ignored");
        }
        Ok(())
    }

    pub async fn add_server(&self, name: &str, config: &McpServerConfig) -> Result<String> {
        let command = mcp::add_server_command(&mcp::admin_binary(), name, config);
        self.runner.run(&command).await
    }

    pub async fn remove_server(&self, name: &str) -> Result<String> {
        let command = mcp::remove_server_command(&mcp::admin_binary(), name);
        self.runner.run(&command).await
    }

    pub async fn get_server_details(&self, name: &str) -> Result<Vec<(String, String)>> {
        let command = mcp::get_server_command(&mcp::admin_binary(), name);
        let output = self.runner.run(&command).await?;
        Ok(parse_server_details(&output))
    }

    /// Kills every live process; persisted records are untouched.
    pub async fn shutdown(&self) {
        for session_id in self.processes.session_ids() {
            self.kill_session_processes(&session_id).await;
        }
    }
}
