use crate::domains::agents::CodingAgent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Isolated git worktree on its own branch.
    Worktree,
    /// Runs directly in the project directory.
    Local,
}

/// Immutable per-session configuration, supplied at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub project_directory: PathBuf,
    pub session_type: SessionType,
    /// Branch point for the worktree branch; required for worktree sessions.
    #[serde(default)]
    pub parent_branch: Option<String>,
    /// User-supplied override for the generated worktree/branch name.
    #[serde(default)]
    pub branch_name: Option<String>,
    pub coding_agent: CodingAgent,
    #[serde(default)]
    pub skip_permissions: bool,
    /// Shell commands run in order before the agent is launched; each must
    /// reach the next readiness signal before the next is sent.
    #[serde(default)]
    pub setup_commands: Vec<String>,
    /// Typed into the agent once its REPL shows its idle prompt.
    #[serde(default)]
    pub initial_prompt: Option<String>,
}

/// Durable session record; survives process restarts. The in-memory process
/// map, not this record, is the authoritative "currently running" signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub id: String,
    /// Unique and monotonic across the persisted collection (max + 1).
    pub number: u32,
    pub name: String,
    pub config: SessionConfig,
    /// Directory the session terminal actually runs in; equals the project
    /// directory for local sessions.
    pub worktree_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Passed to the agent for resumption. Generated once at creation and
    /// never regenerated; its first use launches "new", every later use
    /// launches "resume".
    pub session_uuid: String,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub mcp_config_path: Option<PathBuf>,
}

impl PersistedSession {
    pub fn is_worktree(&self) -> bool {
        self.config.session_type == SessionType::Worktree
    }
}
