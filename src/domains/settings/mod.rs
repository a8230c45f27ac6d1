pub mod types;

pub use types::{AgentCliArgs, McpServerConfig, TerminalSettings};

use crate::domains::agents::CodingAgent;
use crate::domains::sessions::entity::SessionConfig;
use crate::infrastructure::store::{KvStore, get_typed, set_typed};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const TERMINAL_SETTINGS_KEY: &str = "terminal_settings";
pub const LAST_SESSION_CONFIG_KEY: &str = "last_session_config";
pub const MCP_SERVERS_KEY: &str = "mcp_servers";

#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn KvStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn terminal_settings(&self) -> Result<TerminalSettings> {
        Ok(get_typed(self.store.as_ref(), TERMINAL_SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_terminal_settings(&self, settings: &TerminalSettings) -> Result<()> {
        set_typed(self.store.as_ref(), TERMINAL_SETTINGS_KEY, settings)
    }

    /// Most recently used creation config, for prepopulating the next one.
    pub fn last_session_config(&self) -> Result<Option<SessionConfig>> {
        get_typed(self.store.as_ref(), LAST_SESSION_CONFIG_KEY)
    }

    pub fn set_last_session_config(&self, config: &SessionConfig) -> Result<()> {
        set_typed(self.store.as_ref(), LAST_SESSION_CONFIG_KEY, config)
    }

    /// Project-level MCP server definitions to materialize into per-session
    /// config files.
    pub fn mcp_servers(&self) -> Result<BTreeMap<String, McpServerConfig>> {
        Ok(get_typed(self.store.as_ref(), MCP_SERVERS_KEY)?.unwrap_or_default())
    }

    /// Root under which all per-project worktree directories live.
    pub fn worktree_root(&self) -> PathBuf {
        if let Ok(settings) = self.terminal_settings()
            && let Some(root) = settings.worktree_root
        {
            return root;
        }
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".leitwerk")
            .join("worktrees")
    }

    pub fn agent_extra_args(&self, agent: CodingAgent) -> String {
        let args = self
            .terminal_settings()
            .map(|s| s.agent_cli_args)
            .unwrap_or_default();
        match agent {
            CodingAgent::Claude => args.claude,
            CodingAgent::Codex => args.codex,
        }
    }
}
