use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum McpServerConfig {
    Local {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Remote {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AgentCliArgs {
    #[serde(default)]
    pub claude: String,
    #[serde(default)]
    pub codex: String,
}

/// Display preferences of the embedding shell plus the worktree root. The
/// core only interprets `worktree_root` and `agent_cli_args`; the rest is
/// persisted verbatim for the UI.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TerminalSettings {
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_size: Option<u16>,
    #[serde(default)]
    pub scrollback_lines: Option<u32>,
    #[serde(default)]
    pub worktree_root: Option<PathBuf>,
    #[serde(default)]
    pub agent_cli_args: AgentCliArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_config_untagged_roundtrip() {
        let local: McpServerConfig =
            serde_json::from_str(r#"{"command": "npx", "args": ["server-fs"]}"#).unwrap();
        assert!(matches!(local, McpServerConfig::Local { .. }));

        let remote: McpServerConfig =
            serde_json::from_str(r#"{"url": "https://mcp.linear.app/sse"}"#).unwrap();
        assert!(matches!(remote, McpServerConfig::Remote { .. }));
    }

    #[test]
    fn settings_tolerate_missing_fields() {
        let settings: TerminalSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, TerminalSettings::default());
    }
}
