pub mod claude;
pub mod codex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Closed set of launchable coding agents. Each variant owns its flag
/// conventions in its module; adding an agent is a new variant plus module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodingAgent {
    Claude,
    Codex,
}

impl CodingAgent {
    pub fn binary_name(&self) -> &'static str {
        match self {
            CodingAgent::Claude => "claude",
            CodingAgent::Codex => "codex",
        }
    }

    /// Whether the agent's CLI exposes the server-status subcommands the
    /// status poller and command runner drive.
    pub fn supports_status_poller(&self) -> bool {
        matches!(self, CodingAgent::Claude)
    }

    pub fn launch_command(&self, ctx: &AgentLaunchContext) -> String {
        match self {
            CodingAgent::Claude => claude::launch_command(ctx),
            CodingAgent::Codex => codex::launch_command(ctx),
        }
    }

    /// The periodic status-listing command issued by the poller.
    pub fn status_list_command(&self) -> Option<String> {
        match self {
            CodingAgent::Claude => Some(format!(
                "{} mcp list",
                format_binary_invocation(&resolve_agent_binary("claude"))
            )),
            CodingAgent::Codex => None,
        }
    }
}

impl std::fmt::Display for CodingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

pub struct AgentLaunchContext<'a> {
    pub session_uuid: &'a str,
    /// First spawn launches a fresh agent session; every reopen resumes it.
    pub resume: bool,
    pub skip_permissions: bool,
    pub mcp_config_path: Option<&'a Path>,
    pub binary_override: Option<&'a str>,
    /// User-configured extra CLI args, split with shell rules before joining.
    pub extra_args: &'a str,
}

impl<'a> AgentLaunchContext<'a> {
    pub fn new(session_uuid: &'a str, resume: bool) -> Self {
        Self {
            session_uuid,
            resume,
            skip_permissions: false,
            mcp_config_path: None,
            binary_override: None,
            extra_args: "",
        }
    }
}

pub(crate) fn resumption_args(ctx: &AgentLaunchContext) -> String {
    if ctx.resume {
        format!("--resume {}", ctx.session_uuid)
    } else {
        format!("--session-id {}", ctx.session_uuid)
    }
}

pub(crate) fn split_extra_args(extra: &str) -> Vec<String> {
    if extra.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(extra) {
        Ok(args) => args,
        Err(e) => {
            log::warn!("Ignoring malformed extra agent args '{extra}': {e}");
            Vec::new()
        }
    }
}

static USER_BIN_DIRS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut dirs = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local/bin"));
        dirs.push(home.join(".cargo/bin"));
        dirs.push(home.join("bin"));
    }
    for path in ["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/bin"] {
        dirs.push(PathBuf::from(path));
    }
    dirs
});

/// Resolves an agent command to an absolute path when possible. PTY shells
/// inherit a login PATH, but well-known user bin dirs are checked first so a
/// locally installed agent wins over a stale system copy.
pub(crate) fn resolve_agent_binary(command: &str) -> String {
    for dir in USER_BIN_DIRS.iter() {
        let full_path = dir.join(command);
        if full_path.exists() {
            log::debug!("Found {} at {}", command, full_path.display());
            return full_path.to_string_lossy().to_string();
        }
    }

    if let Ok(path) = which::which(command) {
        return path.to_string_lossy().to_string();
    }

    log::warn!("Could not resolve path for '{command}', using as-is");
    command.to_string()
}

pub(crate) fn format_binary_invocation(binary: &str) -> String {
    let trimmed = binary.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let needs_quoting = trimmed
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\\'));
    if !needs_quoting {
        return trimmed.to_string();
    }

    let mut escaped = String::with_capacity(trimmed.len() + 2);
    escaped.push('"');
    for ch in trimmed.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

pub(crate) fn sh_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | ':' | '=' | '@'))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}
