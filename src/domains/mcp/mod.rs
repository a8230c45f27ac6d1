pub mod parser;
pub mod poller;
pub mod runner;

pub use parser::{NO_SERVERS_SENTINEL, ServerStatus, parse_server_details, parse_server_list};
pub use poller::{POLL_INTERVAL, SETTLE_DELAY, StatusPollerParams, spawn_status_poller};
pub use runner::{COMMAND_TIMEOUT, CommandRunner};

use crate::domains::agents::{format_binary_invocation, resolve_agent_binary, sh_quote};
use crate::domains::settings::McpServerConfig;

/// The CLI the administrative subcommands belong to.
pub fn admin_binary() -> String {
    format_binary_invocation(&resolve_agent_binary("claude"))
}

pub fn add_server_command(binary: &str, name: &str, config: &McpServerConfig) -> String {
    let mut parts = vec![binary.to_string(), "mcp add".to_string()];

    match config {
        McpServerConfig::Local { command, args, env } => {
            let mut env_pairs: Vec<_> = env.iter().collect();
            env_pairs.sort();
            for (key, value) in env_pairs {
                parts.push(format!("-e {}", sh_quote(&format!("{key}={value}"))));
            }
            parts.push(sh_quote(name));
            parts.push("--".to_string());
            parts.push(sh_quote(command));
            for arg in args {
                parts.push(sh_quote(arg));
            }
        }
        McpServerConfig::Remote { url, headers } => {
            let transport = if url.ends_with("/sse") { "sse" } else { "http" };
            parts.push(format!("--transport {transport}"));
            let mut header_pairs: Vec<_> = headers.iter().collect();
            header_pairs.sort();
            for (key, value) in header_pairs {
                parts.push(format!("--header {}", sh_quote(&format!("{key}: {value}"))));
            }
            parts.push(sh_quote(name));
            parts.push(sh_quote(url));
        }
    }

    parts.join(" ")
}

pub fn remove_server_command(binary: &str, name: &str) -> String {
    format!("{binary} mcp remove {}", sh_quote(name))
}

pub fn get_server_command(binary: &str, name: &str) -> String {
    format!("{binary} mcp get {}", sh_quote(name))
}
