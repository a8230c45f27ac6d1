//! Parsing of the agent CLI's semi-structured server-status output. Pure
//! string functions so the grammar can be golden-tested against captured
//! transcripts without spawning processes.

use serde::{Deserialize, Serialize};

/// Printed by the CLI when the project has no servers registered.
pub const NO_SERVERS_SENTINEL: &str = "No MCP servers configured";

pub const CONNECTED_GLYPH: char = '\u{2713}';
pub const WARNING_GLYPH: char = '\u{26a0}';
pub const FAILED_GLYPH: char = '\u{2717}';

const TRANSPORTS: &[&str] = &["stdio", "sse", "http"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub name: String,
    pub connected: bool,
}

fn contains_word_connected(status: &str) -> bool {
    status
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case("connected"))
}

/// Matches one `<name>: <details> (<transport>) - <status>` line.
pub fn parse_status_line(line: &str) -> Option<ServerStatus> {
    let (name, rest) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    // The transport parenthetical is the last one before the status marker;
    // details may themselves contain parentheses.
    let open = rest.rfind('(')?;
    let close = rest[open..].find(')')? + open;
    let transport = rest[open + 1..close].trim();
    if !TRANSPORTS.iter().any(|t| transport.eq_ignore_ascii_case(t)) {
        return None;
    }

    let status = rest[close + 1..].trim_start();
    let status = status.strip_prefix('-')?.trim();
    if status.is_empty() {
        return None;
    }

    let connected = status.contains(CONNECTED_GLYPH) || contains_word_connected(status);
    Some(ServerStatus {
        name: name.to_string(),
        connected,
    })
}

/// Parses every status line in the accumulated output. Returns `Some` when
/// the text contains at least one server line or the no-servers sentinel —
/// the result always REPLACES the previous set, because the CLI reprints its
/// complete state on every listing. Duplicate names keep the last occurrence.
pub fn parse_server_list(text: &str) -> Option<Vec<ServerStatus>> {
    let mut servers: Vec<ServerStatus> = Vec::new();
    for line in text.lines() {
        if let Some(status) = parse_status_line(line) {
            servers.retain(|s| s.name != status.name);
            servers.push(status);
        }
    }

    if !servers.is_empty() {
        return Some(servers);
    }
    if text.contains(NO_SERVERS_SENTINEL) {
        return Some(Vec::new());
    }
    None
}

/// Line-oriented `Key: value` output of the describe subcommand.
pub fn parse_server_details(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty()
            || value.is_empty()
            || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '_')
        {
            continue;
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    pairs
}
