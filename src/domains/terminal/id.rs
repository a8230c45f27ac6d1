const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const HASH_SLICE: usize = 8;

/// Shared hidden terminal used for one-shot administrative commands.
pub const RUNNER_TERMINAL_ID: &str = "mcp-runner";

pub fn sanitize_session_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

fn session_id_hash(id: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in id.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn session_id_fragment(id: &str) -> String {
    let hash_hex = format!("{:08x}", session_id_hash(id));
    hash_hex[..HASH_SLICE].to_string()
}

// Sanitizing can collapse distinct ids onto the same string; the hash
// fragment keeps the terminal id unique per session id.
fn session_terminal_base(id: &str) -> String {
    let sanitized = sanitize_session_id(id);
    let fragment = session_id_fragment(id);
    format!("session-{sanitized}~{fragment}")
}

/// Terminal id for the visible agent terminal of a session.
pub fn terminal_id_for_session(session_id: &str) -> String {
    format!("{}-agent", session_terminal_base(session_id))
}

/// Terminal id for the hidden status-poller terminal of a session.
pub fn terminal_id_for_poller(session_id: &str) -> String {
    format!("{}-poller", session_terminal_base(session_id))
}

pub fn is_poller_terminal_id(id: &str) -> bool {
    id.ends_with("-poller")
}
