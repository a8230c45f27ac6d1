//! Prompt heuristics over accumulating terminal output.
//!
//! There is no structured handshake with an arbitrary interactive shell, so
//! readiness is inferred from the scrollback text. Callers own the buffer and
//! the scan offset; these functions never mutate either. Advancing the offset
//! past a reported match is what prevents the same marker from firing twice.

/// Emitted by modern interactive shells once they are fully initialized and
/// accepting input (xterm bracketed paste mode enable).
pub const BRACKETED_PASTE_ENABLE: &str = "\x1b[?2004h";

/// Fallback trailing tokens for shells that never enable bracketed paste.
const PROMPT_TOKENS: &[&str] = &["$ ", "% ", "> ", "\u{276f}", "\u{279c}", "\u{2717}", "\u{2714}"];

/// Scans `buffer` from `offset` for evidence that the shell is ready for the
/// next line of input. Returns the byte offset just past the match, which the
/// caller should use as the next scan offset.
pub fn shell_ready(buffer: &str, offset: usize) -> Option<usize> {
    let tail = buffer.get(offset..)?;
    if tail.is_empty() {
        return None;
    }

    if let Some(idx) = tail.find(BRACKETED_PASTE_ENABLE) {
        return Some(offset + idx + BRACKETED_PASTE_ENABLE.len());
    }

    let mut earliest: Option<(usize, usize)> = None;
    for token in PROMPT_TOKENS {
        if let Some(idx) = tail.find(token) {
            let candidate = (idx, token.len());
            if earliest.map(|(e, _)| idx < e).unwrap_or(true) {
                earliest = Some(candidate);
            }
        }
    }

    earliest.map(|(idx, len)| offset + idx + len)
}

/// Detects the idle input prompt of an interactive coding-agent REPL: a line
/// consisting solely of the prompt marker, immediately followed by a line
/// break. Deliberately narrower than [`shell_ready`] — the agent's prompt
/// character appears mid-output during streaming responses, and a bare
/// substring match would fire far too early.
pub fn agent_prompt_idle(buffer: &str, offset: usize) -> bool {
    let Some(tail) = buffer.get(offset..) else {
        return false;
    };
    if tail.is_empty() {
        return false;
    }

    let normalized = tail.replace('\r', "");
    for marker in ["> ", ">", "\u{276f} ", "\u{276f}"] {
        let line = format!("{marker}\n");
        if normalized.starts_with(&line) {
            return true;
        }
        if normalized.contains(&format!("\n{line}")) {
            return true;
        }
    }
    false
}
