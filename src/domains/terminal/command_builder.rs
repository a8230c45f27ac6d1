use portable_pty::CommandBuilder;
use std::path::Path;

const TERM_PROGRAM_NAME: &str = "leitwerk";
const COLORTERM_VALUE: &str = "truecolor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn into_builder(self, cwd: &Path) -> CommandBuilder {
        let mut builder = CommandBuilder::new(self.program);
        for var in self.env_remove {
            builder.env_remove(var);
        }
        for arg in self.args {
            builder.arg(arg);
        }
        for (key, value) in self.env {
            builder.env(key, value);
        }
        builder.cwd(cwd);
        builder
    }
}

/// Interactive login shell spec for a session terminal. The shell's own
/// prompt machinery must stay intact — readiness detection depends on the
/// prompt and bracketed-paste sequences the shell emits.
pub fn build_shell_spec(cols: u16, rows: u16, extra_env: &[(String, String)]) -> CommandSpec {
    let mut env = build_environment(cols, rows);
    env.extend(extra_env.iter().cloned());

    let (program, args) = get_shell_config();
    env.push(("SHELL".to_string(), program.clone()));

    // PROMPT_COMMAND can rewrite the prompt on every command and defeat the
    // scrollback heuristics; the shell re-derives PS1 from its own rc files.
    let env_remove = vec!["PROMPT_COMMAND".to_string()];

    CommandSpec {
        program,
        args,
        env,
        env_remove,
    }
}

fn build_environment(cols: u16, rows: u16) -> Vec<(String, String)> {
    let mut env = vec![
        ("TERM".to_string(), "xterm-256color".to_string()),
        ("LINES".to_string(), rows.to_string()),
        ("COLUMNS".to_string(), cols.to_string()),
        ("CLICOLOR".to_string(), "1".to_string()),
        ("COLORTERM".to_string(), COLORTERM_VALUE.to_string()),
        ("TERM_PROGRAM".to_string(), TERM_PROGRAM_NAME.to_string()),
    ];

    let lang = std::env::var("LANG").unwrap_or_else(|_| "en_US.UTF-8".to_string());
    env.push(("LANG".to_string(), lang));

    if let Ok(home) = std::env::var("HOME") {
        env.push(("HOME".to_string(), home));
    }
    if let Ok(path) = std::env::var("PATH") {
        env.push(("PATH".to_string(), path));
    }

    env
}

#[cfg(unix)]
fn get_shell_config() -> (String, Vec<String>) {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
    (shell, vec!["-i".to_string(), "-l".to_string()])
}

#[cfg(windows)]
fn get_shell_config() -> (String, Vec<String>) {
    let shell = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
    (shell, Vec::new())
}
