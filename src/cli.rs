use clap::{Parser, Subcommand, ValueEnum};
use leitwerk::CodingAgent;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "leitwerk",
    version,
    about = "Headless driver for the leitwerk session core"
)]
pub struct Cli {
    /// Path of the JSON state file (defaults to the user data directory).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a session and stream its events until interrupted.
    Run {
        /// Source repository root.
        #[arg(long)]
        project: PathBuf,
        #[arg(long, value_enum, default_value = "claude")]
        agent: AgentArg,
        /// Branch point for the worktree branch (omit with --local).
        #[arg(long)]
        parent_branch: Option<String>,
        /// Run directly in the project directory instead of a worktree.
        #[arg(long)]
        local: bool,
        /// Override for the generated worktree/branch name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        skip_permissions: bool,
        /// Shell command to run before the agent launches; repeatable.
        #[arg(long = "setup-command")]
        setup_commands: Vec<String>,
        /// Initial prompt typed into the agent once it is idle.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// List persisted sessions.
    List,
    /// List branches of a repository, primary branch first.
    Branches {
        #[arg(long)]
        project: PathBuf,
    },
    /// Reopen a closed session and stream its events until interrupted.
    Reopen { id: String },
    /// Delete a session: record, worktree and branch.
    Delete { id: String },
    /// Rename a session.
    Rename { id: String, name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AgentArg {
    Claude,
    Codex,
}

impl From<AgentArg> for CodingAgent {
    fn from(value: AgentArg) -> Self {
        match value {
            AgentArg::Claude => CodingAgent::Claude,
            AgentArg::Codex => CodingAgent::Codex,
        }
    }
}
