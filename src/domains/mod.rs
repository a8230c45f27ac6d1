pub mod agents;
pub mod git;
pub mod mcp;
pub mod sessions;
pub mod settings;
pub mod terminal;
pub mod worktree;
