pub mod branches;
pub mod repository;
pub mod worktrees;

pub use branches::{branch_exists, delete_branch, list_branches, sort_primary_branches_first};
pub use repository::{get_commit_hash, repository_has_commits};
pub use worktrees::{create_worktree_from_base, prune_worktrees, remove_worktree};
