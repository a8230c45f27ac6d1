use anyhow::{Result, anyhow};
use git2::Repository;
use std::path::Path;

pub fn open_repository(repo_path: &Path) -> Result<Repository> {
    Repository::open(repo_path)
        .map_err(|e| anyhow!("Failed to open repository at {}: {e}", repo_path.display()))
}

pub fn repository_has_commits(repo_path: &Path) -> Result<bool> {
    let repo = open_repository(repo_path)?;
    match repo.head() {
        Ok(head) => Ok(head.peel_to_commit().is_ok()),
        Err(_) => Ok(false),
    }
}

/// Resolves a branch name (or any revspec) to its commit hash.
pub fn get_commit_hash(repo_path: &Path, reference: &str) -> Result<String> {
    let repo = open_repository(repo_path)?;
    let object = repo
        .revparse_single(reference)
        .map_err(|e| anyhow!("Cannot resolve '{reference}': {e}"))?;
    let commit = object
        .peel_to_commit()
        .map_err(|e| anyhow!("'{reference}' does not point to a commit: {e}"))?;
    Ok(commit.id().to_string())
}

pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("Branch name cannot be empty"));
    }
    if name.contains("..") || name.contains('\0') || name.contains('\\') {
        return Err(anyhow!("Invalid branch name"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.');
    if !name.chars().all(allowed) {
        return Err(anyhow!("Branch name contains invalid characters"));
    }
    Ok(())
}
