use super::repository::{get_commit_hash, open_repository, validate_branch_name};
use anyhow::{Result, anyhow};
use git2::{BranchType, WorktreeAddOptions, WorktreePruneOptions};
use std::path::Path;

/// Creates a worktree at `worktree_path` on a new branch starting from
/// `base_branch`. A leftover local branch of the same name is replaced.
/// Failure here aborts session creation, so errors carry enough context to be
/// shown to the user.
pub fn create_worktree_from_base(
    repo_path: &Path,
    branch_name: &str,
    worktree_path: &Path,
    base_branch: &str,
) -> Result<()> {
    validate_branch_name(branch_name)?;

    let base_commit_hash = get_commit_hash(repo_path, base_branch).map_err(|e| {
        anyhow!("Base branch '{base_branch}' does not exist in the repository: {e}")
    })?;

    log::info!("Creating worktree from commit {base_commit_hash} ({base_branch})");

    if let Some(parent) = worktree_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let repo = open_repository(repo_path)?;

    // Check if branch already exists and delete it
    if let Ok(mut branch) = repo.find_branch(branch_name, BranchType::Local) {
        log::info!("Deleting existing branch: {branch_name}");
        branch.delete()?;
    }

    let base_oid = git2::Oid::from_str(&base_commit_hash)?;
    let base_commit = repo.find_commit(base_oid)?;

    // Create the new branch pointing to the base commit
    let new_branch = repo.branch(branch_name, &base_commit, false)?;
    let branch_ref = new_branch.into_reference();

    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&branch_ref));

    repo.worktree(
        worktree_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(branch_name),
        worktree_path,
        Some(&opts),
    )?;

    log::info!(
        "Successfully created worktree at: {}",
        worktree_path.display()
    );
    Ok(())
}

pub fn remove_worktree(repo_path: &Path, worktree_path: &Path) -> Result<()> {
    let repo = open_repository(repo_path)?;

    // Find the worktree by path (canonicalized, symlinked temp dirs included)
    let canonical_target_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    let worktrees = repo.worktrees()?;
    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());
            if canonical_wt_path == canonical_target_path || wt_path == worktree_path {
                // Remove the directory first; pruning needs it gone
                if worktree_path.exists()
                    && let Err(e) = std::fs::remove_dir_all(worktree_path)
                {
                    return Err(anyhow!("Failed to remove worktree directory: {e}"));
                }

                if let Err(e) = wt.prune(Some(&mut WorktreePruneOptions::new())) {
                    log::warn!("Failed to prune worktree from git registry: {e}");
                }
                return Ok(());
            }
        }
    }

    // Not a registered worktree; remove a plain leftover directory if present
    if worktree_path.exists() {
        std::fs::remove_dir_all(worktree_path)?;
        Ok(())
    } else {
        Err(anyhow!("Worktree not found: {worktree_path:?}"))
    }
}

/// Drops registry entries whose directories have disappeared.
pub fn prune_worktrees(repo_path: &Path) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let worktrees = repo.worktrees()?;

    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name)
            && wt.validate().is_err()
        {
            wt.prune(Some(&mut WorktreePruneOptions::new()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
pub fn is_worktree_registered(repo_path: &Path, worktree_path: &Path) -> Result<bool> {
    let repo = open_repository(repo_path)?;
    let worktrees = repo.worktrees()?;

    let canonical_worktree_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());

            if canonical_wt_path == canonical_worktree_path {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
