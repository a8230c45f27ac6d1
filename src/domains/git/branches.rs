use super::repository::open_repository;
use anyhow::{Result, anyhow};
use git2::BranchType;
use std::collections::HashSet;
use std::path::Path;

/// Lists local branches plus remote branches folded down to their local
/// names, preserving git's iteration order within each group.
pub fn list_branches(repo_path: &Path) -> Result<Vec<String>> {
    let repo = open_repository(repo_path)?;
    let mut seen = HashSet::new();
    let mut branch_names = Vec::new();

    let local_branches = repo.branches(Some(BranchType::Local))?;
    for (branch, _) in local_branches.flatten() {
        if let Some(name) = branch.name()?
            && seen.insert(name.to_string())
        {
            branch_names.push(name.to_string());
        }
    }

    let remote_branches = repo.branches(Some(BranchType::Remote))?;
    for (branch, _) in remote_branches.flatten() {
        if let Some(name) = branch.name()?
            && let Some(branch_name) = name.strip_prefix("origin/")
            && branch_name != "HEAD"
            && seen.insert(branch_name.to_string())
        {
            branch_names.push(branch_name.to_string());
        }
    }

    log::debug!("Found {} branches", branch_names.len());
    Ok(branch_names)
}

/// Moves the repository's primary branch (`main` or `master`) to the front;
/// every other branch keeps its original relative order.
pub fn sort_primary_branches_first(branches: Vec<String>) -> Vec<String> {
    let (mut primary, rest): (Vec<String>, Vec<String>) = branches
        .into_iter()
        .partition(|b| b == "main" || b == "master");
    primary.extend(rest);
    primary
}

pub fn delete_branch(repo_path: &Path, branch_name: &str) -> Result<()> {
    let repo = open_repository(repo_path)?;

    let mut branch = repo
        .find_branch(branch_name, BranchType::Local)
        .map_err(|e| anyhow!("Failed to delete branch {branch_name}: {e}"))?;

    branch
        .delete()
        .map_err(|e| anyhow!("Failed to delete branch {branch_name}: {e}"))?;

    Ok(())
}

pub fn branch_exists(repo_path: &Path, branch_name: &str) -> Result<bool> {
    let repo = open_repository(repo_path)?;

    match repo.find_branch(branch_name, BranchType::Local) {
        Ok(_) => Ok(true),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
        // Treat corrupted branches as non-existent
        Err(e)
            if e.code() == git2::ErrorCode::InvalidSpec
                || e.code() == git2::ErrorCode::GenericError =>
        {
            Ok(false)
        }
        Err(e) => Err(anyhow!("Error checking branch existence: {e}")),
    }
}
