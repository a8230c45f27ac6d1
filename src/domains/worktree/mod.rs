//! Provisioning of isolated worktrees for sessions: stable per-project
//! directories under a shared worktree root, unique branch names, and
//! best-effort teardown.

use crate::domains::git;
use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Records which project owns a per-project worktree directory, so two
/// repositories that share a base directory name do not collide.
pub const PROJECT_MARKER_FILE: &str = ".leitwerk-project";

/// Branch namespace for generated session branches.
pub const BRANCH_NAMESPACE: &str = "leitwerk";

const SHORT_HASH_LEN: usize = 8;
const SHORT_UUID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedWorktree {
    pub worktree_path: PathBuf,
    pub branch_name: String,
}

pub struct ProvisionRequest<'a> {
    pub project_dir: &'a Path,
    pub worktree_root: &'a Path,
    pub parent_branch: &'a str,
    pub session_number: u32,
    pub session_uuid: &'a str,
    /// Pre-validated by the caller as non-colliding; used verbatim for both
    /// the worktree subdirectory and the branch name.
    pub custom_name: Option<&'a str>,
}

fn short_project_hash(project_dir: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_dir.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..SHORT_HASH_LEN].to_string()
}

fn project_base_name(project_dir: &Path) -> Result<String> {
    project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Cannot derive a name from {}", project_dir.display()))
}

fn claim_dir(dir: &Path, project_tag: &str) -> Result<bool> {
    let marker = dir.join(PROJECT_MARKER_FILE);
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create worktree root {}", dir.display()))?;
        std::fs::write(&marker, project_tag)
            .with_context(|| format!("Failed to write {}", marker.display()))?;
        return Ok(true);
    }

    match std::fs::read_to_string(&marker) {
        Ok(existing) => Ok(existing.trim() == project_tag),
        Err(_) => {
            // Directory exists but carries no marker: adopt it.
            std::fs::write(&marker, project_tag)
                .with_context(|| format!("Failed to write {}", marker.display()))?;
            Ok(true)
        }
    }
}

/// Maps a project directory to its directory under the shared worktree root.
/// The mapping is stable across restarts: the same project always resolves to
/// the same directory, and a base-name collision with a different project is
/// disambiguated with a short hash of the project path.
pub fn resolve_project_worktree_root(
    worktree_root: &Path,
    project_dir: &Path,
) -> Result<PathBuf> {
    let base = project_base_name(project_dir)?;
    let project_tag = project_dir.to_string_lossy().to_string();

    let plain = worktree_root.join(&base);
    if claim_dir(&plain, &project_tag)? {
        return Ok(plain);
    }

    let hashed = worktree_root.join(format!("{base}-{}", short_project_hash(project_dir)));
    if claim_dir(&hashed, &project_tag)? {
        return Ok(hashed);
    }

    Err(anyhow!(
        "Worktree directory {} is claimed by another project",
        hashed.display()
    ))
}

pub fn default_worktree_name(session_number: u32) -> String {
    format!("session{session_number}")
}

/// `<namespace>/session<N>-<shortUuid>`: unique even when a deleted session's
/// number is later reused, because the uuid fragment differs.
pub fn default_branch_name(session_number: u32, session_uuid: &str) -> String {
    let short = &session_uuid[..SHORT_UUID_LEN.min(session_uuid.len())];
    format!("{BRANCH_NAMESPACE}/session{session_number}-{short}")
}

/// Creates the session worktree and branch. Stale leftovers at the target
/// path or branch name are removed first (best-effort — "doesn't exist" is
/// the expected case). Only the final worktree-add failure propagates.
pub fn provision(req: &ProvisionRequest) -> Result<ProvisionedWorktree> {
    let project_root = resolve_project_worktree_root(req.worktree_root, req.project_dir)?;

    let (worktree_name, branch_name) = match req.custom_name {
        Some(name) => (name.to_string(), name.to_string()),
        None => (
            default_worktree_name(req.session_number),
            default_branch_name(req.session_number, req.session_uuid),
        ),
    };
    let worktree_path = project_root.join(&worktree_name);

    if worktree_path.exists() {
        log::info!(
            "Removing stale worktree before provisioning: {}",
            worktree_path.display()
        );
        if let Err(e) = git::remove_worktree(req.project_dir, &worktree_path) {
            log::warn!("Stale worktree removal failed: {e}");
        }
    }
    let _ = git::prune_worktrees(req.project_dir);

    match git::branch_exists(req.project_dir, &branch_name) {
        Ok(true) => {
            log::info!("Removing stale branch before provisioning: {branch_name}");
            if let Err(e) = git::delete_branch(req.project_dir, &branch_name) {
                log::warn!("Stale branch removal failed: {e}");
            }
        }
        Ok(false) => {}
        Err(e) => log::warn!("Could not check for stale branch '{branch_name}': {e}"),
    }

    git::create_worktree_from_base(
        req.project_dir,
        &branch_name,
        &worktree_path,
        req.parent_branch,
    )?;

    Ok(ProvisionedWorktree {
        worktree_path,
        branch_name,
    })
}

/// Best-effort removal of a session's worktree and branch. Deleting a session
/// record must always succeed even when repository cleanup partially fails,
/// so nothing here returns an error.
pub fn teardown(project_dir: &Path, worktree_path: &Path, branch_name: Option<&str>) {
    if let Err(e) = git::remove_worktree(project_dir, worktree_path) {
        log::warn!(
            "Failed to remove worktree {}: {e}",
            worktree_path.display()
        );
    }
    if let Some(branch) = branch_name
        && let Err(e) = git::delete_branch(project_dir, branch)
    {
        log::warn!("Failed to delete branch {branch}: {e}");
    }
}
