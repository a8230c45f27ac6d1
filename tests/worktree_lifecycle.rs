//! End-to-end provisioning against real repositories: stable directory
//! mapping, idempotent re-provisioning, and best-effort teardown.

use git2::Repository;
use leitwerk::domains::git;
use leitwerk::domains::worktree::{self, PROJECT_MARKER_FILE, ProvisionRequest};
use std::path::Path;
use tempfile::TempDir;

fn init_repo(dir: &Path) -> Repository {
    let repo = Repository::init(dir).unwrap();
    {
        let mut cfg = repo.config().unwrap();
        cfg.set_str("user.name", "Test").unwrap();
        cfg.set_str("user.email", "test@example.com").unwrap();
    }
    {
        let mut index = repo.index().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
    }
    repo
}

fn head_branch(repo: &Repository) -> String {
    repo.head().unwrap().shorthand().unwrap().to_string()
}

const UUID_A: &str = "aaaabbbb-cccc-dddd-eeee-ffff00001111";
const UUID_B: &str = "22223333-4444-5555-6666-777788889999";

#[test]
fn provision_creates_worktree_and_branch() {
    let project = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let repo = init_repo(project.path());
    let base = head_branch(&repo);

    let provisioned = worktree::provision(&ProvisionRequest {
        project_dir: project.path(),
        worktree_root: root.path(),
        parent_branch: &base,
        session_number: 1,
        session_uuid: UUID_A,
        custom_name: None,
    })
    .unwrap();

    assert!(provisioned.worktree_path.is_dir());
    assert!(provisioned.worktree_path.ends_with("session1"));
    assert_eq!(provisioned.branch_name, "leitwerk/session1-aaaabbbb");
    assert!(git::branch_exists(project.path(), &provisioned.branch_name).unwrap());

    // The per-project directory carries the ownership marker.
    let project_root = provisioned.worktree_path.parent().unwrap();
    assert!(project_root.join(PROJECT_MARKER_FILE).is_file());
}

#[test]
fn provision_with_custom_name_uses_it_verbatim() {
    let project = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let repo = init_repo(project.path());
    let base = head_branch(&repo);

    let provisioned = worktree::provision(&ProvisionRequest {
        project_dir: project.path(),
        worktree_root: root.path(),
        parent_branch: &base,
        session_number: 7,
        session_uuid: UUID_A,
        custom_name: Some("fix-login"),
    })
    .unwrap();

    assert!(provisioned.worktree_path.ends_with("fix-login"));
    assert_eq!(provisioned.branch_name, "fix-login");
    assert!(git::branch_exists(project.path(), "fix-login").unwrap());
}

#[test]
fn reprovisioning_replaces_stale_leftovers() {
    let project = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let repo = init_repo(project.path());
    let base = head_branch(&repo);

    let request = ProvisionRequest {
        project_dir: project.path(),
        worktree_root: root.path(),
        parent_branch: &base,
        session_number: 1,
        session_uuid: UUID_A,
        custom_name: None,
    };

    let first = worktree::provision(&request).unwrap();
    // Simulate a crash that left the worktree and branch behind.
    let second = worktree::provision(&request).unwrap();

    assert_eq!(first.worktree_path, second.worktree_path);
    assert_eq!(first.branch_name, second.branch_name);
    assert!(second.worktree_path.is_dir());
}

#[test]
fn same_base_name_projects_do_not_collide() {
    let root = TempDir::new().unwrap();
    let parent_a = TempDir::new().unwrap();
    let parent_b = TempDir::new().unwrap();
    let project_a = parent_a.path().join("webapp");
    let project_b = parent_b.path().join("webapp");
    std::fs::create_dir_all(&project_a).unwrap();
    std::fs::create_dir_all(&project_b).unwrap();
    let base_a = head_branch(&init_repo(&project_a));
    let base_b = head_branch(&init_repo(&project_b));

    let provisioned_a = worktree::provision(&ProvisionRequest {
        project_dir: &project_a,
        worktree_root: root.path(),
        parent_branch: &base_a,
        session_number: 1,
        session_uuid: UUID_A,
        custom_name: None,
    })
    .unwrap();
    let provisioned_b = worktree::provision(&ProvisionRequest {
        project_dir: &project_b,
        worktree_root: root.path(),
        parent_branch: &base_b,
        session_number: 1,
        session_uuid: UUID_B,
        custom_name: None,
    })
    .unwrap();

    assert_ne!(
        provisioned_a.worktree_path.parent(),
        provisioned_b.worktree_path.parent()
    );
    assert!(provisioned_a.worktree_path.is_dir());
    assert!(provisioned_b.worktree_path.is_dir());

    // A "restart" maps each project back to its own directory.
    let resolved_a =
        worktree::resolve_project_worktree_root(root.path(), &project_a).unwrap();
    assert_eq!(Some(resolved_a.as_path()), provisioned_a.worktree_path.parent());
}

#[test]
fn provision_fails_cleanly_for_bad_parent_branch() {
    let project = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    init_repo(project.path());

    let err = worktree::provision(&ProvisionRequest {
        project_dir: project.path(),
        worktree_root: root.path(),
        parent_branch: "no-such-branch",
        session_number: 1,
        session_uuid: UUID_A,
        custom_name: None,
    })
    .unwrap_err();
    assert!(err.to_string().contains("no-such-branch"));
}

#[test]
fn teardown_survives_externally_removed_worktree() {
    let project = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let repo = init_repo(project.path());
    let base = head_branch(&repo);

    let provisioned = worktree::provision(&ProvisionRequest {
        project_dir: project.path(),
        worktree_root: root.path(),
        parent_branch: &base,
        session_number: 2,
        session_uuid: UUID_B,
        custom_name: None,
    })
    .unwrap();

    std::fs::remove_dir_all(&provisioned.worktree_path).unwrap();
    // Must not panic or error; branch removal still goes through.
    worktree::teardown(
        project.path(),
        &provisioned.worktree_path,
        Some(&provisioned.branch_name),
    );
    assert!(!git::branch_exists(project.path(), &provisioned.branch_name).unwrap());
}
