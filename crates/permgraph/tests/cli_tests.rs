//! Integration tests for the permgraph CLI.
//!
//! These tests run the compiled binary against temporary repositories and
//! check its JSON output, exit codes and persisted state.

use rstest::{fixture, rstest};
use tempfile::TempDir;

mod common;
use common::{create_permission, layer_id, layered, run_json, run_permgraph_in_dir};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Provides a temporary directory with an initialized repository
#[fixture]
fn initialized_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let output = run_permgraph_in_dir(temp.path(), &["init", "--prefix", "test", "--quiet"]);
    assert!(
        output.status.success(),
        "Failed to initialize permgraph: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    temp
}

/// Repository with `users.view`, `users.edit`, `users.delete` and the chain
/// `users.delete -> users.edit -> users.view`.
#[fixture]
fn crud_dir(initialized_dir: TempDir) -> TempDir {
    let dir = initialized_dir.path();
    for name in ["users.view", "users.edit", "users.delete"] {
        create_permission(dir, name);
    }
    run_json(dir, &["dep", "add", "users.edit", "users.view"]);
    run_json(dir, &["dep", "add", "users.delete", "users.edit"]);
    initialized_dir
}

// ============================================================================
// Help and Setup
// ============================================================================

#[rstest]
fn test_cli_help(temp_dir: TempDir) {
    let output = run_permgraph_in_dir(temp_dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    for command in ["init", "info", "perm", "dep"] {
        assert!(stdout.contains(command), "help should list '{command}'");
    }
}

#[rstest]
fn test_cli_no_args(temp_dir: TempDir) {
    let output = run_permgraph_in_dir(temp_dir.path(), &[]);
    assert!(output.status.success());
}

#[rstest]
fn test_commands_require_repository(temp_dir: TempDir) {
    let output = run_permgraph_in_dir(temp_dir.path(), &["perm", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not a permgraph repository"));
}

#[rstest]
fn test_info_reports_counts(crud_dir: TempDir) {
    let info = run_json(crud_dir.path(), &["info"]);
    assert_eq!(info["permission_prefix"], "test");
    assert_eq!(info["permissions"]["total"], 3);
    assert_eq!(info["dependencies"], 2);
    // The revision counter is per process; a freshly loaded store starts at zero.
    assert_eq!(info["revision"], 0);
}

// ============================================================================
// Permission Commands
// ============================================================================

#[rstest]
fn test_perm_create_and_show(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let created = run_json(
        dir,
        &[
            "perm",
            "create",
            "reports.export",
            "--display-name",
            "Export reports",
            "--type",
            "view",
        ],
    );
    assert!(created["id"].as_str().unwrap().starts_with("test-"));
    assert_eq!(created["module"], "reports");
    assert_eq!(created["permission_type"], "view");

    let by_name = run_json(dir, &["perm", "show", "reports.export"]);
    let by_id = run_json(dir, &["perm", "show", created["id"].as_str().unwrap()]);
    assert_eq!(by_name, by_id);
    assert_eq!(by_name["display_name"], "Export reports");
}

#[rstest]
fn test_perm_create_duplicate_name_fails(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    create_permission(dir, "users.view");

    let output = run_permgraph_in_dir(dir, &["perm", "create", "users.view"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already in use"));
}

#[rstest]
fn test_perm_list_filters(crud_dir: TempDir) {
    let dir = crud_dir.path();
    create_permission(dir, "roles.view");

    let all = run_json(dir, &["perm", "list"]);
    assert_eq!(all.as_array().unwrap().len(), 4);

    let users = run_json(dir, &["perm", "list", "--module", "users", "--type", "edit"]);
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], "users.edit");
}

#[rstest]
fn test_perm_update_rename(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let updated = run_json(dir, &["perm", "update", "users.view", "--name", "users.read"]);
    assert_eq!(updated["name"], "users.read");

    let output = run_permgraph_in_dir(dir, &["perm", "show", "users.view"]);
    assert!(!output.status.success());
}

#[rstest]
fn test_perm_update_without_fields_fails(crud_dir: TempDir) {
    let output = run_permgraph_in_dir(crud_dir.path(), &["perm", "update", "users.view"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nothing to update"));
}

#[rstest]
fn test_perm_delete_refused_while_required(crud_dir: TempDir) {
    let output = run_permgraph_in_dir(crud_dir.path(), &["perm", "delete", "users.view", "--force"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("required by 1"));
}

#[rstest]
fn test_perm_delete_removes_outgoing_edges(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let deleted = run_json(dir, &["perm", "delete", "users.delete", "--force"]);
    assert_eq!(deleted["status"], "success");
    assert_eq!(deleted["removed_dependencies"].as_array().unwrap().len(), 1);

    let info = run_json(dir, &["info"]);
    assert_eq!(info["permissions"]["total"], 2);
    assert_eq!(info["dependencies"], 1);
}

// ============================================================================
// Dependency Commands
// ============================================================================

#[rstest]
fn test_dep_add_persists_actor(crud_dir: TempDir) {
    let dir = crud_dir.path();
    create_permission(dir, "users.manage");

    let added = run_json(dir, &["--actor", "alice", "dep", "add", "users.manage", "users.edit"]);
    assert_eq!(added["action"], "add");
    assert_eq!(added["edge"]["created_by"], "alice");

    let data = std::fs::read_to_string(dir.join(".permgraph/graph.jsonl")).unwrap();
    assert!(data.contains(r#""created_by":"alice""#));
    assert!(data.contains(r#""created_by":"tester""#));
}

#[rstest]
fn test_dep_add_cycle_is_refused(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let output = run_permgraph_in_dir(dir, &["dep", "add", "users.view", "users.delete"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("would create a cycle"));
    assert_eq!(run_json(dir, &["info"])["dependencies"], 2);
}

#[rstest]
fn test_dep_add_batch_reports_rejections(crud_dir: TempDir) {
    let dir = crud_dir.path();
    create_permission(dir, "users.manage");

    let outcome = run_json(
        dir,
        &["dep", "add", "users.view", "users.manage", "users.delete"],
    );
    assert_eq!(outcome["added"].as_array().unwrap().len(), 1);
    let rejected = outcome["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["reason"]["kind"], "cycle_would_be_introduced");
}

#[rstest]
fn test_dep_can_add(crud_dir: TempDir) {
    let dir = crud_dir.path();

    let allowed = run_json(dir, &["dep", "can-add", "users.delete", "users.view"]);
    assert_eq!(allowed["allowed"], true);
    assert!(allowed.get("reason").is_none());

    let refused = run_json(dir, &["dep", "can-add", "users.view", "users.delete"]);
    assert_eq!(refused["allowed"], false);
    assert_eq!(refused["reason"]["kind"], "cycle_would_be_introduced");
    assert_eq!(refused["reason"]["cycle_path"].as_array().unwrap().len(), 4);

    // Checking never writes.
    assert_eq!(run_json(dir, &["info"])["dependencies"], 2);
}

#[rstest]
fn test_dep_can_add_text_output(crud_dir: TempDir) {
    let output = run_permgraph_in_dir(
        crud_dir.path(),
        &["dep", "can-add", "users.view", "users.edit"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("x users.view -> users.edit would be rejected"));
}

#[rstest]
fn test_dep_list_directions(crud_dir: TempDir) {
    let dir = crud_dir.path();

    let deps = run_json(dir, &["dep", "list", "users.delete"]);
    let names: Vec<_> = deps
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["permission"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["users.edit", "users.view"]);

    let direct = run_json(dir, &["dep", "list", "users.delete", "--depth", "1"]);
    assert_eq!(direct.as_array().unwrap().len(), 1);

    let dependents = run_json(dir, &["dep", "list", "users.view", "--direction", "dependents"]);
    let first = &dependents.as_array().unwrap()[0];
    assert_eq!(first["permission"]["name"], "users.edit");
    assert_eq!(first["relation"], "dependent");
}

#[rstest]
fn test_dep_tree(crud_dir: TempDir) {
    let tree = run_json(crud_dir.path(), &["dep", "tree", "users.delete"]);
    assert_eq!(tree["name"], "users.delete");
    assert_eq!(tree["children"][0]["name"], "users.edit");
    assert_eq!(tree["children"][0]["children"][0]["name"], "users.view");

    let reverse = run_json(crud_dir.path(), &["dep", "tree", "users.view", "--reverse"]);
    assert_eq!(reverse["children"][0]["name"], "users.edit");
}

#[rstest]
fn test_dep_tree_repeats_shared_dependency(crud_dir: TempDir) {
    let dir = crud_dir.path();
    create_permission(dir, "users.manage");
    run_json(dir, &["dep", "add", "users.manage", "users.edit", "users.delete"]);

    // users.edit is reached directly and through users.delete.
    let tree = run_json(dir, &["dep", "tree", "users.manage"]);
    let children = tree["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    let via_delete = children
        .iter()
        .find(|child| child["name"] == "users.delete")
        .unwrap();
    assert_eq!(via_delete["children"][0]["name"], "users.edit");
    assert_eq!(via_delete["children"][0]["children"][0]["name"], "users.view");
    assert_eq!(tree.to_string().matches(r#""name":"users.view""#).count(), 2);
}

#[rstest]
fn test_dep_tree_on_wide_graph_hits_visit_cap(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let (permissions, edges) = layered(11, 4);

    let mut data = String::new();
    for permission in &permissions {
        let mut record = serde_json::to_value(permission).unwrap();
        record["kind"] = "permission".into();
        data.push_str(&record.to_string());
        data.push('\n');
    }
    for edge in &edges {
        let mut record = serde_json::to_value(edge).unwrap();
        record["kind"] = "edge".into();
        data.push_str(&record.to_string());
        data.push('\n');
    }
    std::fs::write(dir.join(".permgraph/graph.jsonl"), data).unwrap();

    let output = run_permgraph_in_dir(dir, &["dep", "tree", &layer_id(0, 0)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Traversal aborted after visiting 100000 nodes"));

    // The flat listing of the same graph is fine.
    let listed = run_json(dir, &["dep", "list", &layer_id(0, 0)]);
    assert_eq!(listed.as_array().unwrap().len(), 40);
}

#[rstest]
fn test_dep_path(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let found = run_json(dir, &["dep", "path", "users.delete", "users.view"]);
    let names: Vec<_> = found["path"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["permission"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["users.delete", "users.edit", "users.view"]);

    let missing = run_json(dir, &["dep", "path", "users.view", "users.delete"]);
    assert!(missing["path"].is_null());
}

#[rstest]
fn test_dep_remove(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let removed = run_json(dir, &["dep", "remove", "users.edit", "users.view"]);
    assert_eq!(removed["action"], "remove");

    let output = run_permgraph_in_dir(dir, &["dep", "remove", "users.edit", "users.view"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Dependency not found"));
}

#[rstest]
fn test_dep_check_on_clean_graph(crud_dir: TempDir) {
    let report = run_json(crud_dir.path(), &["dep", "check", "--all"]);
    assert_eq!(report["has_cycle"], false);
    assert!(report["cycles"].as_array().unwrap().is_empty());
}

#[rstest]
fn test_dep_check_finds_hand_edited_cycle(crud_dir: TempDir) {
    let dir = crud_dir.path();
    let data_file = dir.join(".permgraph/graph.jsonl");
    let data = std::fs::read_to_string(&data_file).unwrap();

    // Append users.view -> users.delete by hand, bypassing validation.
    let view = run_json(dir, &["perm", "show", "users.view"]);
    let delete = run_json(dir, &["perm", "show", "users.delete"]);
    let line = format!(
        r#"{{"kind":"edge","dependent":"{}","dependency":"{}","created_at":"2024-01-01T00:00:00Z","created_by":"editor"}}"#,
        view["id"].as_str().unwrap(),
        delete["id"].as_str().unwrap()
    );
    std::fs::write(&data_file, format!("{data}{line}\n")).unwrap();

    let report = run_json(dir, &["dep", "check"]);
    assert_eq!(report["has_cycle"], true);
    assert_eq!(report["cycle_path"].as_array().unwrap().len(), 4);
}

#[rstest]
fn test_dep_auto_module_scope(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    for name in ["users.view", "users.create", "users.edit", "users.delete"] {
        create_permission(dir, name);
    }

    let outcome = run_json(dir, &["dep", "auto", "users.view", "--scope", "module"]);
    assert_eq!(outcome["inserted"].as_array().unwrap().len(), 3);
    assert!(outcome["skipped"].as_array().unwrap().is_empty());

    let again = run_json(dir, &["dep", "auto", "users.view", "--scope", "module"]);
    assert!(again["inserted"].as_array().unwrap().is_empty());
    assert_eq!(again["skipped"].as_array().unwrap().len(), 3);
}

#[rstest]
fn test_dep_auto_type_scope(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    for name in ["users.view", "users.edit", "users.delete"] {
        create_permission(dir, name);
    }

    let outcome = run_json(
        dir,
        &["dep", "auto", "users.view", "--scope", "type", "--type", "edit"],
    );
    let inserted = outcome["inserted"].as_array().unwrap();
    assert_eq!(inserted.len(), 1);
}

#[rstest]
fn test_unknown_permission_reference(crud_dir: TempDir) {
    let output = run_permgraph_in_dir(crud_dir.path(), &["dep", "list", "users.nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Permission not found"));
}
