//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use chrono::Utc;
use permgraph::domain::{DependencyEdge, Permission, PermissionType};
use permgraph::engine::{DependencyGraphEngine, EngineLimits, GraphSnapshot};
use std::path::Path;
use std::process::{Command, Output};

/// Run the permgraph binary in the specified directory with plain output.
pub fn run_permgraph_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_permgraph"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env("PERMGRAPH_ASCII", "1")
        .env("USER", "tester")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute permgraph binary")
}

/// Run a command with `--json` and parse its stdout.
pub fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_permgraph_in_dir(dir, &full);
    assert!(
        output.status.success(),
        "permgraph {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Create a permission through the CLI and return its ID.
pub fn create_permission(dir: &Path, name: &str) -> String {
    let json = run_json(dir, &["perm", "create", name]);
    json["id"]
        .as_str()
        .expect("created permission should have an id")
        .to_string()
}

/// A permission with a fixed ID; module and type come from the name.
pub fn permission(id: &str, name: &str) -> Permission {
    let now = Utc::now();
    Permission {
        id: id.into(),
        name: name.to_string(),
        display_name: name.to_string(),
        description: String::new(),
        module: name.split('.').next().unwrap_or_default().to_string(),
        permission_type: PermissionType::infer_from_name(name),
        is_system: false,
        created_at: now,
        updated_at: now,
    }
}

/// An edge stamped with a fixed actor.
pub fn edge(dependent: &str, dependency: &str) -> DependencyEdge {
    DependencyEdge::new(dependent.into(), dependency.into(), "seeder")
}

/// Engine over the given permissions and edges with default limits.
pub fn engine(permissions: Vec<Permission>, edges: &[DependencyEdge]) -> DependencyGraphEngine {
    DependencyGraphEngine::new(
        GraphSnapshot::build(permissions, edges, 0),
        EngineLimits::default(),
    )
}

/// The graph `A -> B -> C` with ids `A`, `B`, `C`.
pub fn abc_chain() -> DependencyGraphEngine {
    engine(
        vec![
            permission("A", "docs.manage"),
            permission("B", "docs.edit"),
            permission("C", "docs.view"),
        ],
        &[edge("A", "B"), edge("B", "C")],
    )
}

/// Id of slot `slot` in layer `layer` of [`layered`].
pub fn layer_id(layer: usize, slot: usize) -> String {
    format!("l{layer:02}w{slot}")
}

/// `layers` layers of `width` permissions, every node linked to every node of
/// the next layer. Small as a graph, exponential as a tree.
pub fn layered(layers: usize, width: usize) -> (Vec<Permission>, Vec<DependencyEdge>) {
    let mut permissions = Vec::new();
    let mut edges = Vec::new();
    for layer in 0..layers {
        for slot in 0..width {
            let id = layer_id(layer, slot);
            permissions.push(permission(&id, &format!("l{layer:02}.w{slot}")));
            if layer + 1 < layers {
                for next in 0..width {
                    edges.push(edge(&id, &layer_id(layer + 1, next)));
                }
            }
        }
    }
    (permissions, edges)
}
