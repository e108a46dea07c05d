//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version matches the version cargo resolved for this crate.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("crate lives two levels below the workspace root")
        .to_path_buf()
}

fn manifest(dir: &Path) -> toml::Value {
    let text = std::fs::read_to_string(dir.join("Cargo.toml")).unwrap();
    text.parse().unwrap()
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    let members: Vec<String> = manifest(&root)["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap().to_string())
        .collect();
    assert_eq!(members.len(), 5);

    for member in &members {
        let doc = manifest(&root.join(member));
        let inherits = doc["package"]["version"]
            .as_table()
            .and_then(|t| t.get("workspace"))
            .and_then(toml::Value::as_bool);
        assert_eq!(
            inherits,
            Some(true),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn internal_dependencies_pin_workspace_version() {
    let doc = manifest(&workspace_root());
    let version = doc["workspace"]["package"]["version"].as_str().unwrap();
    for name in ["changegate-core", "change-state", "change-api", "reasoning-client"] {
        let pinned = doc["workspace"]["dependencies"][name]["version"].as_str();
        assert_eq!(pinned, Some(version), "{name} pins a stale version");
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = manifest(&workspace_root());
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
}
