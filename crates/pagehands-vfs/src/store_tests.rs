use super::*;
use crate::kv::MemoryKvStore;

fn store() -> DomainStore {
    DomainStore::new(Arc::new(MemoryKvStore::new()))
}

#[tokio::test]
async fn initial_write_requires_expected_zero() {
    let store = store();
    let v = store
        .write_file(
            "shop.test",
            "/products",
            ArtifactKind::Script,
            "a.js",
            "console.log(1)".to_string(),
            0,
        )
        .await
        .unwrap();
    assert_eq!(v, 1);

    let err = store
        .write_file(
            "shop.test",
            "/other",
            ArtifactKind::Script,
            "b.js",
            String::new(),
            3,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        VfsError::VersionMismatch {
            expected: 3,
            actual: 0
        }
    );
}

#[tokio::test]
async fn versions_increment_by_one() {
    let store = store();
    let v1 = store
        .write_file("x.test", "/", ArtifactKind::Style, "dark.css", "a{}".into(), 0)
        .await
        .unwrap();
    let v2 = store
        .write_file("x.test", "/", ArtifactKind::Style, "dark.css", "b{}".into(), v1)
        .await
        .unwrap();
    assert_eq!(v2, v1 + 1);

    // A failed write leaves the version unchanged.
    let err = store
        .write_file("x.test", "/", ArtifactKind::Style, "dark.css", "c{}".into(), v1)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        VfsError::VersionMismatch {
            expected: v1,
            actual: v2
        }
    );
    let (_, file) = store
        .get_file("x.test", "/", ArtifactKind::Style, "dark.css")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.version, v2);
    assert_eq!(file.content, "b{}");
}

#[tokio::test]
async fn expected_zero_fails_when_file_exists() {
    let store = store();
    store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    let err = store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "2".into(), 0)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        VfsError::VersionMismatch {
            expected: 0,
            actual: 1
        }
    );
}

#[tokio::test]
async fn route_resolution_finds_pattern_stored_file() {
    let store = store();
    store
        .write_file(
            "shop.test",
            "/products/[id]",
            ArtifactKind::Script,
            "a.js",
            "// dynamic".into(),
            0,
        )
        .await
        .unwrap();

    let (key, file) = store
        .get_file("shop.test", "/products/42", ArtifactKind::Script, "a.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(key, "/products/[id]");
    assert_eq!(file.content, "// dynamic");
}

#[tokio::test]
async fn exact_key_wins_over_pattern() {
    let store = store();
    store
        .write_file(
            "shop.test",
            "/products/[id]",
            ArtifactKind::Script,
            "a.js",
            "pattern".into(),
            0,
        )
        .await
        .unwrap();
    store
        .write_file(
            "shop.test",
            "/products/42",
            ArtifactKind::Script,
            "a.js",
            "exact".into(),
            0,
        )
        .await
        .unwrap();

    let (key, file) = store
        .get_file("shop.test", "/products/42", ArtifactKind::Script, "a.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(key, "/products/42");
    assert_eq!(file.content, "exact");
}

#[tokio::test]
async fn write_through_concrete_path_updates_pattern_file() {
    let store = store();
    store
        .write_file(
            "shop.test",
            "/products/[id]",
            ArtifactKind::Script,
            "a.js",
            "v1".into(),
            0,
        )
        .await
        .unwrap();

    // Editing via the concrete urlPath must hit the pattern-stored file,
    // not create a sibling.
    let v = store
        .write_file(
            "shop.test",
            "/products/42",
            ArtifactKind::Script,
            "a.js",
            "v2".into(),
            1,
        )
        .await
        .unwrap();
    assert_eq!(v, 2);

    let state = store.load("shop.test").await.unwrap();
    assert_eq!(state.paths.len(), 1);
    assert!(state.paths.contains_key("/products/[id]"));
}

#[tokio::test]
async fn trailing_slash_paths_are_equivalent() {
    let store = store();
    store
        .write_file("x.test", "/products/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    let found = store
        .get_file("x.test", "/products", ArtifactKind::Script, "a.js")
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn delete_prunes_path_then_domain() {
    let store = store();
    store
        .write_file("x.test", "/a", ArtifactKind::Script, "one.js", "1".into(), 0)
        .await
        .unwrap();
    store
        .write_file("x.test", "/b", ArtifactKind::Script, "two.js", "2".into(), 0)
        .await
        .unwrap();

    assert!(store
        .delete_file("x.test", "/a", ArtifactKind::Script, "one.js")
        .await
        .unwrap());
    let state = store.load("x.test").await.unwrap();
    assert!(!state.paths.contains_key("/a"));
    assert!(state.paths.contains_key("/b"));

    assert!(store
        .delete_file("x.test", "/b", ArtifactKind::Script, "two.js")
        .await
        .unwrap());
    // Last file gone: the vfs:x.test key itself is removed.
    assert!(store.kv().get("vfs:x.test").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_missing_returns_false() {
    let store = store();
    assert!(!store
        .delete_file("x.test", "/", ArtifactKind::Script, "ghost.js")
        .await
        .unwrap());
}

#[tokio::test]
async fn absent_enabled_flag_means_enabled() {
    let store = store();
    store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    let (_, file) = store
        .get_file("x.test", "/", ArtifactKind::Script, "a.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.enabled, None);
    assert!(file.is_enabled());

    let now_enabled = store
        .toggle_enabled("x.test", "/", ArtifactKind::Script, "a.js")
        .await
        .unwrap();
    assert!(!now_enabled);
    let scripts = store.enabled_scripts().await.unwrap();
    assert!(scripts.is_empty());
}

#[tokio::test]
async fn set_all_enabled_covers_every_domain() {
    let store = store();
    store
        .write_file("a.test", "/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    store
        .write_file("b.test", "/", ArtifactKind::Script, "b.js", "1".into(), 0)
        .await
        .unwrap();

    store.set_all_enabled(false).await.unwrap();
    assert!(store.enabled_scripts().await.unwrap().is_empty());

    store.set_all_enabled(true).await.unwrap();
    assert_eq!(store.enabled_scripts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn edit_records_regenerate_auto_edits_script() {
    let store = store();
    store
        .append_edit_record(
            "x.test",
            "/",
            EditRecord {
                selector: "#banner".to_string(),
                old_content: "Hello".to_string(),
                new_content: "Goodbye".to_string(),
                timestamp: 1,
            },
        )
        .await
        .unwrap();

    let (_, file) = store
        .get_file("x.test", "/", ArtifactKind::Script, AUTO_EDITS_SCRIPT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.version, 1);
    assert!(file.content.contains("#banner"));
    assert!(file.content.contains("Goodbye"));

    store
        .append_edit_record(
            "x.test",
            "/",
            EditRecord {
                selector: ".sidebar".to_string(),
                old_content: "a".to_string(),
                new_content: "b".to_string(),
                timestamp: 2,
            },
        )
        .await
        .unwrap();
    let (_, file) = store
        .get_file("x.test", "/", ArtifactKind::Script, AUTO_EDITS_SCRIPT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.version, 2);
    assert!(file.content.contains("#banner"));
    assert!(file.content.contains(".sidebar"));
}

#[tokio::test]
async fn matching_files_orders_exact_before_patterns() {
    let store = store();
    store
        .write_file("x.test", "/p/1", ArtifactKind::Style, "exact.css", "e".into(), 0)
        .await
        .unwrap();
    store
        .write_file("x.test", "/p/[id]", ArtifactKind::Style, "dyn.css", "d".into(), 0)
        .await
        .unwrap();

    let state = store.load("x.test").await.unwrap();
    let location = PageLocation::new("x.test", "/p/1");
    let files = DomainStore::matching_files(&state, &location, ArtifactKind::Style);
    let names: Vec<&str> = files.iter().map(|(_, n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["exact.css", "dyn.css"]);
}

#[tokio::test]
async fn export_import_roundtrip_prefers_newer_versions() {
    let source = store();
    source
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "new".into(), 0)
        .await
        .unwrap();
    source
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "newer".into(), 1)
        .await
        .unwrap();
    let bundle = source.export_bundle().await.unwrap();
    assert_eq!(bundle["version"], 1);

    let dest = store();
    dest.write_file("x.test", "/", ArtifactKind::Script, "a.js", "old".into(), 0)
        .await
        .unwrap();
    let imported = dest.import_bundle(&bundle).await.unwrap();
    assert_eq!(imported, 1);

    let (_, file) = dest
        .get_file("x.test", "/", ArtifactKind::Script, "a.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.content, "newer");
    assert_eq!(file.version, 2);
}

#[tokio::test]
async fn import_rejects_unknown_bundle_version() {
    let dest = store();
    let bundle = serde_json::json!({"version": 2, "domains": {}});
    assert!(dest.import_bundle(&bundle).await.is_err());
}

#[tokio::test]
async fn import_keeps_existing_newer_file() {
    let dest = store();
    dest.write_file("x.test", "/", ArtifactKind::Script, "a.js", "v1".into(), 0)
        .await
        .unwrap();
    dest.write_file("x.test", "/", ArtifactKind::Script, "a.js", "v2".into(), 1)
        .await
        .unwrap();

    let bundle = serde_json::json!({
        "version": 1,
        "exportedAt": 0,
        "domains": {
            "x.test": {
                "paths": {
                    "/": {
                        "scripts": {
                            "a.js": {"content": "stale", "version": 1, "created": 0, "modified": 0}
                        }
                    }
                }
            }
        }
    });
    let imported = dest.import_bundle(&bundle).await.unwrap();
    assert_eq!(imported, 0);
    let (_, file) = dest
        .get_file("x.test", "/", ArtifactKind::Script, "a.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.content, "v2");
}

#[tokio::test]
async fn persisted_shape_matches_store_layout() {
    let store = store();
    store
        .write_file("x.test", "/", ArtifactKind::Script, "a.js", "1".into(), 0)
        .await
        .unwrap();
    store
        .append_edit_record(
            "x.test",
            "/",
            EditRecord {
                selector: "#x".into(),
                old_content: "o".into(),
                new_content: "n".into(),
                timestamp: 5,
            },
        )
        .await
        .unwrap();

    let raw = store.kv().get("vfs:x.test").await.unwrap().unwrap();
    assert!(raw["paths"]["/"]["scripts"]["a.js"]["version"].is_u64());
    assert_eq!(raw["paths"]["/"]["editRecords"][0]["oldContent"], "o");
    assert_eq!(raw["paths"]["/"]["editRecords"][0]["newContent"], "n");
}
