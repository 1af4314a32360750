//! Configured attachments persisted through the file store.

use pretty_assertions::assert_eq;
use recent_rs::core::RecordStore;
use recent_rs::{
    Document, DocumentCollection, FieldType, FileRecordStore, RecentConfig, RecordKey, RecordSchema,
};
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;

const CONFIG: &str = r#"{
    defaults: { capacity: 2 },
    attachments: {
        view: {},
        play: { timestamp_field: "time", allow_duplicates: true, capacity: 3 },
    },
}"#;

fn configured(config: &RecentConfig) -> DocumentCollection {
    let mut songs = DocumentCollection::new("songs", RecordSchema::new());
    for (key, options) in config.effective_options() {
        songs
            .attach(&options, FieldType::String)
            .unwrap_or_else(|err| panic!("attach {key}: {err}"));
    }
    songs
}

fn list(doc: &Document, field: &str, entry_field: &str) -> Vec<Value> {
    doc.get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| item[entry_field].clone()).collect())
        .unwrap_or_default()
}

#[test]
fn configured_attachments_persist_to_files() {
    let temp = tempdir().expect("tempdir");
    let config_path = temp.path().join("recent.json5");
    fs::write(&config_path, CONFIG).expect("config");
    let config = RecentConfig::load_from_path(&config_path).expect("load");
    let songs = configured(&config);
    assert!(songs.has_operation("addRecentView"));
    assert!(songs.has_operation("addRecentPlay"));

    let store = FileRecordStore::<Document>::new(temp.path().join("records")).expect("store");
    let mut doc = songs.new_document_with_key("user-1");
    for play in ["a", "b", "a", "c"] {
        doc = songs
            .call(&store, doc, "addRecentPlay", json!(play))
            .expect("play");
    }
    for view in ["x", "y", "z"] {
        doc = songs
            .call(&store, doc, "addRecentView", json!(view))
            .expect("view");
    }

    let reopened = FileRecordStore::<Document>::new(temp.path().join("records")).expect("reopen");
    let stored = RecordStore::find_by_key(&reopened, &RecordKey::new("user-1"))
        .expect("find")
        .expect("stored");
    assert_eq!(stored, doc);
    assert_eq!(
        list(&stored, "recentPlays", "play"),
        vec![json!("c"), json!("a"), json!("b")]
    );
    assert_eq!(
        list(&stored, "recentViews", "view"),
        vec![json!("z"), json!("y")]
    );
    assert!(stored.get("recentPlays").expect("plays")[0]["time"].is_string());
}

#[tokio::test]
async fn async_calls_against_file_store() {
    let temp = tempdir().expect("tempdir");
    let config = RecentConfig::load_from_str(CONFIG).expect("config");
    let songs = configured(&config);
    let store = FileRecordStore::<Document>::new(temp.path()).expect("store");
    let key = RecordKey::new("user-2");
    RecordStore::save(&store, songs.new_document_with_key(key.clone()), None).expect("seed");

    for view in ["x", "y", "x"] {
        songs
            .call_by_key_async(&store, &key, "addRecentView", json!(view))
            .await
            .expect("view");
    }
    let stored = RecordStore::find_by_key(&store, &key)
        .expect("find")
        .expect("stored");
    assert_eq!(
        list(&stored, "recentViews", "view"),
        vec![json!("x"), json!("y")]
    );
    assert_eq!(stored.revision, 4);
}
