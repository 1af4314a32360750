//! Concurrent callers against one parent record.

use pretty_assertions::assert_eq;
use recent_rs::core::RecordStore;
use recent_rs::{
    ConcurrencyGuard, Document, DocumentCollection, FieldType, MemoryRecordStore, RecentError,
    RecentOptions, RecordKey, RecordSchema,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 4;
const CALLS_PER_WRITER: usize = 8;

fn shared(
    guard: ConcurrencyGuard,
) -> (Arc<DocumentCollection>, Arc<MemoryRecordStore<Document>>) {
    let mut views = DocumentCollection::new("pages", RecordSchema::new());
    views
        .attach(
            &RecentOptions::new()
                .capacity(1000)
                .allow_duplicates(true)
                .concurrency(guard),
            FieldType::String,
        )
        .expect("attach");
    let store = MemoryRecordStore::new();
    RecordStore::save(&store, views.new_document_with_key("page"), None).expect("seed");
    (Arc::new(views), Arc::new(store))
}

fn stored_views(store: &MemoryRecordStore<Document>) -> Vec<Value> {
    let doc = RecordStore::find_by_key(store, &RecordKey::new("page"))
        .expect("find")
        .expect("stored");
    doc.get("recentViews")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn run_threads(
    views: &Arc<DocumentCollection>,
    store: &Arc<MemoryRecordStore<Document>>,
) -> Vec<Result<Document, RecentError>> {
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let views = views.clone();
            let store = store.clone();
            thread::spawn(move || {
                let key = RecordKey::new("page");
                (0..CALLS_PER_WRITER)
                    .map(|call| {
                        views.call_by_key(
                            store.as_ref(),
                            &key,
                            "addRecentView",
                            json!(format!("w{writer}-{call}")),
                        )
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("writer thread"))
        .collect()
}

#[test]
fn serialized_guard_applies_every_call() {
    let (views, store) = shared(ConcurrencyGuard::Serialized);
    let results = run_threads(&views, &store);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(stored_views(&store).len(), WRITERS * CALLS_PER_WRITER);
}

#[test]
fn optimistic_guard_never_loses_successful_updates() {
    let (views, store) = shared(ConcurrencyGuard::Optimistic { max_retries: 32 });
    let results = run_threads(&views, &store);
    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, RecentError::Conflict { .. }), "{err}");
        }
    }
    assert_eq!(stored_views(&store).len(), succeeded);
}

#[test]
fn stored_list_stays_sorted_under_contention() {
    let (views, store) = shared(ConcurrencyGuard::Serialized);
    run_threads(&views, &store);
    let stamps: Vec<String> = stored_views(&store)
        .iter()
        .map(|entry| entry["date"].as_str().expect("date").to_string())
        .collect();
    let parsed: Vec<_> = stamps
        .iter()
        .map(|stamp| chrono::DateTime::parse_from_rfc3339(stamp).expect("rfc3339"))
        .collect();
    assert!(parsed.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_guard_across_tasks() {
    let (views, store) = shared(ConcurrencyGuard::Serialized);
    let mut tasks = Vec::new();
    for writer in 0..WRITERS {
        let views = views.clone();
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let key = RecordKey::new("page");
            for call in 0..CALLS_PER_WRITER {
                views
                    .call_by_key_async(
                        store.as_ref(),
                        &key,
                        "addRecentView",
                        json!(format!("t{writer}-{call}")),
                    )
                    .await
                    .expect("serialized call");
            }
        }));
    }
    for task in tasks {
        task.await.expect("task");
    }
    assert_eq!(stored_views(&store).len(), WRITERS * CALLS_PER_WRITER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn optimistic_guard_across_tasks() {
    let (views, store) = shared(ConcurrencyGuard::Optimistic { max_retries: 32 });
    let mut tasks = Vec::new();
    for writer in 0..WRITERS {
        let views = views.clone();
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let key = RecordKey::new("page");
            let mut succeeded = 0_usize;
            for call in 0..CALLS_PER_WRITER {
                let result = views
                    .call_by_key_async(
                        store.as_ref(),
                        &key,
                        "addRecentView",
                        json!(format!("t{writer}-{call}")),
                    )
                    .await;
                match result {
                    Ok(_) => succeeded += 1,
                    Err(RecentError::Conflict { .. }) => {}
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            succeeded
        }));
    }
    let mut succeeded = 0;
    for task in tasks {
        succeeded += task.await.expect("task");
    }
    assert_eq!(stored_views(&store).len(), succeeded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_guard_across_threads_and_tasks() {
    for _round in 0..10 {
        let (views, store) = shared(ConcurrencyGuard::Serialized);
        let threads: Vec<_> = (0..WRITERS / 2)
            .map(|writer| {
                let views = views.clone();
                let store = store.clone();
                thread::spawn(move || {
                    let key = RecordKey::new("page");
                    (0..CALLS_PER_WRITER)
                        .map(|call| {
                            views.call_by_key(
                                store.as_ref(),
                                &key,
                                "addRecentView",
                                json!(format!("w{writer}-{call}")),
                            )
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let tasks: Vec<_> = (0..WRITERS / 2)
            .map(|writer| {
                let views = views.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    let key = RecordKey::new("page");
                    for call in 0..CALLS_PER_WRITER {
                        views
                            .call_by_key_async(
                                store.as_ref(),
                                &key,
                                "addRecentView",
                                json!(format!("t{writer}-{call}")),
                            )
                            .await
                            .expect("serialized async call");
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("task");
        }
        for handle in threads {
            for result in handle.join().expect("writer thread") {
                result.expect("serialized blocking call");
            }
        }
        assert_eq!(stored_views(&store).len(), WRITERS * CALLS_PER_WRITER);
    }
}

#[tokio::test]
async fn serialized_blocking_call_inside_runtime_is_refused() {
    let (views, store) = shared(ConcurrencyGuard::Serialized);
    let err = views
        .call_by_key(
            store.as_ref(),
            &RecordKey::new("page"),
            "addRecentView",
            json!("home"),
        )
        .expect_err("inside runtime");
    assert!(matches!(err, RecentError::BlockingInRuntime(_)));
    assert!(stored_views(&store).is_empty());
}
