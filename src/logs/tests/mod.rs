//! Unit tests for the execution log store.

use super::{ExecutionLogStore, LogLevel, LogSink, TaskLog};
use crate::job::domain::{ExecutionId, JobId, StageId, TaskIndex, TaskKey};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

fn key(index: u32) -> TaskKey {
    TaskKey::new(
        JobId::from_uuid(uuid::Uuid::nil()),
        StageId::new("s1").expect("valid stage id"),
        TaskIndex::new(index),
    )
}

#[fixture]
fn store() -> ExecutionLogStore {
    ExecutionLogStore::new(1000, Arc::new(DefaultClock))
}

#[rstest]
fn full_buffer_keeps_last_entries_in_order(store: ExecutionLogStore) {
    let task = key(0);
    for n in 0..1500 {
        store.append(&task, LogLevel::Info, None, format!("line {n}"));
    }
    let logs = store.logs(&task);
    assert_eq!(logs.len(), 1000);
    assert_eq!(logs.first().map(|e| e.message.as_str()), Some("line 500"));
    assert_eq!(logs.last().map(|e| e.message.as_str()), Some("line 1499"));
    assert!(logs.windows(2).all(|pair| match pair {
        [a, b] => a.sequence + 1 == b.sequence,
        _ => false,
    }));
}

#[rstest]
fn logs_for_unknown_key_are_empty(store: ExecutionLogStore) {
    assert!(store.logs(&key(7)).is_empty());
}

#[rstest]
fn logs_since_returns_only_newer_entries(store: ExecutionLogStore) {
    let task = key(0);
    for n in 0..5 {
        store.append(&task, LogLevel::Debug, None, format!("{n}"));
    }
    let newer: Vec<u64> = store.logs_since(&task, 3).iter().map(|e| e.sequence).collect();
    assert_eq!(newer, vec![4, 5]);
}

#[rstest]
fn keys_are_isolated(store: ExecutionLogStore) {
    store.append(&key(0), LogLevel::Info, None, "a");
    store.append(&key(1), LogLevel::Warn, None, "b");
    assert_eq!(store.logs(&key(0)).len(), 1);
    assert_eq!(
        store.logs(&key(1)).first().map(|e| e.level),
        Some(LogLevel::Warn)
    );
}

#[rstest]
fn snapshot_is_unaffected_by_later_appends(store: ExecutionLogStore) {
    let task = key(0);
    store.append(&task, LogLevel::Info, None, "first");
    let snapshot = store.logs(&task);
    store.append(&task, LogLevel::Info, None, "second");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(store.logs(&task).len(), 2);
}

#[rstest]
fn task_log_tags_entries_with_execution(store: ExecutionLogStore) {
    let shared = Arc::new(store);
    let execution_id = ExecutionId::new();
    let sink = TaskLog::new(Arc::clone(&shared), key(0), Some(execution_id));
    sink.log(LogLevel::Error, "boom");
    let entry = shared.logs(&key(0)).into_iter().next();
    assert_eq!(entry.and_then(|e| e.execution_id), Some(execution_id));
}

#[rstest]
fn forget_job_drops_its_buffers(store: ExecutionLogStore) {
    store.append(&key(0), LogLevel::Info, None, "x");
    store.forget_job(JobId::from_uuid(uuid::Uuid::nil()));
    assert!(store.logs(&key(0)).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_appenders_never_lose_entries() {
    let shared = Arc::new(ExecutionLogStore::new(10_000, Arc::new(DefaultClock)));
    let mut handles = Vec::new();
    for worker in 0..8_u32 {
        let store = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            for n in 0..100 {
                store.append(&key(worker % 2), LogLevel::Info, None, format!("{worker}:{n}"));
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.is_ok());
    }
    assert_eq!(shared.logs(&key(0)).len() + shared.logs(&key(1)).len(), 800);
}
