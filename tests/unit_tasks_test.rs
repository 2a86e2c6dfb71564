use bytes::Bytes;
use citrinedb::core::storage::{
    DocumentStore, ExecutionContext, ExecutionScenario, MemoryDocumentStore,
};
use citrinedb::core::tasks::{
    DeleteDocumentTask, InsertDocumentTask, ReadDocumentTask, ReplicationTask, ResultStrategy,
};
use std::sync::Arc;
use std::time::Duration;

fn context() -> (ExecutionContext, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new("db"));
    (ExecutionContext::distributed(store.clone()), store)
}

#[tokio::test]
async fn test_insert_task_writes_and_reports_ok() {
    let (ctx, store) = context();
    assert_eq!(ctx.scenario, ExecutionScenario::Distributed);

    let task = InsertDocumentTask::new("k1", Bytes::from_static(b"v1"));
    task.set_node_source("node-a");

    let result = task.execute(&ctx).await.unwrap();
    assert_eq!(result, Bytes::from_static(b"OK"));
    assert_eq!(store.get("k1"), Some(Bytes::from_static(b"v1")));
    assert_eq!(task.node_source().as_deref(), Some("node-a"));

    assert!(task.is_write_operation());
    assert_eq!(task.result_strategy(), ResultStrategy::Majority);
}

#[tokio::test]
async fn test_insert_task_is_idempotent() {
    let (ctx, store) = context();
    let task = InsertDocumentTask::new("k1", Bytes::from_static(b"v1"));

    task.execute(&ctx).await.unwrap();
    task.execute(&ctx).await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("k1"), Some(Bytes::from_static(b"v1")));
}

#[tokio::test]
async fn test_delete_task_reports_whether_the_key_existed() {
    let (ctx, store) = context();
    store.insert("k1", Bytes::from_static(b"v1")).unwrap();

    let task = DeleteDocumentTask::new("k1");
    task.set_node_source("node-b");
    assert_eq!(task.execute(&ctx).await.unwrap(), Bytes::from_static(b"1"));
    assert_eq!(task.execute(&ctx).await.unwrap(), Bytes::from_static(b"0"));
    assert!(store.get("k1").is_none());
    assert_eq!(task.node_source().as_deref(), Some("node-b"));
}

#[tokio::test]
async fn test_read_task_is_not_a_write_and_returns_the_document() {
    let (ctx, store) = context();
    store.insert("k1", Bytes::from_static(b"v1")).unwrap();

    let task = ReadDocumentTask::new("k1");
    assert!(!task.is_write_operation());
    assert_eq!(task.result_strategy(), ResultStrategy::First);
    assert_eq!(task.execute(&ctx).await.unwrap(), Bytes::from_static(b"v1"));

    let missing = ReadDocumentTask::new("absent");
    assert_eq!(missing.execute(&ctx).await.unwrap(), Bytes::new());
}

#[tokio::test]
async fn test_undo_counts_are_observable() {
    let task = InsertDocumentTask::new("k1", Bytes::from_static(b"v1"));
    assert_eq!(task.undo_calls(), 0);
    task.undo().await;
    assert_eq!(task.undo_calls(), 1);
}

#[test]
fn test_timeout_hints_scale_with_node_counts() {
    let task = InsertDocumentTask::new("k1", Bytes::from_static(b"v1"))
        .with_timeout(Duration::from_millis(100));

    assert_eq!(task.total_timeout(3), Duration::from_millis(300));
    assert_eq!(task.synchronous_timeout(2), Duration::from_millis(200));
    // Degenerate counts never collapse the deadline to zero.
    assert_eq!(task.total_timeout(0), Duration::from_millis(100));
    assert_eq!(task.synchronous_timeout(0), Duration::from_millis(100));
}
