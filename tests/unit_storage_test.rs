use bytes::Bytes;
use citrinedb::core::storage::{DocumentStore, MemoryDocumentStore};

#[test]
fn test_insert_get_remove_round_trip() {
    let store = MemoryDocumentStore::new("db");
    assert!(store.is_empty());

    store.insert("k1", Bytes::from_static(b"v1")).unwrap();
    assert_eq!(store.get("k1"), Some(Bytes::from_static(b"v1")));
    assert_eq!(store.len(), 1);

    assert_eq!(store.remove("k1").unwrap(), Some(Bytes::from_static(b"v1")));
    assert!(store.get("k1").is_none());
    assert_eq!(store.remove("k1").unwrap(), None);
}

#[test]
fn test_reads_populate_the_request_cache() {
    let store = MemoryDocumentStore::new("db");
    store.insert("k1", Bytes::from_static(b"v1")).unwrap();

    assert_eq!(store.cache_hits(), 0);
    store.get("k1");
    store.get("k1");
    assert_eq!(store.cache_hits(), 1);

    store.clear_request_cache();
    store.get("k1");
    assert_eq!(store.cache_hits(), 1, "cache was dropped");
}

#[test]
fn test_insert_invalidates_cached_entry() {
    let store = MemoryDocumentStore::new("db");
    store.insert("k1", Bytes::from_static(b"v1")).unwrap();
    store.get("k1");

    store.insert("k1", Bytes::from_static(b"v2")).unwrap();
    assert_eq!(store.get("k1"), Some(Bytes::from_static(b"v2")));
}

#[test]
fn test_closed_store_rejects_writes() {
    let store = MemoryDocumentStore::new("db");
    store.insert("k1", Bytes::from_static(b"v1")).unwrap();

    store.close();
    assert!(store.is_closed());
    assert!(store.insert("k2", Bytes::from_static(b"v2")).is_err());
    assert!(store.remove("k1").is_err());
    assert!(store.get("k1").is_none());

    // Closing twice is harmless.
    store.close();
}
