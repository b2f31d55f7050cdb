//! Conformance suite exercising both façades.
//!
//! The blocking and async façades must be observably identical for
//! equivalent inputs. The paired tests below drive the same operations
//! through `Database` and through `Database::promises()`, and the final
//! test replays one script through both and compares every result.
//! Revision digests are content-derived, so equal inputs must produce
//! equal revisions on independent stores.

use std::time::Duration;

use lumen_db::{Database, DbError, DocQuery, Document, Revision, StoreConfig};
use tempfile::TempDir;

fn open_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap();
    (dir, db)
}

// ─── Round-trip ──────────────────────────────────────────────────────────────

#[test]
fn blocking_put_get_roundtrip() {
    let (_dir, db) = open_db();
    let resp = db.put(&Document::new("a", b"payload".to_vec())).unwrap();
    let doc = db.get("a").unwrap().unwrap();
    assert_eq!(doc.payload, b"payload");
    assert_eq!(doc.rev, Some(resp.rev));
}

#[tokio::test]
async fn async_put_get_roundtrip() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    let resp = promises
        .put(&Document::new("a", b"payload".to_vec()))
        .await
        .unwrap();
    let doc = promises.get("a").await.unwrap().unwrap();
    assert_eq!(doc.payload, b"payload");
    assert_eq!(doc.rev, Some(resp.rev));
}

// ─── Conflict detection ──────────────────────────────────────────────────────

#[test]
fn blocking_stale_rev_conflicts() {
    let (_dir, db) = open_db();
    let stale = db.put(&Document::new("a", b"v1".to_vec())).unwrap().rev;
    db.put(&Document::with_rev("a", stale, b"v2".to_vec()))
        .unwrap();

    let err = db
        .put(&Document::with_rev("a", stale, b"v3".to_vec()))
        .unwrap_err();
    assert_eq!(err.name(), "conflict");
    assert_eq!(db.get("a").unwrap().unwrap().payload, b"v2");
}

#[tokio::test]
async fn async_stale_rev_conflicts() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    let stale = promises
        .put(&Document::new("a", b"v1".to_vec()))
        .await
        .unwrap()
        .rev;
    promises
        .put(&Document::with_rev("a", stale, b"v2".to_vec()))
        .await
        .unwrap();

    let err = promises
        .put(&Document::with_rev("a", stale, b"v3".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.name(), "conflict");
    assert_eq!(promises.get("a").await.unwrap().unwrap().payload, b"v2");
}

// ─── Bulk isolation ──────────────────────────────────────────────────────────

#[test]
fn blocking_bulk_isolates_conflicts() {
    let (_dir, db) = open_db();
    db.put(&Document::new("taken", b"v".to_vec())).unwrap();

    let results = db.bulk_docs(&[
        Document::new("valid", b"a".to_vec()),
        Document::new("taken", b"b".to_vec()),
    ]);
    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().name(), "conflict");
    assert_eq!(db.get("valid").unwrap().unwrap().payload, b"a");
}

#[tokio::test]
async fn async_bulk_isolates_conflicts() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    promises
        .put(&Document::new("taken", b"v".to_vec()))
        .await
        .unwrap();

    let results = promises
        .bulk_docs(&[
            Document::new("valid", b"a".to_vec()),
            Document::new("taken", b"b".to_vec()),
        ])
        .await
        .unwrap();
    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().name(), "conflict");
    assert_eq!(promises.get("valid").await.unwrap().unwrap().payload, b"a");
}

// ─── Prefix scans ────────────────────────────────────────────────────────────

#[test]
fn blocking_prefix_scan() {
    let (_dir, db) = open_db();
    for id in ["A/1", "A/2", "B/1"] {
        db.put(&Document::new(id, b"{}".to_vec())).unwrap();
    }
    let ids: Vec<String> = db
        .all_docs("A/")
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["A/1", "A/2"]);
}

#[tokio::test]
async fn async_prefix_scan() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    for id in ["A/1", "A/2", "B/1"] {
        promises
            .put(&Document::new(id, b"{}".to_vec()))
            .await
            .unwrap();
    }
    let ids: Vec<String> = promises
        .all_docs("A/")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["A/1", "A/2"]);
}

// ─── Attachment independence ─────────────────────────────────────────────────

#[test]
fn blocking_attachment_independent_of_document() {
    let (_dir, db) = open_db();
    let bytes = vec![7u8; 2048];
    db.post_attachment("icon", &bytes, "image/png").unwrap();

    assert!(db.get("icon").unwrap().is_none());
    assert_eq!(db.get_attachment("icon").unwrap().unwrap(), bytes);
    assert_eq!(db.get_attachment_type("icon").unwrap().unwrap(), "image/png");
}

#[tokio::test]
async fn async_attachment_independent_of_document() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    let bytes = vec![7u8; 2048];
    promises
        .post_attachment("icon", &bytes, "image/png")
        .await
        .unwrap();

    assert!(promises.get("icon").await.unwrap().is_none());
    assert_eq!(promises.get_attachment("icon").await.unwrap().unwrap(), bytes);
    assert_eq!(
        promises.get_attachment_type("icon").await.unwrap().unwrap(),
        "image/png"
    );
}

// ─── Tombstones ──────────────────────────────────────────────────────────────

#[test]
fn blocking_tombstone_rejects_stale_rev() {
    let (_dir, db) = open_db();
    let rev = db.put(&Document::new("a", b"v".to_vec())).unwrap().rev;
    db.remove(&Document::with_rev("a", rev, Vec::<u8>::new())).unwrap();

    let err = db
        .put(&Document::with_rev("a", rev, b"again".to_vec()))
        .unwrap_err();
    assert_eq!(err.name(), "conflict");
}

#[tokio::test]
async fn async_tombstone_rejects_stale_rev() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    let rev = promises
        .put(&Document::new("a", b"v".to_vec()))
        .await
        .unwrap()
        .rev;
    promises
        .remove(&Document::with_rev("a", rev, Vec::<u8>::new()))
        .await
        .unwrap();

    let err = promises
        .put(&Document::with_rev("a", rev, b"again".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.name(), "conflict");
}

// ─── Sync bookkeeping ────────────────────────────────────────────────────────

#[test]
fn blocking_sync_status_idempotent() {
    let (_dir, db) = open_db();
    let rev = db.put(&Document::new("a", b"v".to_vec())).unwrap().rev;
    for _ in 0..3 {
        db.update_sync_status("a", true).unwrap();
        let meta = db.get_sync_meta("a").unwrap().unwrap();
        assert!(meta.cloud_synced);
        assert_eq!(meta.rev, rev);
    }
}

#[tokio::test]
async fn async_sync_status_idempotent() {
    let (_dir, db) = open_db();
    let promises = db.promises();
    let rev = promises
        .put(&Document::new("a", b"v".to_vec()))
        .await
        .unwrap()
        .rev;
    for _ in 0..3 {
        promises.update_sync_status("a", true).await.unwrap();
        let meta = promises.get_sync_meta("a").await.unwrap().unwrap();
        assert!(meta.cloud_synced);
        assert_eq!(meta.rev, rev);
    }
}

// ─── Deadlines ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn generous_deadline_does_not_interfere() {
    let (_dir, db) = open_db();
    let promises = db.promises().with_timeout(Duration::from_secs(30));
    let resp = promises
        .put(&Document::new("a", b"v".to_vec()))
        .await
        .unwrap();
    assert_eq!(resp.rev.generation(), 1);
    assert!(promises.get("a").await.unwrap().is_some());
}

// ─── Façades agree ───────────────────────────────────────────────────────────

/// Replay one operation script through the blocking façade on one store and
/// the async façade on another, and compare every observable result.
#[tokio::test]
async fn facades_produce_identical_results() {
    let (_dir_a, sync_db) = open_db();
    let (_dir_b, async_db) = open_db();
    let promises = async_db.promises();

    // put
    let s1 = sync_db.put(&Document::new("doc/1", b"one".to_vec())).unwrap();
    let a1 = promises
        .put(&Document::new("doc/1", b"one".to_vec()))
        .await
        .unwrap();
    assert_eq!(s1, a1);

    // update
    let s2 = sync_db
        .put(&Document::with_rev("doc/1", s1.rev, b"two".to_vec()))
        .unwrap();
    let a2 = promises
        .put(&Document::with_rev("doc/1", a1.rev, b"two".to_vec()))
        .await
        .unwrap();
    assert_eq!(s2, a2);

    // conflict payloads match, including the reported current revision
    let stale = Document::with_rev("doc/1", s1.rev, b"three".to_vec());
    let s_err = sync_db.put(&stale).unwrap_err();
    let a_err = promises.put(&stale).await.unwrap_err();
    assert_eq!(s_err.name(), a_err.name());
    assert_eq!(s_err.current_rev(), a_err.current_rev());

    // bulk
    let batch = vec![
        Document::new("doc/2", b"x".to_vec()),
        Document::new("doc/1", b"y".to_vec()),
    ];
    let s_bulk = sync_db.bulk_docs(&batch);
    let a_bulk = promises.bulk_docs(&batch).await.unwrap();
    assert_eq!(s_bulk.len(), a_bulk.len());
    for (s, a) in s_bulk.iter().zip(a_bulk.iter()) {
        match (s, a) {
            (Ok(sr), Ok(ar)) => assert_eq!(sr, ar),
            (Err(se), Err(ae)) => {
                assert_eq!(se.name(), ae.name());
                assert_eq!(se.current_rev(), ae.current_rev());
            }
            _ => panic!("façades disagree on bulk outcome"),
        }
    }

    // range query
    let s_all = sync_db.all_docs(DocQuery::All).unwrap();
    let a_all = promises.all_docs(DocQuery::All).await.unwrap();
    assert_eq!(s_all, a_all);

    // remove, then the tombstone revision matches too
    let s_rm = sync_db.remove("doc/2").unwrap();
    let a_rm = promises.remove("doc/2").await.unwrap();
    assert_eq!(s_rm, a_rm);

    let s_miss = sync_db.remove("doc/2").unwrap_err();
    let a_miss = promises.remove("doc/2").await.unwrap_err();
    assert_eq!(s_miss.name(), a_miss.name());
}

// ─── Revision monotonicity across façades ────────────────────────────────────

#[tokio::test]
async fn interleaved_facades_share_one_revision_sequence() {
    let (_dir, db) = open_db();
    let promises = db.promises();

    let r1 = db.put(&Document::new("k", b"v1".to_vec())).unwrap().rev;
    let r2 = promises
        .put(&Document::with_rev("k", r1, b"v2".to_vec()))
        .await
        .unwrap()
        .rev;
    let r3 = db
        .put(&Document::with_rev("k", r2, b"v3".to_vec()))
        .unwrap()
        .rev;

    let generations: Vec<u64> = [r1, r2, r3].iter().map(Revision::generation).collect();
    assert_eq!(generations, vec![1, 2, 3]);
}
