//! Multi-connection concurrency tests for the credential counter store.
//!
//! Two connections share one file-backed DB so the advance has to hold up
//! under SQLite's own locking, not just the in-process mutex.

use chrono::{Duration, Utc};
use sitectl_core::auth::{
    compute_tag, Advance, AuthError, AuthFailure, AuthGate, CredentialStore, Secret,
    SqliteCredentialStore, TagAlgorithm, ValidityWindow,
};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::NamedTempFile;

const SECRET: &str = "race-secret";

fn gate(store: Arc<dyn CredentialStore>) -> AuthGate {
    AuthGate::new(
        store,
        Some(Secret::new(SECRET)),
        Some(ValidityWindow::new(Utc::now(), 180)),
        TagAlgorithm::Md5,
    )
}

/// Two connections advancing the same counter observe distinct values.
#[test]
fn test_two_connections_advance_distinct_values() {
    let tmp = NamedTempFile::new().unwrap();
    let store1 = Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap());
    let store2 = Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [store1.clone(), store2]
        .into_iter()
        .map(|store| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.advance("cred", Duration::seconds(240), Utc::now())
            })
        })
        .collect();

    let mut previous: Vec<i64> = handles
        .into_iter()
        .map(|h| match h.join().unwrap().unwrap() {
            Advance::Advanced { previous } => previous,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    previous.sort_unstable();

    assert_eq!(previous, vec![0, 1]);
    assert_eq!(store1.get("cred", Utc::now()).unwrap(), Some(2));
}

/// Test: the same tag raced over two connections authenticates exactly once.
#[test]
fn test_two_connections_same_tag_one_succeeds() {
    let tmp = NamedTempFile::new().unwrap();
    let gate1 = gate(Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap()));
    let gate2 = gate(Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap()));
    let tag = compute_tag(TagAlgorithm::Md5, &Secret::new(SECRET), 0);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [gate1, gate2]
        .into_iter()
        .map(|gate| {
            let barrier = barrier.clone();
            let tag = tag.clone();
            thread::spawn(move || {
                barrier.wait();
                gate.authenticate(Utc::now(), Some(&tag)).map(|s| s.counter())
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AuthError::Denied(AuthFailure::BadCredential))))
        .count();
    assert_eq!(successes, 1, "exactly one connection should authenticate");
    assert_eq!(rejected, 1, "the other should see an advanced counter");
}

/// Revocation written through one connection is seen by the other.
#[test]
fn test_revocation_visible_across_connections() {
    let tmp = NamedTempFile::new().unwrap();
    let gate1 = gate(Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap()));
    let gate2 = gate(Arc::new(SqliteCredentialStore::open(tmp.path()).unwrap()));
    let secret = Secret::new(SECRET);

    let session = gate1
        .authenticate(Utc::now(), Some(&compute_tag(TagAlgorithm::Md5, &secret, 0)))
        .unwrap();
    session.revoke(Utc::now()).unwrap();

    let err = gate2
        .authenticate(Utc::now(), Some(&compute_tag(TagAlgorithm::Md5, &secret, 1)))
        .unwrap_err();
    assert_eq!(err, AuthError::Denied(AuthFailure::Revoked));
}
