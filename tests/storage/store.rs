//! Integration tests for EntityStore
//!
//! Tests slot allocation, reuse, and stale reference detection.

use reticle_foundation::{EntityKind, ErrorKind};
use reticle_storage::EntityStore;

#[test]
fn spawn_counts_live_slots() {
    let mut store = EntityStore::new(EntityKind::Fact);
    assert!(store.is_empty());
    let a = store.spawn();
    let b = store.spawn();
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
}

#[test]
fn reused_slots_get_new_generations() {
    let mut store = EntityStore::new(EntityKind::Fact);
    let a = store.spawn();
    store.destroy(a).unwrap();
    let b = store.spawn();
    assert_eq!(a.index, b.index);
    assert_ne!(a.generation, b.generation);
    assert!(!store.exists(a));
    assert!(store.exists(b));
}

#[test]
fn stale_ids_are_reported() {
    let mut store = EntityStore::new(EntityKind::Instance);
    let a = store.spawn();
    store.destroy(a).unwrap();
    assert!(matches!(
        store.validate(a).unwrap_err().kind,
        ErrorKind::EntityNotFound(_)
    ));
    let _reused = store.spawn();
    assert!(matches!(
        store.validate(a).unwrap_err().kind,
        ErrorKind::StaleEntity(_)
    ));
    assert!(store.destroy(a).is_err());
}

#[test]
fn clear_frees_everything() {
    let mut store = EntityStore::new(EntityKind::Fact);
    let ids: Vec<_> = (0..4).map(|_| store.spawn()).collect();
    store.clear();
    assert!(store.is_empty());
    assert!(ids.iter().all(|id| !store.exists(*id)));
}
