// ── Generic reactive entity collection ──
//
// Concurrent storage keyed by entity id with a numeric secondary index
// and push-based change notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection for a single entity type.
///
/// Uses `DashMap` for O(1) concurrent lookups and `watch` channels
/// for push-based change notification. Every mutation bumps a version
/// counter and rebuilds the snapshot that subscribers receive.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    /// Primary storage: entity id string -> entity.
    by_key: DashMap<String, Arc<T>>,

    /// Secondary index: controller id (`act_id`, scenario id) -> keys.
    /// Several entities may share one controller id (an energy meter and
    /// its companion counter, or devices of different kinds).
    id_to_keys: DashMap<i64, Vec<String>>,

    /// Reverse of `id_to_keys` for efficient removal.
    key_to_id: DashMap<String, i64>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    /// Sorted by key so consumers see a stable order.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            id_to_keys: DashMap::new(),
            key_to_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, id: Option<i64>, entity: T) -> bool {
        let is_new = self.insert_quiet(key, id, entity);
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Insert or update many entities with a single notification.
    /// Returns the keys that were new.
    pub(crate) fn upsert_many(&self, items: Vec<(String, Option<i64>, T)>) -> Vec<String> {
        if items.is_empty() {
            return Vec::new();
        }
        let mut added = Vec::new();
        for (key, id, entity) in items {
            if self.insert_quiet(key.clone(), id, entity) {
                added.push(key);
            }
        }
        self.rebuild_snapshot();
        self.bump_version();
        added
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.remove_quiet(key);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    /// Look up an entity by its primary key string.
    pub(crate) fn get_by_key(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// First entity carrying controller id `id`.
    pub(crate) fn get_by_id(&self, id: i64) -> Option<Arc<T>> {
        let keys = self.id_to_keys.get(&id)?;
        keys.iter().find_map(|k| self.get_by_key(k))
    }

    /// Every key carrying controller id `id`.
    pub(crate) fn keys_for_id(&self, id: i64) -> Vec<String> {
        self.id_to_keys
            .get(&id)
            .map(|keys| keys.value().clone())
            .unwrap_or_default()
    }

    /// Replace the entity at `key` through `f`, keeping its index entry.
    ///
    /// `f` returns `None` to leave the entity untouched. Returns the new
    /// value when something was written.
    pub(crate) fn modify<F>(&self, key: &str, f: F) -> Option<Arc<T>>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let updated = {
            let mut entry = self.by_key.get_mut(key)?;
            let next = Arc::new(f(entry.value())?);
            *entry.value_mut() = Arc::clone(&next);
            next
        };
        self.rebuild_snapshot();
        self.bump_version();
        Some(updated)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        self.by_key.clear();
        self.id_to_keys.clear();
        self.key_to_id.clear();
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Return all current primary keys in the collection.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.by_key.iter().map(|r| r.key().clone()).collect()
    }

    /// Current mutation count.
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn insert_quiet(&self, key: String, id: Option<i64>, entity: T) -> bool {
        // Clean up a stale id mapping if the key moved to another id.
        let old_id = self.key_to_id.get(&key).map(|r| *r.value());
        if old_id.is_some() && old_id != id {
            self.unindex(&key);
        }

        let is_new = self.by_key.insert(key.clone(), Arc::new(entity)).is_none();
        if let Some(id) = id {
            if old_id != Some(id) {
                self.id_to_keys.entry(id).or_default().push(key.clone());
            }
            self.key_to_id.insert(key, id);
        }
        is_new
    }

    fn remove_quiet(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.unindex(key);
        }
        removed
    }

    fn unindex(&self, key: &str) {
        if let Some((_, id)) = self.key_to_id.remove(key) {
            let now_empty = self.id_to_keys.get_mut(&id).is_some_and(|mut keys| {
                keys.retain(|k| k != key);
                keys.is_empty()
            });
            if now_empty {
                self.id_to_keys.remove_if(&id, |_, keys| keys.is_empty());
            }
        }
    }

    /// Collect all values into a sorted snapshot and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    /// Increment the version counter.
    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert("light.a_1".into(), Some(1), "hello".into()));
        assert!(!col.upsert("light.a_1".into(), Some(1), "world".into()));
        assert_eq!(*col.get_by_key("light.a_1").unwrap(), "world");
    }

    #[test]
    fn get_by_id_uses_secondary_index() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("light.a_1".into(), Some(1), "a".into());
        col.upsert("sensor.x_0".into(), None, "x".into());

        assert_eq!(*col.get_by_id(1).unwrap(), "a");
        assert!(col.get_by_id(0).is_none());
    }

    #[test]
    fn shared_ids_index_every_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("light.a_5".into(), Some(5), "light".into());
        col.upsert("switch.b_5".into(), Some(5), "relay".into());

        let mut keys = col.keys_for_id(5);
        keys.sort();
        assert_eq!(keys, vec!["light.a_5", "switch.b_5"]);

        col.remove("light.a_5");
        assert_eq!(col.keys_for_id(5), vec!["switch.b_5"]);
    }

    #[test]
    fn remove_cleans_up_indexes() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("k".into(), Some(9), "v".into());

        assert_eq!(*col.remove("k").unwrap(), "v");
        assert!(col.get_by_key("k").is_none());
        assert!(col.get_by_id(9).is_none());
        assert!(col.keys_for_id(9).is_empty());
        assert!(col.is_empty());
    }

    #[test]
    fn upsert_with_changed_id_cleans_old_mapping() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("k".into(), Some(1), "v1".into());
        col.upsert("k".into(), Some(2), "v2".into());

        assert!(col.get_by_id(1).is_none());
        assert_eq!(*col.get_by_id(2).unwrap(), "v2");
        assert_eq!(col.keys_for_id(2), vec!["k"]);
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert_many(vec![
            ("b".into(), None, "second".into()),
            ("a".into(), None, "first".into()),
        ]);
        let snap = col.snapshot();
        assert_eq!(*snap[0], "first");
        assert_eq!(*snap[1], "second");
    }

    #[test]
    fn modify_rewrites_in_place() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("k".into(), Some(1), "v".into());
        let before = col.version();

        assert!(col.modify("k", |_| None).is_none());
        assert_eq!(col.version(), before);

        let updated = col.modify("k", |v| Some(format!("{v}!"))).unwrap();
        assert_eq!(*updated, "v!");
        assert_eq!(*col.get_by_id(1).unwrap(), "v!");
        assert!(col.version() > before);
    }

    #[test]
    fn clear_empties_everything() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("a".into(), Some(1), "x".into());
        col.upsert("b".into(), Some(2), "y".into());
        assert_eq!(col.len(), 2);

        col.clear();
        assert!(col.is_empty());
        assert!(col.snapshot().is_empty());
        assert!(!col.contains_key("a"));
    }
}
