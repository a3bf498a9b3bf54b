// ── Central reactive data store ──
//
// Thread-safe storage for every entity discovered on the plant.
// Mutations are broadcast to subscribers via `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Device, DeviceKind, EntityId, Floor, Room, Scenario};
use crate::stream::EntityStream;

/// Central reactive store for devices, scenarios and plant topology.
///
/// Reads are wait-free, writes use fine-grained per-shard locks within
/// `DashMap`. No lock is ever held across an `.await`.
pub struct DataStore {
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) scenarios: EntityCollection<Scenario>,
    pub(crate) floors: EntityCollection<Floor>,
    pub(crate) rooms: EntityCollection<Room>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_status_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_full_refresh, _) = watch::channel(None);
        let (last_status_update, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            scenarios: EntityCollection::new(),
            floors: EntityCollection::new(),
            rooms: EntityCollection::new(),
            last_full_refresh,
            last_status_update,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    /// Devices of one kind, in entity id order.
    pub fn devices_of_kind(&self, kind: DeviceKind) -> Vec<Arc<Device>> {
        self.devices
            .snapshot()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    pub fn scenarios_snapshot(&self) -> Arc<Vec<Arc<Scenario>>> {
        self.scenarios.snapshot()
    }

    pub fn floors_snapshot(&self) -> Arc<Vec<Arc<Floor>>> {
        self.floors.snapshot()
    }

    pub fn rooms_snapshot(&self) -> Arc<Vec<Arc<Room>>> {
        self.rooms.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn device(&self, id: &EntityId) -> Option<Arc<Device>> {
        self.devices.get_by_key(&id.to_string())
    }

    /// Every device answering to `act_id`.
    pub fn devices_by_act_id(&self, act_id: i64) -> Vec<Arc<Device>> {
        self.devices
            .keys_for_id(act_id)
            .iter()
            .filter_map(|k| self.devices.get_by_key(k))
            .collect()
    }

    pub fn scenario(&self, id: &EntityId) -> Option<Arc<Scenario>> {
        self.scenarios.get_by_key(&id.to_string())
    }

    pub fn scenario_by_id(&self, id: i64) -> Option<Arc<Scenario>> {
        self.scenarios.get_by_id(id)
    }

    pub fn floor(&self, id: i64) -> Option<Arc<Floor>> {
        self.floors.get_by_id(id)
    }

    pub fn room(&self, id: i64) -> Option<Arc<Room>> {
        self.rooms.get_by_id(id)
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn scenario_count(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.scenarios.is_empty()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    pub fn subscribe_scenarios(&self) -> EntityStream<Scenario> {
        EntityStream::new(self.scenarios.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_status_update(&self) -> Option<DateTime<Utc>> {
        *self.last_status_update.borrow()
    }

    /// How long ago the last full refresh occurred, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_full_refresh().map(|t| Utc::now() - t)
    }

    /// Drop every entity. Used on disconnect.
    pub(crate) fn clear(&self) {
        self.devices.clear();
        self.scenarios.clear();
        self.floors.clear();
        self.rooms.clear();
        self.last_full_refresh.send_replace(None);
        self.last_status_update.send_replace(None);
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
