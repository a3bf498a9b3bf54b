// ── Refresh application logic ──
//
// Applies discovery results, status updates and scenario lists to the
// DataStore. Discovery uses upsert-then-prune so subscribers never observe
// a transient empty store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use etidomo_api::RawRecord;
use serde::Serialize;
use tracing::{debug, warn};

use super::DataStore;
use super::collection::EntityCollection;
use crate::model::{Device, DeviceKind, EntityId, Floor, Room, Scenario, fields};

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    /// Devices present before and after whose fields changed.
    pub updated: usize,
}

impl Reconciliation {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated == 0
    }
}

/// Upsert all incoming entities, then prune any existing keys not in the
/// incoming set. Returns the keys that were new and the entities removed.
fn upsert_and_prune<T: Clone + Send + Sync + 'static>(
    collection: &EntityCollection<T>,
    items: Vec<(String, Option<i64>, T)>,
) -> (Vec<String>, Vec<Arc<T>>) {
    let incoming_keys: HashSet<String> = items.iter().map(|(k, _, _)| k.clone()).collect();
    let added = collection.upsert_many(items);
    let mut removed = Vec::new();
    for existing_key in collection.keys() {
        if !incoming_keys.contains(&existing_key) {
            if let Some(entity) = collection.remove(&existing_key) {
                removed.push(entity);
            }
        }
    }
    (added, removed)
}

/// Give every device a unique entity id, in discovery order.
///
/// The first device deriving an id keeps it; later ones get `_2`, `_3`, ...
pub(crate) fn disambiguate(devices: &mut [Device]) {
    let mut taken: HashSet<EntityId> = HashSet::with_capacity(devices.len());
    let mut next_suffix: HashMap<EntityId, usize> = HashMap::new();

    for device in devices.iter_mut() {
        if taken.insert(device.entity_id.clone()) {
            continue;
        }
        let base = device.entity_id.clone();
        let counter = next_suffix.entry(base.clone()).or_insert(2);
        let mut candidate = base.with_suffix(*counter);
        while taken.contains(&candidate) {
            *counter += 1;
            candidate = base.with_suffix(*counter);
        }
        *counter += 1;
        warn!(
            entity_id = %base,
            assigned = %candidate,
            name = %device.name,
            "duplicate entity id, disambiguating"
        );
        taken.insert(candidate.clone());
        device.entity_id = candidate;
    }
}

/// Controller id a status record refers to.
fn record_act_id(record: &RawRecord) -> Option<i64> {
    fields::int(record, "act_id").or_else(|| fields::int(record, "open_act_id"))
}

impl DataStore {
    /// Reconcile the store against a full device inventory.
    ///
    /// Devices absent from `incoming` are removed, new ones added, and
    /// known ones replaced by their fresh record.
    pub(crate) fn reconcile_devices(&self, mut incoming: Vec<Device>) -> Reconciliation {
        disambiguate(&mut incoming);

        let mut updated = 0;
        let items = incoming
            .into_iter()
            .map(|device| {
                let key = device.entity_id.to_string();
                if let Some(existing) = self.devices.get_by_key(&key) {
                    if existing.record != device.record {
                        updated += 1;
                    }
                }
                (key, device.act_id, device)
            })
            .collect();

        let (added_keys, removed) = upsert_and_prune(&self.devices, items);
        let mut added: Vec<EntityId> = added_keys
            .iter()
            .filter_map(|k| self.devices.get_by_key(k))
            .map(|d| d.entity_id.clone())
            .collect();
        added.sort();
        let mut removed: Vec<EntityId> = removed.iter().map(|d| d.entity_id.clone()).collect();
        removed.sort();

        self.last_full_refresh.send_replace(Some(Utc::now()));
        debug!(
            added = added.len(),
            removed = removed.len(),
            updated,
            total = self.devices.len(),
            "device inventory reconciled"
        );

        Reconciliation {
            added,
            removed,
            updated,
        }
    }

    /// Overlay a status record onto every matching device.
    ///
    /// Records are matched by `act_id` (openings also by `open_act_id`);
    /// `kind` narrows the match, e.g. to energy meters. Returns the devices
    /// that actually changed.
    pub(crate) fn apply_device_update(
        &self,
        record: &RawRecord,
        kind: Option<DeviceKind>,
    ) -> Vec<Arc<Device>> {
        let Some(act_id) = record_act_id(record) else {
            return Vec::new();
        };

        let changed: Vec<Arc<Device>> = self
            .devices
            .keys_for_id(act_id)
            .iter()
            .filter_map(|key| {
                self.devices.modify(key, |device| {
                    if kind.is_some_and(|k| k != device.kind) {
                        return None;
                    }
                    let mut next = device.clone();
                    next.apply_update(record).then_some(next)
                })
            })
            .collect();

        self.last_status_update.send_replace(Some(Utc::now()));
        changed
    }

    /// Overlay a plant analog sensor reading onto the sensor of that
    /// measurement.
    pub(crate) fn apply_analog_update(
        &self,
        measurement: &str,
        record: &RawRecord,
    ) -> Option<Arc<Device>> {
        let key = self
            .devices
            .snapshot()
            .iter()
            .find(|d| {
                d.kind == DeviceKind::AnalogSensor
                    && d.device_class.as_deref() == Some(measurement)
            })
            .map(|d| d.entity_id.to_string())?;

        self.devices.modify(&key, |device| {
            let mut next = device.clone();
            next.apply_update(record).then_some(next)
        })
    }

    /// Replace the scenario list. Returns the new scenario count.
    pub(crate) fn replace_scenarios(&self, incoming: Vec<Scenario>) -> usize {
        let mut seen = HashSet::new();
        let items = incoming
            .into_iter()
            .filter(|s| seen.insert(s.entity_id.clone()))
            .map(|s| (s.entity_id.to_string(), Some(s.id), s))
            .collect();
        let (_, removed) = upsert_and_prune(&self.scenarios, items);
        if !removed.is_empty() {
            debug!(count = removed.len(), "stale scenarios removed");
        }
        self.scenarios.len()
    }

    /// Apply a `scenario_status_ind`. Returns the updated scenario.
    pub(crate) fn apply_scenario_status(&self, record: &RawRecord) -> Option<Arc<Scenario>> {
        let id = fields::int(record, "id")?;
        let key = self.scenarios.get_by_id(id)?.entity_id.to_string();
        self.scenarios.modify(&key, |scenario| {
            let mut next = scenario.clone();
            next.apply_status(record).then_some(next)
        })
    }

    /// Replace floors and rooms.
    pub(crate) fn replace_topology(&self, floors: Vec<Floor>, rooms: Vec<Room>) {
        upsert_and_prune(
            &self.floors,
            floors
                .into_iter()
                .map(|f| (format!("floor:{}", f.id), Some(f.id), f))
                .collect(),
        );
        upsert_and_prune(
            &self.rooms,
            rooms
                .into_iter()
                .map(|r| (format!("room:{}", r.id), Some(r.id), r))
                .collect(),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn light(act_id: i64, name: &str, status: i64) -> Device {
        Device::from_record(
            DeviceKind::Light,
            record(json!({"act_id": act_id, "name": name, "status": status, "type": "STEP_STEP"})),
        )
    }

    fn ids(ids: &[EntityId]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn reconcile_adds_updates_and_removes() {
        let store = DataStore::new();
        let first = store.reconcile_devices(vec![light(1, "Cucina", 0), light(2, "Sala", 0)]);
        assert_eq!(ids(&first.added), vec!["light.cucina_1", "light.sala_2"]);
        assert!(first.removed.is_empty());

        let second = store.reconcile_devices(vec![light(1, "Cucina", 1), light(3, "Bagno", 0)]);
        assert_eq!(ids(&second.added), vec!["light.bagno_3"]);
        assert_eq!(ids(&second.removed), vec!["light.sala_2"]);
        assert_eq!(second.updated, 1);
        assert_eq!(store.device_count(), 2);
        assert!(store.devices_by_act_id(2).is_empty());
    }

    #[test]
    fn repeated_discovery_is_stable() {
        let store = DataStore::new();
        store.reconcile_devices(vec![light(1, "Cucina", 0)]);
        let again = store.reconcile_devices(vec![light(1, "Cucina", 0)]);
        assert!(again.is_unchanged());
        let id: EntityId = "light.cucina_1".parse().unwrap();
        assert!(store.device(&id).is_some());
    }

    #[test]
    fn collisions_get_numeric_suffixes_in_order() {
        let mut devices = vec![light(4, "Faretti", 0), light(4, "Faretti", 1), light(4, "Faretti", 0)];
        disambiguate(&mut devices);
        assert_eq!(devices[0].entity_id.to_string(), "light.faretti_4");
        assert_eq!(devices[1].entity_id.to_string(), "light.faretti_4_2");
        assert_eq!(devices[2].entity_id.to_string(), "light.faretti_4_3");
    }

    #[test]
    fn status_update_matches_act_id() {
        let store = DataStore::new();
        store.reconcile_devices(vec![light(1, "Cucina", 0), light(2, "Sala", 0)]);

        let changed = store.apply_device_update(
            &record(json!({"cmd_name": "light_switch_ind", "act_id": 2, "status": 1})),
            None,
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name, "Sala");
        assert!(changed[0].is_on());

        let unchanged = store.apply_device_update(&record(json!({"act_id": 2, "status": 1})), None);
        assert!(unchanged.is_empty());
        assert!(store.last_status_update().is_some());
    }

    #[test]
    fn kind_filter_limits_updates() {
        let store = DataStore::new();
        let meter = Device::from_record(
            DeviceKind::EnergySensor,
            record(json!({"act_id": 1, "name": "Contatore", "instant_power": 100})),
        );
        store.reconcile_devices(vec![light(1, "Cucina", 0), meter]);

        let changed = store.apply_device_update(
            &record(json!({"act_id": 1, "instant_power": 250})),
            Some(DeviceKind::EnergySensor),
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].kind, DeviceKind::EnergySensor);
        let lamp: EntityId = "light.cucina_1".parse().unwrap();
        assert!(!store.device(&lamp).unwrap().record.contains_key("instant_power"));
    }

    #[test]
    fn scenario_replace_leaves_no_stale_entries() {
        let store = DataStore::new();
        let scenario = |id: i64, name: &str| {
            Scenario::from_record(&record(json!({"id": id, "name": name}))).unwrap()
        };
        store.replace_scenarios(vec![scenario(1, "Notte"), scenario(2, "Giorno")]);
        let count = store.replace_scenarios(vec![scenario(2, "Giorno"), scenario(3, "Cinema")]);

        assert_eq!(count, 2);
        assert!(store.scenario_by_id(1).is_none());
        let names: Vec<_> = store
            .scenarios_snapshot()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, vec!["Cinema", "Giorno"]);
    }

    #[test]
    fn scenario_status_updates_by_id() {
        let store = DataStore::new();
        store.replace_scenarios(vec![
            Scenario::from_record(&record(json!({"id": 7, "name": "Uscita"}))).unwrap(),
        ]);
        let updated = store
            .apply_scenario_status(&record(json!({"id": 7, "scenario_status": 2})))
            .unwrap();
        assert!(updated.is_active());
        assert!(store.apply_scenario_status(&record(json!({"id": 99, "scenario_status": 2}))).is_none());
    }

    #[test]
    fn analog_sensor_update_by_measurement() {
        let store = DataStore::new();
        store.reconcile_devices(vec![Device::analog(
            "temperature",
            record(json!({"value": 20.5, "unit": "C"})),
        )]);
        let updated = store
            .apply_analog_update("temperature", &record(json!({"value": 21.0, "unit": "C"})))
            .unwrap();
        assert_eq!(updated.analog_sensor().unwrap().value(), Some(21.0));
        assert!(store.apply_analog_update("pressure", &RawRecord::new()).is_none());
    }
}
