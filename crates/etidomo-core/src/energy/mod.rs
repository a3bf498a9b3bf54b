// ── Energy counter tracking ──
//
// Every energy meter gets a companion cumulative counter
// (`sensor.{meter}_energy_consumed` or `_energy_produced`). Counters are
// fed by the meter poller and persisted so totals survive restarts.

mod counter;
mod persistence;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

pub use counter::EnergyCounter;
pub use persistence::{ENERGY_STATE_FILE, EnergyState, EnergyStore};

use crate::error::CoreError;
use crate::model::{Device, EntityId, Platform};

/// Below this increment a sample is only traced, not logged at debug.
const NOTABLE_INCREMENT_KWH: f64 = 0.0001;

/// Energy counters keyed by their entity id, with optional persistence.
pub struct EnergyTracker {
    store: Option<EnergyStore>,
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    counters: BTreeMap<EntityId, EnergyCounter>,
    dirty: bool,
}

impl EnergyTracker {
    /// Tracker persisting to `store`, or in-memory only with `None`.
    pub fn new(store: Option<EnergyStore>) -> Self {
        Self {
            store,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn store(&self) -> Option<&EnergyStore> {
        self.store.as_ref()
    }

    /// Entity id of the cumulative counter belonging to `meter`.
    pub fn counter_id(meter: &Device) -> Option<EntityId> {
        let view = meter.energy_meter()?;
        Some(meter.entity_id.child(Platform::Sensor, view.energy_suffix()))
    }

    /// Load persisted totals. Counters already tracked are replaced.
    /// Returns the number of restored counters.
    pub async fn restore(&self) -> Result<usize, CoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let loaded = store.load()?;
        let count = loaded.counters.len();
        for (id, counter) in &loaded.counters {
            info!(entity_id = %id, total_kwh = counter.display_kwh(), "restored energy counter");
        }

        let mut state = self.state.lock().await;
        state.counters = loaded.counters;
        state.dirty = false;
        Ok(count)
    }

    /// Feed a meter's current power reading into its counter.
    ///
    /// Returns the counter's new total, or `None` when `meter` is not an
    /// energy meter or reports no power.
    pub async fn record(&self, meter: &Device, at: DateTime<Utc>) -> Option<f64> {
        let id = Self::counter_id(meter)?;
        let view = meter.energy_meter()?;
        let mut power = view.instant_power()?;
        if view.unit().eq_ignore_ascii_case("kw") {
            power *= 1000.0;
        }

        let mut state = self.state.lock().await;
        let counter = state.counters.entry(id.clone()).or_default();
        let delta = counter.integrate(power, at);
        let total = counter.total_kwh;
        if delta > 0.0 {
            state.dirty = true;
        }
        if delta > NOTABLE_INCREMENT_KWH {
            debug!(entity_id = %id, power_w = power, delta_kwh = delta, total_kwh = total, "energy integrated");
        } else {
            trace!(entity_id = %id, power_w = power, delta_kwh = delta, "energy sample");
        }
        Some(total)
    }

    /// Write counters to disk if anything changed since the last write.
    /// Returns whether a write happened.
    pub async fn persist(&self) -> Result<bool, CoreError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(false);
        }
        let snapshot = EnergyState {
            version: 0,
            counters: state.counters.clone(),
        };
        store.save(&snapshot)?;
        state.dirty = false;
        Ok(true)
    }

    /// Current counters.
    pub async fn snapshot(&self) -> BTreeMap<EntityId, EnergyCounter> {
        self.state.lock().await.counters.clone()
    }

    pub async fn total(&self, id: &EntityId) -> Option<f64> {
        self.state.lock().await.counters.get(id).map(|c| c.total_kwh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::DeviceKind;
    use chrono::TimeDelta;
    use serde_json::json;

    fn meter(power: f64, produced: i64) -> Device {
        Device::from_record(
            DeviceKind::EnergySensor,
            json!({"act_id": 1, "name": "Contatore", "instant_power": power, "produced": produced})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn counter_id_follows_direction() {
        assert_eq!(
            EnergyTracker::counter_id(&meter(0.0, 0)).unwrap().to_string(),
            "sensor.contatore_1_energy_consumed"
        );
        assert_eq!(
            EnergyTracker::counter_id(&meter(0.0, 1)).unwrap().to_string(),
            "sensor.contatore_1_energy_produced"
        );
    }

    #[tokio::test]
    async fn totals_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();

        let tracker = EnergyTracker::new(Some(EnergyStore::in_dir(dir.path())));
        tracker.record(&meter(2000.0, 0), t0()).await;
        tracker
            .record(&meter(2000.0, 0), t0() + TimeDelta::minutes(30))
            .await;
        assert!(tracker.persist().await.unwrap());
        assert!(!tracker.persist().await.unwrap());

        let restarted = EnergyTracker::new(Some(EnergyStore::in_dir(dir.path())));
        assert_eq!(restarted.restore().await.unwrap(), 1);
        let id = EnergyTracker::counter_id(&meter(0.0, 0)).unwrap();
        assert!((restarted.total(&id).await.unwrap() - 1.0).abs() < 1e-9);

        // First sample after restart does not integrate, later ones add on.
        restarted.record(&meter(1000.0, 0), t0() + TimeDelta::hours(5)).await;
        let total = restarted
            .record(&meter(1000.0, 0), t0() + TimeDelta::hours(6))
            .await
            .unwrap();
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn non_meters_are_ignored() {
        let tracker = EnergyTracker::new(None);
        let light = Device::from_record(
            DeviceKind::Light,
            json!({"act_id": 1, "name": "Cucina"}).as_object().cloned().unwrap(),
        );
        assert!(tracker.record(&light, t0()).await.is_none());
        assert!(!tracker.persist().await.unwrap());
        assert!(tracker.snapshot().await.is_empty());
    }
}
