//! Persistence for energy counters.
//!
//! Counters live in a single JSON file under the state directory so that
//! cumulative totals survive restarts.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::counter::EnergyCounter;
use crate::error::CoreError;
use crate::model::EntityId;

/// File name of the counter state inside the state directory.
pub const ENERGY_STATE_FILE: &str = "energy.json";

const STATE_VERSION: u32 = 1;

/// On-disk counter state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyState {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub counters: BTreeMap<EntityId, EnergyCounter>,
}

/// Reads and writes [`EnergyState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct EnergyStore {
    state_path: PathBuf,
}

impl EnergyStore {
    /// Store writing `energy.json` inside `state_dir`.
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self::new(state_dir.as_ref().join(ENERGY_STATE_FILE))
    }

    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Load counter state.
    ///
    /// A missing file yields empty state. A corrupt file is logged and
    /// treated as empty; invalid totals restart at zero.
    pub fn load(&self) -> Result<EnergyState, CoreError> {
        let contents = match fs::read_to_string(&self.state_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    path = %self.state_path.display(),
                    "no energy state yet, counters start at 0 kWh"
                );
                return Ok(EnergyState::default());
            }
            Err(e) => return Err(self.error(&e)),
        };

        let mut state: EnergyState = match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.state_path.display(),
                    error = %e,
                    "energy state is unreadable, counters restart at 0 kWh"
                );
                return Ok(EnergyState::default());
            }
        };

        for (id, counter) in &mut state.counters {
            let restored = EnergyCounter::resume(counter.total_kwh, counter.updated_at);
            if restored.total_kwh.to_bits() != counter.total_kwh.to_bits() {
                warn!(entity_id = %id, "invalid stored energy total, restarting at 0 kWh");
            }
            *counter = restored;
        }

        debug!(
            path = %self.state_path.display(),
            counters = state.counters.len(),
            "energy state loaded"
        );
        Ok(state)
    }

    /// Save counter state using an atomic write (temp file + rename).
    pub fn save(&self, state: &EnergyState) -> Result<(), CoreError> {
        if let Some(parent) = self.state_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.error(&e))?;
            }
        }

        let state = EnergyState {
            version: STATE_VERSION,
            counters: state.counters.clone(),
        };
        let json = serde_json::to_string_pretty(&state).map_err(|e| CoreError::Persistence {
            path: self.state_path.display().to_string(),
            message: e.to_string(),
        })?;

        let temp_path = self.state_path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| self.error(&e))?;
        fs::rename(&temp_path, &self.state_path).map_err(|e| self.error(&e))?;

        debug!(
            path = %self.state_path.display(),
            counters = state.counters.len(),
            "energy state saved"
        );
        Ok(())
    }

    fn error(&self, e: &io::Error) -> CoreError {
        CoreError::Persistence {
            path: self.state_path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Platform;

    fn counter_id() -> EntityId {
        EntityId::derive(Platform::Sensor, "Contatore", Some(1)).child(Platform::Sensor, "energy_consumed")
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnergyStore::in_dir(dir.path());
        assert_eq!(store.load().unwrap(), EnergyState::default());
    }

    #[test]
    fn save_then_load_restores_totals() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnergyStore::in_dir(dir.path().join("nested"));

        let mut state = EnergyState::default();
        state
            .counters
            .insert(counter_id(), EnergyCounter::resume(42.125, None));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, STATE_VERSION);
        assert!((loaded.counters[&counter_id()].total_kwh - 42.125).abs() < f64::EPSILON);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnergyStore::in_dir(dir.path());
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().unwrap().counters.is_empty());
    }

    #[test]
    fn negative_totals_restart_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnergyStore::in_dir(dir.path());
        fs::write(
            store.path(),
            r#"{"version":1,"counters":{"sensor.contatore_1_energy_consumed":{"total_kwh":-4.0,"updated_at":null}}}"#,
        )
        .unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.counters[&counter_id()].total_kwh.abs() < f64::EPSILON);
    }
}
