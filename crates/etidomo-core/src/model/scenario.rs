// ── Scenario domain type ──

use etidomo_api::RawRecord;
use serde::{Deserialize, Serialize};

use super::entity_id::{EntityId, Platform};
use super::fields;

/// `scenario_status` value of a running scenario.
const SCENARIO_ACTIVE: i64 = 2;

/// A named set of device actions stored on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub entity_id: EntityId,
    pub id: i64,
    pub name: String,
    pub status: i64,
    /// Progress reported by `scenario_status_ind`, when known.
    pub scenario_status: Option<i64>,
    pub user_defined: bool,
}

impl Scenario {
    /// Build a scenario from a `scenarios_list_resp` entry.
    ///
    /// Entries without an `id` cannot be activated and are rejected.
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let id = fields::int(record, "id")?;
        let name = fields::string(record, "name").unwrap_or_else(|| format!("Scenario {id}"));
        let user_defined = fields::int(record, "user_defined")
            .or_else(|| fields::int(record, "user-defined"))
            == Some(1);

        Some(Self {
            entity_id: EntityId::derive(Platform::Scene, &name, Some(id)),
            id,
            name,
            status: fields::int(record, "status").unwrap_or(0),
            scenario_status: fields::int(record, "scenario_status"),
            user_defined,
        })
    }

    pub fn is_active(&self) -> bool {
        self.scenario_status == Some(SCENARIO_ACTIVE)
    }

    /// Apply a `scenario_status_ind`. Returns `true` when something changed.
    pub fn apply_status(&mut self, record: &RawRecord) -> bool {
        let mut changed = false;
        if let Some(status) = fields::int(record, "status") {
            changed |= self.status != status;
            self.status = status;
        }
        if let Some(progress) = fields::int(record, "scenario_status") {
            changed |= self.scenario_status != Some(progress);
            self.scenario_status = Some(progress);
        }
        changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_hyphenated_user_defined_flag() {
        let sc = Scenario::from_record(&record(json!({
            "id": 4, "name": "Buona Notte", "user-defined": 1
        })))
        .unwrap();
        assert!(sc.user_defined);
        assert_eq!(sc.entity_id.to_string(), "scene.buona_notte_4");
    }

    #[test]
    fn entries_without_id_are_skipped() {
        assert!(Scenario::from_record(&record(json!({"name": "Ghost"}))).is_none());
    }

    #[test]
    fn status_indication_marks_active() {
        let mut sc = Scenario::from_record(&record(json!({"id": 1, "name": "Uscita"}))).unwrap();
        assert!(!sc.is_active());
        assert!(sc.apply_status(&record(json!({"id": 1, "scenario_status": 2}))));
        assert!(sc.is_active());
        assert!(!sc.apply_status(&record(json!({"id": 1, "scenario_status": 2}))));
    }
}
