// Scenario endpoints
//
// Scenarios have their own command set instead of a feature listing.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::client::DomoClient;
use crate::error::Error;
use crate::models::RawRecord;

#[derive(Deserialize)]
struct ScenarioListResp {
    #[serde(default)]
    array: Vec<RawRecord>,
}

impl DomoClient {
    /// List every scenario known to the controller.
    ///
    /// `scenarios_list_req` → `scenarios_list_resp`
    pub async fn list_scenarios(&self) -> Result<Vec<RawRecord>, Error> {
        let resp: ScenarioListResp = self
            .request(
                json!({ "cmd_name": "scenarios_list_req" }),
                "scenarios_list_resp",
                None,
            )
            .await?;
        debug!(count = resp.array.len(), "scenarios listed");
        Ok(resp.array)
    }

    /// Activate a scenario.
    ///
    /// `scenario_activation_req`. Controllers answer this inconsistently,
    /// so the reply name is not checked.
    pub async fn activate_scenario(&self, id: i64) -> Result<(), Error> {
        debug!(id, "activating scenario");
        self.application_request(
            json!({ "cmd_name": "scenario_activation_req", "id": id }),
            None,
            None,
        )
        .await
        .map(|_| ())
    }

    /// Start recording a new user scenario.
    ///
    /// `scenario_registration_start` → `scenario_registration_start_ack`
    pub async fn create_scenario(&self, name: &str) -> Result<(), Error> {
        info!(name, "starting scenario recording");
        self.application_request(
            json!({ "cmd_name": "scenario_registration_start", "name": name }),
            Some("scenario_registration_start_ack"),
            None,
        )
        .await
        .map(|_| ())
    }

    /// Delete a user scenario.
    ///
    /// `scenario_delete_req` → `scenario_delete_resp`
    pub async fn delete_scenario(&self, id: i64) -> Result<(), Error> {
        info!(id, "deleting scenario");
        self.application_request(
            json!({ "cmd_name": "scenario_delete_req", "id": id }),
            Some("scenario_delete_resp"),
            None,
        )
        .await
        .map(|_| ())
    }
}
