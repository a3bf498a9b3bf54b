// Status long poll and energy meter endpoints

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::trace;

use crate::client::DomoClient;
use crate::error::Error;
use crate::models::RawRecord;

#[derive(Deserialize)]
struct StatusUpdateResp {
    #[serde(default)]
    result: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct MetersListResp {
    #[serde(default)]
    array: Vec<RawRecord>,
}

impl DomoClient {
    /// Long-poll for state changes.
    ///
    /// `status_update_req` → `status_update_resp`. With `timeout_secs` the
    /// controller holds the request until something changes or the timeout
    /// passes; the HTTP timeout is stretched to cover that wait.
    pub async fn status_update(&self, timeout_secs: Option<u64>) -> Result<Vec<RawRecord>, Error> {
        let mut cmd = Map::new();
        cmd.insert("cmd_name".into(), "status_update_req".into());
        if let Some(secs) = timeout_secs {
            cmd.insert("timeout".into(), secs.into());
        }
        let http_timeout = timeout_secs
            .map(|secs| self.request_timeout() + Duration::from_secs(secs));

        let resp: StatusUpdateResp = self
            .request(Value::Object(cmd), "status_update_resp", http_timeout)
            .await?;
        trace!(count = resp.result.len(), "status update received");
        Ok(resp.result)
    }

    /// Read every energy meter's current values.
    ///
    /// `meters_list_req` → `meters_list_resp`
    pub async fn meters(&self, timeout: Option<Duration>) -> Result<Vec<RawRecord>, Error> {
        let resp: MetersListResp = self
            .request(json!({ "cmd_name": "meters_list_req" }), "meters_list_resp", timeout)
            .await?;
        trace!(count = resp.array.len(), "meters read");
        Ok(resp.array)
    }
}
