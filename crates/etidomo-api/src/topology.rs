// Controller identity and plant topology endpoints
//
// Feature discovery plus the floor/room layout devices are attached to.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::DomoClient;
use crate::error::Error;
use crate::models::{FeatureList, RawFloor, RawRoom};

#[derive(Deserialize)]
struct FloorListResp {
    #[serde(default)]
    floor_list: Vec<RawFloor>,
}

#[derive(Deserialize)]
struct RoomListResp {
    #[serde(default)]
    room_list: Vec<RawRoom>,
}

impl DomoClient {
    /// Read the controller's software version, serial, and enabled features.
    ///
    /// `feature_list_req` → `feature_list_resp`
    pub async fn feature_list(&self) -> Result<FeatureList, Error> {
        let list: FeatureList = self
            .request(json!({ "cmd_name": "feature_list_req" }), "feature_list_resp", None)
            .await?;
        debug!(
            swver = list.swver.as_deref().unwrap_or("?"),
            features = list.list.len(),
            "controller features loaded"
        );
        Ok(list)
    }

    /// List the plant's floors.
    ///
    /// `floor_list_req` (scope `plant`) → `floor_list_resp`
    pub async fn floors(&self) -> Result<Vec<RawFloor>, Error> {
        let resp: FloorListResp = self
            .request(
                json!({ "cmd_name": "floor_list_req", "topologic_scope": "plant" }),
                "floor_list_resp",
                None,
            )
            .await?;
        debug!(count = resp.floor_list.len(), "floors loaded");
        Ok(resp.floor_list)
    }

    /// List the plant's rooms.
    ///
    /// `room_list_req` (scope `plant`) → `room_list_resp`
    pub async fn rooms(&self) -> Result<Vec<RawRoom>, Error> {
        let resp: RoomListResp = self
            .request(
                json!({ "cmd_name": "room_list_req", "topologic_scope": "plant" }),
                "room_list_resp",
                None,
            )
            .await?;
        debug!(count = resp.room_list.len(), "rooms loaded");
        Ok(resp.room_list)
    }
}
