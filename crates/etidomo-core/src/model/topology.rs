// Floors and rooms of the plant.

use etidomo_api::{RawFloor, RawRoom};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub id: i64,
    pub name: String,
}

impl From<RawFloor> for Floor {
    fn from(raw: RawFloor) -> Self {
        let name = if raw.name.is_empty() {
            format!("Floor #{}", raw.floor_ind)
        } else {
            raw.name
        };
        Self {
            id: raw.floor_ind,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub floor_id: Option<i64>,
}

impl From<RawRoom> for Room {
    fn from(raw: RawRoom) -> Self {
        let name = if raw.name.is_empty() {
            format!("Room #{}", raw.room_ind)
        } else {
            raw.name
        };
        Self {
            id: raw.room_ind,
            name,
            floor_id: raw.floor_ind,
        }
    }
}
