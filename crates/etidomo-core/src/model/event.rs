// ── Controller event types ──
//
// Broadcast to every subscriber of `Controller::events()`. Payloads carry
// the post-change entity so consumers don't need a store round-trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::device::Device;
use super::entity_id::EntityId;
use super::scenario::Scenario;
use crate::controller::ConnectionState;

/// Something the controller observed or did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DomoEvent {
    /// A device's fields changed through a status update or a refresh.
    DeviceUpdated {
        at: DateTime<Utc>,
        device: Arc<Device>,
    },
    /// Discovery found new devices.
    DevicesAdded {
        at: DateTime<Utc>,
        entity_ids: Vec<EntityId>,
    },
    /// Discovery no longer reports these devices.
    DevicesRemoved {
        at: DateTime<Utc>,
        entity_ids: Vec<EntityId>,
    },
    /// The scenario list was replaced.
    ScenariosRefreshed { at: DateTime<Utc>, count: usize },
    /// A scenario reported progress.
    ScenarioStatus {
        at: DateTime<Utc>,
        scenario: Arc<Scenario>,
    },
    /// The controller announced a plant configuration change.
    PlantChanged { at: DateTime<Utc> },
    /// Connection state transition.
    ConnectionChanged {
        at: DateTime<Utc>,
        state: ConnectionState,
    },
}

impl DomoEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::DeviceUpdated { at, .. }
            | Self::DevicesAdded { at, .. }
            | Self::DevicesRemoved { at, .. }
            | Self::ScenariosRefreshed { at, .. }
            | Self::ScenarioStatus { at, .. }
            | Self::PlantChanged { at }
            | Self::ConnectionChanged { at, .. } => *at,
        }
    }
}
