// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The
// controller resolves the target entity in the store and routes each
// variant to the matching protocol request.

use crate::error::CoreError;
use crate::model::{EntityId, FanMode, HvacMode, Season};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Opening movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAction {
    Open,
    Close,
    Stop,
    SlatOpen,
    SlatClose,
}

/// All write operations against an ETI/Domo controller.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Lights ───────────────────────────────────────────────────────
    LightOn { id: EntityId },
    LightOff { id: EntityId },
    /// Hand the light back to the controller's automation.
    LightAuto { id: EntityId },
    /// Brightness in percent (dimmers and RGB lights).
    LightBrightness { id: EntityId, brightness: u8 },
    LightRgb { id: EntityId, rgb: [u8; 3] },
    /// Hue in degrees, saturation in percent.
    LightHs { id: EntityId, hue: f64, saturation: f64 },

    // ── Covers ───────────────────────────────────────────────────────
    Cover { id: EntityId, action: CoverAction },

    // ── Switches ─────────────────────────────────────────────────────
    SwitchOn { id: EntityId },
    SwitchOff { id: EntityId },

    // ── Climate ──────────────────────────────────────────────────────
    /// Target temperature in °C.
    SetTemperature { id: EntityId, celsius: f64 },
    SetHvacMode { id: EntityId, mode: HvacMode },
    SetFanMode { id: EntityId, mode: FanMode },
    SetSeason { id: EntityId, season: Season },

    // ── Scenarios ────────────────────────────────────────────────────
    ActivateScenario { id: EntityId },
    CreateScenario { name: String },
    DeleteScenario { id: EntityId },
}

impl Command {
    /// Entity the command targets, if any.
    pub fn target(&self) -> Option<&EntityId> {
        match self {
            Self::LightOn { id }
            | Self::LightOff { id }
            | Self::LightAuto { id }
            | Self::LightBrightness { id, .. }
            | Self::LightRgb { id, .. }
            | Self::LightHs { id, .. }
            | Self::Cover { id, .. }
            | Self::SwitchOn { id }
            | Self::SwitchOff { id }
            | Self::SetTemperature { id, .. }
            | Self::SetHvacMode { id, .. }
            | Self::SetFanMode { id, .. }
            | Self::SetSeason { id, .. }
            | Self::ActivateScenario { id }
            | Self::DeleteScenario { id } => Some(id),
            Self::CreateScenario { .. } => None,
        }
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// The light does not support the requested change; nothing was sent.
    Ignored { reason: String },
}
