// ── Domain model ──
//
// Controller records lifted into typed entities. Devices keep their raw
// record and expose typed views over it; everything else is a plain struct.

pub mod climate;
pub mod cover;
pub mod device;
pub mod entity_id;
pub mod event;
pub mod light;
pub mod scenario;
pub mod sensor;
pub mod topology;

pub(crate) mod fields;

// ── Re-exports ──────────────────────────────────────────────────────

pub use entity_id::{EntityId, MAX_NAME_LEN, Platform, sanitize_name};

pub use device::{Device, DeviceKind};

pub use climate::{
    FanMode, HvacAction, HvacMode, Season, ThermoMode, ThermoView, ZoneSettings, set_point_tenths,
};
pub use cover::{OpeningState, OpeningView};
pub use light::{LightState, LightType, LightView, hsv_to_rgb, rgb_to_hsv};
pub use sensor::{AnalogSensorView, EnergyMeterView};

pub use scenario::Scenario;
pub use topology::{Floor, Room};

pub use event::DomoEvent;
