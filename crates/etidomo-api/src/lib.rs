// etidomo-api: Async Rust client for the CAME ETI/Domo controller protocol

pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod scenarios;
pub mod status;
pub mod topology;
pub mod transport;

pub use client::{DomoClient, GENERIC_REPLY, endpoint_for};
pub use devices::{LightSwitch, OpeningMove, ZoneConfig};
pub use error::Error;
pub use models::{DeviceListing, Feature, FeatureList, RawFloor, RawRecord, RawRoom};
pub use transport::TransportConfig;
