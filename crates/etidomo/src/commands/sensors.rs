//! Sensor listing: analog sensors, digital inputs and energy meters.

use std::sync::Arc;

use etidomo_core::{Controller, Device, DeviceKind};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&Arc<Device>> for SensorRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            entity: d.entity_id.to_string(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            class: d.device_class.clone().unwrap_or_else(|| "-".into()),
            value: d.state_summary(),
        }
    }
}

fn is_sensor(kind: DeviceKind) -> bool {
    matches!(
        kind,
        DeviceKind::AnalogSensor | DeviceKind::DigitalInput | DeviceKind::EnergySensor
    )
}

pub fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let sensors: Vec<Arc<Device>> = controller
        .devices_snapshot()
        .iter()
        .filter(|d| is_sensor(d.kind))
        .cloned()
        .collect();
    let out = output::render_list(
        &global.output,
        &sensors,
        |d| SensorRow::from(d),
        |d| d.entity_id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
