//! Energy meter readings with their cumulative counters.

use etidomo_core::{Controller, DeviceKind, EnergyTracker};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct MeterReading {
    entity_id: String,
    name: String,
    power: Option<f64>,
    unit: String,
    produced: bool,
    last_24h_avg: Option<f64>,
    counter_id: Option<String>,
    total_kwh: Option<f64>,
}

#[derive(Tabled)]
struct MeterRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "24h avg")]
    avg: String,
    #[tabled(rename = "Counter")]
    counter: String,
    #[tabled(rename = "Total")]
    total: String,
}

impl From<&MeterReading> for MeterRow {
    fn from(m: &MeterReading) -> Self {
        Self {
            entity: m.entity_id.clone(),
            name: m.name.clone(),
            power: m
                .power
                .map_or_else(|| "-".into(), |p| format!("{p} {}", m.unit)),
            direction: if m.produced { "produced" } else { "consumed" }.into(),
            avg: util::or_dash(m.last_24h_avg),
            counter: m.counter_id.clone().unwrap_or_else(|| "-".into()),
            total: m
                .total_kwh
                .map_or_else(|| "-".into(), |t| format!("{t:.3} kWh")),
        }
    }
}

/// Poll the meters once, then show power alongside the counter totals.
pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    controller.poll_energy().await?;

    let mut readings = Vec::new();
    for meter in controller.store().devices_of_kind(DeviceKind::EnergySensor) {
        let Some(view) = meter.energy_meter() else {
            continue;
        };
        let counter_id = EnergyTracker::counter_id(&meter);
        let total_kwh = match &counter_id {
            Some(id) => controller.energy().total(id).await,
            None => None,
        };
        readings.push(MeterReading {
            entity_id: meter.entity_id.to_string(),
            name: meter.name.clone(),
            power: view.instant_power(),
            unit: view.unit(),
            produced: view.is_producer(),
            last_24h_avg: view.last_24h_avg(),
            counter_id: counter_id.map(|id| id.to_string()),
            total_kwh,
        });
    }

    let out = output::render_list(
        &global.output,
        &readings,
        |m| MeterRow::from(m),
        |m| m.entity_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
