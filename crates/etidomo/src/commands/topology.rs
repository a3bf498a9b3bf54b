//! Floor and room listings.

use std::sync::Arc;

use etidomo_core::{Controller, Floor, Room};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct FloorRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Floor")]
    floor: String,
}

pub fn floors(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = controller.floors_snapshot();
    let out = output::render_list(
        &global.output,
        &snap,
        |f: &Arc<Floor>| FloorRow {
            id: f.id,
            name: f.name.clone(),
        },
        |f| f.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn rooms(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = controller.rooms_snapshot();
    let floor_name = |id: Option<i64>| {
        id.and_then(|id| controller.store().floor(id))
            .map_or_else(|| util::or_dash(id), |f| f.name.clone())
    };
    let out = output::render_list(
        &global.output,
        &snap,
        |r: &Arc<Room>| RoomRow {
            id: r.id,
            name: r.name.clone(),
            floor: floor_name(r.floor_id),
        },
        |r| r.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
