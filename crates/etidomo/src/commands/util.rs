//! Shared helpers for command handlers.

use etidomo_core::{
    Command as CoreCommand, CommandResult, Controller, Device, DeviceKind, EntityId, Platform,
    sanitize_name,
};

use crate::cli::{GlobalOpts, Target};
use crate::error::CliError;

/// Resolve a target to the entity id of a device of `kind`.
///
/// Accepts a full entity id, an id without the platform prefix, or the
/// device name (case-insensitive).
pub fn resolve_device(
    controller: &Controller,
    target: &Target,
    kind: DeviceKind,
) -> Result<EntityId, CliError> {
    let snap = controller.devices_snapshot();
    let candidates = snap.iter().filter(|d| d.kind == kind);
    find_target(candidates, &target.entity, kind.platform())
        .map(|d| d.entity_id.clone())
        .ok_or_else(|| CliError::NotFound {
            resource_type: kind.to_string().to_lowercase(),
            identifier: target.entity.clone(),
            list_command: list_command(kind).into(),
        })
}

/// Resolve a target against every device.
pub fn resolve_any_device(
    controller: &Controller,
    target: &Target,
) -> Result<std::sync::Arc<Device>, CliError> {
    let snap = controller.devices_snapshot();
    let wanted = target.entity.trim();
    snap.iter()
        .find(|d| d.entity_id.to_string() == wanted)
        .or_else(|| snap.iter().find(|d| d.entity_id.object_id() == wanted))
        .or_else(|| snap.iter().find(|d| d.name.eq_ignore_ascii_case(wanted)))
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: target.entity.clone(),
            list_command: "devices list".into(),
        })
}

/// Resolve a target to a scenario entity id.
pub fn resolve_scenario(controller: &Controller, target: &Target) -> Result<EntityId, CliError> {
    let snap = controller.scenarios_snapshot();
    let wanted = target.entity.trim();
    let prefixed = format!("{}.{wanted}", Platform::Scene);
    snap.iter()
        .find(|s| {
            let id = s.entity_id.to_string();
            id == wanted || id == prefixed
        })
        .or_else(|| snap.iter().find(|s| s.name.eq_ignore_ascii_case(wanted)))
        .map(|s| s.entity_id.clone())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "scenario".into(),
            identifier: target.entity.clone(),
            list_command: "scenarios list".into(),
        })
}

fn find_target<'a>(
    candidates: impl Iterator<Item = &'a std::sync::Arc<Device>> + Clone,
    wanted: &str,
    platform: Platform,
) -> Option<&'a std::sync::Arc<Device>> {
    let wanted = wanted.trim();
    let object_id = wanted
        .strip_prefix(&format!("{platform}."))
        .unwrap_or(wanted);

    candidates
        .clone()
        .find(|d| d.entity_id.object_id() == object_id)
        .or_else(|| {
            let sanitized = sanitize_name(wanted);
            candidates
                .clone()
                .find(|d| d.name.eq_ignore_ascii_case(wanted) || sanitize_name(&d.name) == sanitized)
        })
}

fn list_command(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Light => "lights list",
        DeviceKind::Opening => "covers list",
        DeviceKind::Relay => "switches list",
        DeviceKind::Thermostat => "climate list",
        DeviceKind::Scenario => "scenarios list",
        DeviceKind::EnergySensor
        | DeviceKind::AnalogSensor
        | DeviceKind::DigitalInput => "sensors",
    }
}

/// Execute a command and report its outcome on stderr.
pub async fn execute(
    controller: &Controller,
    command: CoreCommand,
    done: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match controller.execute(command).await? {
        CommandResult::Ok => {
            if !global.quiet {
                eprintln!("✓ {done}");
            }
        }
        CommandResult::Ignored { reason } => {
            if !global.quiet {
                eprintln!("! Nothing sent: {reason}");
            }
        }
    }
    Ok(())
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// `-` for missing values in tables.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}
