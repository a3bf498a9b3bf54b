// ── Entity identity ──
//
// Every device surfaces as `{platform}.{object_id}` where the object id is
// the sanitized device name plus its `act_id`. The derivation is pure, so
// identical controller state always yields the same identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::CoreError;

/// Longest sanitized name kept in an object id.
pub const MAX_NAME_LEN: usize = 20;

// ── Platform ────────────────────────────────────────────────────────

/// Entity platform, the part of the id before the dot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Light,
    Cover,
    Climate,
    Switch,
    Sensor,
    BinarySensor,
    Scene,
}

// ── EntityId ────────────────────────────────────────────────────────

/// Stable identifier of a controller entity, e.g. `light.cucina_59`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    platform: Platform,
    object_id: String,
}

impl EntityId {
    /// Derive the identifier of a device from its name and action id.
    ///
    /// A missing `act_id` is rendered as `0`.
    pub fn derive(platform: Platform, name: &str, act_id: Option<i64>) -> Self {
        let mut object_id = sanitize_name(name);
        if object_id.len() > MAX_NAME_LEN {
            object_id.truncate(MAX_NAME_LEN);
        }
        object_id.push('_');
        object_id.push_str(&act_id.unwrap_or(0).to_string());
        Self {
            platform,
            object_id,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Same id with a numeric disambiguation suffix (`_2`, `_3`, ...).
    pub fn with_suffix(&self, n: usize) -> Self {
        Self {
            platform: self.platform,
            object_id: format!("{}_{n}", self.object_id),
        }
    }

    /// A companion entity of the same device on another platform,
    /// e.g. the cumulative energy sensor of a power meter.
    pub fn child(&self, platform: Platform, suffix: &str) -> Self {
        Self {
            platform,
            object_id: format!("{}_{suffix}", self.object_id),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.platform, self.object_id)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidEntityId {
            value: s.to_owned(),
            reason: reason.to_owned(),
        };

        let (platform, object_id) = s
            .split_once('.')
            .ok_or_else(|| invalid("expected `platform.object_id`"))?;
        let platform = platform
            .parse::<Platform>()
            .map_err(|_| invalid("unknown platform"))?;
        if object_id.is_empty()
            || !object_id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("object id must be lowercase letters, digits and `_`"));
        }

        Ok(Self {
            platform,
            object_id: object_id.to_owned(),
        })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Name sanitizing ─────────────────────────────────────────────────

/// Lowercase `name`, collapse every run of characters outside `[a-z0-9]`
/// into a single `_`, and strip leading/trailing underscores.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}
