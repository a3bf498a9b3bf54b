// ── Light view ──
//
// Brightness for RGB lights lives in the colour value, not in `perc`, so
// every brightness/colour change round-trips through HSV.

use std::fmt::Write as _;

use etidomo_api::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::fields;

/// Light hardware type (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightType {
    StepStep,
    Dimmer,
    Rgb,
}

/// `wanted_status` values of `light_switch_req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    Off,
    On,
    Auto,
}

impl LightState {
    pub fn wanted_status(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Auto => 4,
        }
    }

    pub fn from_status(status: i64) -> Option<Self> {
        match status {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            4 => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Read-only view over a light record.
#[derive(Debug, Clone, Copy)]
pub struct LightView<'a> {
    record: &'a RawRecord,
}

impl<'a> LightView<'a> {
    pub(crate) fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    pub fn light_type(&self) -> Option<LightType> {
        fields::string(self.record, "type").and_then(|t| t.parse().ok())
    }

    pub fn state(&self) -> Option<LightState> {
        fields::int(self.record, "status").and_then(LightState::from_status)
    }

    pub fn is_on(&self) -> bool {
        self.state() == Some(LightState::On)
    }

    pub fn supports_color(&self) -> bool {
        self.light_type() == Some(LightType::Rgb)
    }

    pub fn supports_brightness(&self) -> bool {
        matches!(self.light_type(), Some(LightType::Dimmer | LightType::Rgb))
    }

    /// Dimmer level in percent; `100` when the controller omits it.
    pub fn perc(&self) -> u8 {
        fields::int(self.record, "perc").map_or(100, clamp_percent)
    }

    /// Current colour. Lights without an `rgb` field report grey at the
    /// dimmer level.
    pub fn rgb(&self) -> [u8; 3] {
        if let Some(Value::Array(values)) = self.record.get("rgb") {
            let channel = |i: usize| {
                values
                    .get(i)
                    .and_then(fields::value_int)
                    .map_or(0, clamp_channel)
            };
            return [channel(0), channel(1), channel(2)];
        }
        let level = clamp_channel(i64::from(self.perc()) * 255 / 100);
        [level; 3]
    }

    /// Hue in degrees, saturation and value in percent.
    pub fn hsv(&self) -> [u16; 3] {
        rgb_to_hsv(self.rgb())
    }

    /// Hue (0–360) and saturation (0–100).
    pub fn hs(&self) -> [u16; 2] {
        let [h, s, _] = self.hsv();
        [h, s]
    }

    /// Brightness in percent. RGB lights derive it from the colour value.
    pub fn brightness(&self) -> u8 {
        if self.supports_color() {
            let [_, _, v] = self.hsv();
            u8::try_from(v.min(100)).unwrap_or(100)
        } else {
            self.perc()
        }
    }

    /// Colour that keeps the current hue/saturation at `brightness` percent.
    pub fn rgb_for_brightness(&self, brightness: u8) -> [u8; 3] {
        let [h, s, _] = self.hsv();
        hsv_to_rgb(
            f64::from(h) / 360.0,
            f64::from(s) / 100.0,
            f64::from(brightness.min(100)) * 255.0 / 100.0,
        )
    }

    /// Colour for a new hue/saturation at the current brightness.
    pub fn rgb_for_hs(&self, hue: f64, saturation: f64) -> [u8; 3] {
        let [_, _, v] = self.hsv();
        hsv_to_rgb(
            hue.clamp(0.0, 360.0) / 360.0,
            saturation.clamp(0.0, 100.0) / 100.0,
            f64::from(v) * 255.0 / 100.0,
        )
    }

    pub fn summary(&self) -> String {
        let mut out = self
            .state()
            .map_or_else(|| "unknown".to_owned(), |s| s.to_string());
        if self.supports_brightness() {
            let _ = write!(out, " {}%", self.brightness());
        }
        if self.supports_color() {
            let [r, g, b] = self.rgb();
            let _ = write!(out, " #{r:02x}{g:02x}{b:02x}");
        }
        out
    }
}

// ── Colour math ─────────────────────────────────────────────────────

/// RGB (0–255 channels) to `[hue°, saturation%, value%]`, rounding half to
/// even.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u16; 3] {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if (max - min).abs() < f64::EPSILON {
        return [0, 0, (v * 100.0 / 255.0).round_ties_even() as u16];
    }
    let s = (max - min) / max;
    let rc = (max - r) / (max - min);
    let gc = (max - g) / (max - min);
    let bc = (max - b) / (max - min);
    let h = if (r - max).abs() < f64::EPSILON {
        bc - gc
    } else if (g - max).abs() < f64::EPSILON {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let h = (h / 6.0).rem_euclid(1.0);

    [
        (h * 360.0).round_ties_even() as u16,
        (s * 100.0).round_ties_even() as u16,
        (v * 100.0 / 255.0).round_ties_even() as u16,
    ]
}

/// HSV with `h`/`s` in `0..=1` and `v` in `0..=255` to RGB, truncating
/// each channel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let to_u8 = |x: f64| x.clamp(0.0, 255.0) as u8;
    if s == 0.0 {
        return [to_u8(v); 3];
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [to_u8(r), to_u8(g), to_u8(b)]
}

fn clamp_percent(value: i64) -> u8 {
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
}

fn clamp_channel(value: i64) -> u8 {
    u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX)
}
