// Cumulative energy counter fed by instantaneous power readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Cumulative kWh integrated from power samples.
///
/// The total never decreases: negative or non-finite power and samples
/// that do not move time forward are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyCounter {
    pub total_kwh: f64,
    pub updated_at: Option<DateTime<Utc>>,
    /// Time of the last accepted sample in this process. Never persisted,
    /// so the first reading after a restart only starts the clock.
    #[serde(skip)]
    last_sample: Option<DateTime<Utc>>,
}

impl EnergyCounter {
    /// Counter resuming from a persisted total. Invalid totals restart at 0.
    pub fn resume(total_kwh: f64, updated_at: Option<DateTime<Utc>>) -> Self {
        let total_kwh = if total_kwh.is_finite() && total_kwh >= 0.0 {
            total_kwh
        } else {
            0.0
        };
        Self {
            total_kwh,
            updated_at,
            last_sample: None,
        }
    }

    /// Integrate `power_w` watts over the time since the previous sample.
    ///
    /// Returns the kWh added (0 for the first sample or an ignored one).
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn integrate(&mut self, power_w: f64, at: DateTime<Utc>) -> f64 {
        if !power_w.is_finite() || power_w < 0.0 {
            return 0.0;
        }
        let Some(previous) = self.last_sample else {
            self.last_sample = Some(at);
            return 0.0;
        };
        if at <= previous {
            return 0.0;
        }

        let elapsed_ms = (at - previous).num_milliseconds();
        let hours = elapsed_ms as f64 / 1000.0 / SECONDS_PER_HOUR;
        let delta = power_w * hours / 1000.0;

        self.total_kwh += delta;
        self.last_sample = Some(at);
        self.updated_at = Some(at);
        delta
    }

    /// Total rounded to watt-hours, as displayed.
    pub fn display_kwh(&self) -> f64 {
        (self.total_kwh * 1000.0).round() / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn first_sample_only_starts_the_clock() {
        let mut counter = EnergyCounter::default();
        assert!(counter.integrate(1000.0, t0()).abs() < f64::EPSILON);
        assert!(counter.total_kwh.abs() < f64::EPSILON);
        assert!(counter.updated_at.is_none());
    }

    #[test]
    fn one_kilowatt_for_an_hour_is_one_kwh() {
        let mut counter = EnergyCounter::default();
        counter.integrate(1000.0, t0());
        counter.integrate(1000.0, t0() + TimeDelta::minutes(30));
        counter.integrate(1000.0, t0() + TimeDelta::hours(1));
        assert!((counter.total_kwh - 1.0).abs() < 1e-9);
        assert_eq!(counter.updated_at, Some(t0() + TimeDelta::hours(1)));
    }

    #[test]
    fn invalid_samples_never_decrease_total() {
        let mut counter = EnergyCounter::resume(5.0, None);
        counter.integrate(500.0, t0());
        counter.integrate(-200.0, t0() + TimeDelta::minutes(10));
        counter.integrate(f64::NAN, t0() + TimeDelta::minutes(20));
        counter.integrate(500.0, t0() - TimeDelta::minutes(5));
        assert!((counter.total_kwh - 5.0).abs() < f64::EPSILON);

        counter.integrate(600.0, t0() + TimeDelta::minutes(60));
        assert!((counter.total_kwh - 5.6).abs() < 1e-9);
    }

    #[test]
    fn resume_rejects_invalid_totals() {
        assert!(EnergyCounter::resume(-3.0, None).total_kwh.abs() < f64::EPSILON);
        assert!(EnergyCounter::resume(f64::INFINITY, None).total_kwh.abs() < f64::EPSILON);
        assert!((EnergyCounter::resume(12.5, None).total_kwh - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn display_rounds_to_watt_hours() {
        let counter = EnergyCounter::resume(1.234_56, None);
        assert!((counter.display_kwh() - 1.235).abs() < 1e-12);
    }
}
