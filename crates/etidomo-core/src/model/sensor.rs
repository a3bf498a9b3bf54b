// Analog sensor and energy meter views.

use etidomo_api::RawRecord;

use super::fields;

/// Plant-wide analog sensor (temperature, humidity, pressure).
#[derive(Debug, Clone, Copy)]
pub struct AnalogSensorView<'a> {
    record: &'a RawRecord,
}

impl<'a> AnalogSensorView<'a> {
    pub(crate) fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    pub fn value(&self) -> Option<f64> {
        fields::float(self.record, "value")
    }

    pub fn unit(&self) -> Option<String> {
        fields::string(self.record, "unit")
    }

    pub fn summary(&self) -> String {
        match (self.value(), self.unit()) {
            (Some(v), Some(u)) => format!("{v} {u}"),
            (Some(v), None) => v.to_string(),
            (None, _) => "-".to_owned(),
        }
    }
}

/// Energy meter reading.
#[derive(Debug, Clone, Copy)]
pub struct EnergyMeterView<'a> {
    record: &'a RawRecord,
}

impl<'a> EnergyMeterView<'a> {
    pub(crate) fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    /// Instantaneous power.
    pub fn instant_power(&self) -> Option<f64> {
        fields::float(self.record, "instant_power")
    }

    /// Power unit; meters that omit it report watts.
    pub fn unit(&self) -> String {
        fields::string(self.record, "unit")
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "W".to_owned())
    }

    /// Whether the meter measures production rather than consumption.
    pub fn is_producer(&self) -> bool {
        fields::int(self.record, "produced") == Some(1)
    }

    pub fn last_24h_avg(&self) -> Option<f64> {
        fields::float(self.record, "last_24h_avg")
    }

    pub fn last_month_avg(&self) -> Option<f64> {
        fields::float(self.record, "last_month_avg")
    }

    pub fn energy_unit(&self) -> Option<String> {
        fields::string(self.record, "energy_unit")
    }

    /// Suffix of the cumulative energy entity for this meter.
    pub fn energy_suffix(&self) -> &'static str {
        if self.is_producer() {
            "energy_produced"
        } else {
            "energy_consumed"
        }
    }

    pub fn summary(&self) -> String {
        self.instant_power()
            .map_or_else(|| "-".to_owned(), |p| format!("{p} {}", self.unit()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meter_defaults_to_watts() {
        let rec = json!({"instant_power": 1250, "produced": 0})
            .as_object()
            .cloned()
            .unwrap();
        let meter = EnergyMeterView::new(&rec);
        assert_eq!(meter.unit(), "W");
        assert_eq!(meter.summary(), "1250 W");
        assert_eq!(meter.energy_suffix(), "energy_consumed");
    }

    #[test]
    fn producer_meter() {
        let rec = json!({"instant_power": 800, "unit": "W", "produced": 1, "last_24h_avg": 410})
            .as_object()
            .cloned()
            .unwrap();
        let meter = EnergyMeterView::new(&rec);
        assert!(meter.is_producer());
        assert_eq!(meter.energy_suffix(), "energy_produced");
        assert_eq!(meter.last_24h_avg(), Some(410.0));
    }

    #[test]
    fn analog_summary() {
        let rec = json!({"value": 21.5, "unit": "C"}).as_object().cloned().unwrap();
        assert_eq!(AnalogSensorView::new(&rec).summary(), "21.5 C");
    }
}
