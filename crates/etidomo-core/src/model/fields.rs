// Lenient field accessors for raw controller records.
//
// Firmware releases disagree on whether numbers arrive as JSON numbers or
// strings, so every accessor accepts both.

use etidomo_api::RawRecord;
use serde_json::Value;

pub(crate) fn int(record: &RawRecord, key: &str) -> Option<i64> {
    value_int(record.get(key)?)
}

pub(crate) fn float(record: &RawRecord, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn string(record: &RawRecord, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn object<'a>(record: &'a RawRecord, key: &str) -> Option<&'a RawRecord> {
    record.get(key)?.as_object()
}

pub(crate) fn value_int(value: &Value) -> Option<i64> {
    match value {
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => RawRecord::new(),
        }
    }

    #[test]
    fn numbers_are_read_from_strings() {
        let rec = record(json!({"act_id": "59", "perc": 40, "temp": "21.5"}));
        assert_eq!(int(&rec, "act_id"), Some(59));
        assert_eq!(int(&rec, "perc"), Some(40));
        assert_eq!(float(&rec, "temp"), Some(21.5));
        assert_eq!(int(&rec, "missing"), None);
    }

    #[test]
    fn whole_floats_are_integers() {
        let rec = record(json!({"status": 1.0, "half": 1.5}));
        assert_eq!(int(&rec, "status"), Some(1));
        assert_eq!(int(&rec, "half"), None);
    }
}
