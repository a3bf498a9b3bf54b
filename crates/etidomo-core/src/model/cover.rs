// Opening (shutter, gate, door) view.

use etidomo_api::RawRecord;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::fields;

/// Last reported movement of an opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OpeningState {
    Stopped,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct OpeningView<'a> {
    record: &'a RawRecord,
}

impl<'a> OpeningView<'a> {
    pub(crate) fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    pub fn state(&self) -> Option<OpeningState> {
        match fields::int(self.record, "status")? {
            0 => Some(OpeningState::Stopped),
            1 => Some(OpeningState::Open),
            2 => Some(OpeningState::Closed),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == Some(OpeningState::Open)
    }

    /// Act id of the closing relay, when the controller exposes it.
    pub fn close_act_id(&self) -> Option<i64> {
        fields::int(self.record, "close_act_id")
    }

    pub fn summary(&self) -> String {
        self.state()
            .map_or_else(|| "unknown".to_owned(), |s| s.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_one_is_open() {
        let rec = json!({"status": 1}).as_object().cloned().unwrap();
        let opening = OpeningView::new(&rec);
        assert!(opening.is_open());
        assert_eq!(opening.summary(), "open");
    }

    #[test]
    fn unknown_status_is_unknown() {
        let rec = json!({"status": 9}).as_object().cloned().unwrap();
        assert_eq!(OpeningView::new(&rec).summary(), "unknown");
    }
}
