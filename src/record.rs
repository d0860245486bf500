use serde::{Deserialize, Serialize, Serializer};

use crate::error::SyncError;
use crate::session::SessionSummary;

/// Round to two decimal places, the precision the display and the sheet use
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_cents<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_cents(*value))
}

/// Body posted when a session completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackRecord {
    #[serde(serialize_with = "serialize_cents")]
    pub average: f64,
    pub num_students: u32,
}

impl FeedbackRecord {
    pub fn to_json(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(|e| SyncError::TransportFailure(e.to_string()))
    }
}

impl From<SessionSummary> for FeedbackRecord {
    fn from(s: SessionSummary) -> Self {
        Self {
            average: s.average,
            num_students: s.count,
        }
    }
}

/// What a fetch needs from the remote payload; other fields are ignored
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RemoteAverage {
    pub average: f64,
}

impl RemoteAverage {
    /// Decode a fetched body. A missing, null or non-numeric `average` is malformed.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }
}
