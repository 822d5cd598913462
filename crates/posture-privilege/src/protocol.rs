//! Wire format of the delegation socket.
//!
//! One newline-terminated JSON object each way:
//!
//! ```text
//! -> {"uuid":"2e46c89a-5461-4865-a92e-3b799c12034a"}
//! <- {"2e46c89a-5461-4865-a92e-3b799c12034a":true}
//! ```
//!
//! A response without an entry for the requested id means the helper
//! declined or could not run the probe.

use posture_core::{PostureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ask the helper to run one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperRequest {
    /// Probe id
    pub uuid: String,
}

impl HelperRequest {
    /// Request for the given probe id
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }

    /// Encode as one line, newline included
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one received line
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Probe id -> passed, as sent back by the helper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HelperResponse(pub BTreeMap<String, bool>);

impl HelperResponse {
    /// Response carrying one outcome
    pub fn outcome(uuid: impl Into<String>, passed: bool) -> Self {
        Self(BTreeMap::from([(uuid.into(), passed)]))
    }

    /// The empty response used for declined requests
    #[must_use]
    pub fn declined() -> Self {
        Self::default()
    }

    /// Outcome for `uuid`, if the helper reported one
    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<bool> {
        self.0.get(uuid).copied()
    }

    /// Encode as one line, newline included
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode a received response body
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| PostureError::HelperProtocol(format!("response is not UTF-8: {e}")))?;
        serde_json::from_str(text.trim())
            .map_err(|e| PostureError::HelperProtocol(format!("{e}: {:?}", text.trim())))
    }
}
