//! Payload encodings shared by the byte-oriented sinks

use std::collections::HashMap;
use std::fmt::Write as _;

use contracts::PublishBatch;

/// Wire format of an encoded batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// `address, timestamp_ms, value\r\n` per reading
    #[default]
    Lines,
    /// JSON object with cycle header and readings
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

impl PayloadFormat {
    /// Read the `format` param, falling back to `default`
    pub fn from_params(
        params: &HashMap<String, String>,
        default: PayloadFormat,
    ) -> Result<Self, String> {
        match params.get("format").map(String::as_str) {
            None => Ok(default),
            Some("lines") => Ok(Self::Lines),
            Some("json") => Ok(Self::Json),
            Some("bincode") => Ok(Self::Bincode),
            Some(other) => Err(format!("unknown format '{}'", other)),
        }
    }

    pub fn encode(&self, batch: &PublishBatch) -> Result<Vec<u8>, String> {
        match self {
            Self::Lines => Ok(encode_lines(batch).into_bytes()),
            Self::Json => serde_json::to_vec(batch).map_err(|e| format!("json error: {}", e)),
            Self::Bincode => bincode::serialize(batch).map_err(|e| format!("bincode error: {}", e)),
        }
    }
}

/// Plain-text payload, one reading per CRLF-terminated line
pub fn encode_lines(batch: &PublishBatch) -> String {
    let mut out = String::with_capacity(batch.readings.len() * 32);
    for reading in &batch.readings {
        // writing into a String cannot fail
        let _ = write!(
            out,
            "{}, {}, {}\r\n",
            reading.address, reading.timestamp_ms, reading.value
        );
    }
    out
}
