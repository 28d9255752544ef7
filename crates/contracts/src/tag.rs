//! TagValue / TagReading - controller read results

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::TagAddress;

/// Typed tag value as returned by the controller.
///
/// Compared with plain value equality: no tolerance or hysteresis is applied,
/// any inequality counts as a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One successful reading, stamped with the start time of its cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReading {
    /// Tag address
    pub address: TagAddress,

    /// Value read in this cycle
    pub value: TagValue,

    /// Cycle start time (ms since Unix epoch), shared by all readings of the cycle
    pub timestamp_ms: u64,
}

/// Per-address read failure inside an otherwise successful batch
#[derive(Debug, Clone, PartialEq, Error)]
#[error("read of '{address}' failed: {reason}")]
pub struct TagReadFailure {
    pub address: TagAddress,
    pub reason: String,
}

impl TagReadFailure {
    pub fn new(address: TagAddress, reason: impl Into<String>) -> Self {
        Self {
            address,
            reason: reason.into(),
        }
    }
}

/// Raw result for one address of a batched read
#[derive(Debug, Clone, PartialEq)]
pub struct TagRead {
    pub address: TagAddress,
    pub outcome: Result<TagValue, TagReadFailure>,
}

impl TagRead {
    /// Successful read
    pub fn ok(address: TagAddress, value: impl Into<TagValue>) -> Self {
        Self {
            address,
            outcome: Ok(value.into()),
        }
    }

    /// Failed read
    pub fn failed(address: TagAddress, reason: impl Into<String>) -> Self {
        let failure = TagReadFailure::new(address.clone(), reason);
        Self {
            address,
            outcome: Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality_is_literal() {
        assert_eq!(TagValue::Float(1.0), TagValue::Float(1.0));
        assert_ne!(TagValue::Float(1.0), TagValue::Float(1.000_000_1));
        assert_ne!(TagValue::Int(1), TagValue::Float(1.0));
        assert_ne!(TagValue::Float(f64::NAN), TagValue::Float(f64::NAN));
    }

    #[test]
    fn test_untagged_json() {
        let values: Vec<TagValue> = serde_json::from_str(r#"[true, 7, 2.5, "run"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                TagValue::Bool(true),
                TagValue::Int(7),
                TagValue::Float(2.5),
                TagValue::Text("run".into()),
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TagValue::Bool(false).to_string(), "false");
        assert_eq!(TagValue::Int(-3).to_string(), "-3");
        assert_eq!(TagValue::Float(1.5).to_string(), "1.5");
        assert_eq!(TagValue::Text("idle".into()).to_string(), "idle");
    }

    #[test]
    fn test_tag_read_failed() {
        let read = TagRead::failed("X".into(), "path destination unknown");
        let err = read.outcome.unwrap_err();
        assert!(err.to_string().contains("'X'"));
    }
}
