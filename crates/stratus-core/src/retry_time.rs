//! Retry-time ceilings
//!
//! A [`RetryTime`] is a validated, non-negative duration in milliseconds. Values
//! arrive from typed callers and from loosely typed configuration alike, so it
//! converts from integers, floats, strings, `Duration` and JSON values.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::error::StorageError;

/// Which retry ceiling applies to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCategory {
    Operation,
    Upload,
    Download,
}

impl Display for RetryCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RetryCategory::Operation => write!(f, "operation"),
            RetryCategory::Upload => write!(f, "upload"),
            RetryCategory::Download => write!(f, "download"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RetryTime(u64);

impl RetryTime {
    pub const ZERO: RetryTime = RetryTime(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Display for RetryTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}ms", self.0)
    }
}

fn not_a_number() -> StorageError {
    StorageError::InvalidArgument("'time' must be a number value".to_string())
}

fn negative() -> StorageError {
    StorageError::InvalidArgument("'time' must be a non-negative number value".to_string())
}

impl TryFrom<f64> for RetryTime {
    type Error = StorageError;

    fn try_from(ms: f64) -> Result<Self, Self::Error> {
        if !ms.is_finite() {
            return Err(not_a_number());
        }
        if ms < 0.0 {
            return Err(negative());
        }
        // saturating float-to-int cast
        Ok(Self(ms.trunc() as u64))
    }
}

impl TryFrom<u64> for RetryTime {
    type Error = StorageError;

    fn try_from(ms: u64) -> Result<Self, Self::Error> {
        Ok(Self(ms))
    }
}

impl TryFrom<u32> for RetryTime {
    type Error = StorageError;

    fn try_from(ms: u32) -> Result<Self, Self::Error> {
        Ok(Self(u64::from(ms)))
    }
}

impl TryFrom<i64> for RetryTime {
    type Error = StorageError;

    fn try_from(ms: i64) -> Result<Self, Self::Error> {
        u64::try_from(ms).map(Self).map_err(|_| negative())
    }
}

impl TryFrom<i32> for RetryTime {
    type Error = StorageError;

    fn try_from(ms: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(ms))
    }
}

impl TryFrom<Duration> for RetryTime {
    type Error = StorageError;

    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        Ok(Self(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)))
    }
}

// Strings are never numbers here, even numeric ones, matching JSON strings.
impl<'a> TryFrom<&'a str> for RetryTime {
    type Error = StorageError;

    fn try_from(_value: &'a str) -> Result<Self, Self::Error> {
        Err(not_a_number())
    }
}

impl TryFrom<String> for RetryTime {
    type Error = StorageError;

    fn try_from(_value: String) -> Result<Self, Self::Error> {
        Err(not_a_number())
    }
}

impl<'a> TryFrom<&'a serde_json::Value> for RetryTime {
    type Error = StorageError;

    fn try_from(value: &'a serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(number) => {
                if let Some(ms) = number.as_u64() {
                    Ok(Self(ms))
                } else {
                    number
                        .as_f64()
                        .ok_or_else(not_a_number)
                        .and_then(Self::try_from)
                }
            }
            _ => Err(not_a_number()),
        }
    }
}

impl TryFrom<serde_json::Value> for RetryTime {
    type Error = StorageError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}
