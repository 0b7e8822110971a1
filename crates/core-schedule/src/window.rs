//! Active-hours window
//!
//! Hours are compared against a half-open range `[start_hour, end_hour)`.
//! There is no wraparound: a window such as `22-6` never matches. Overnight
//! schedules have to be expressed as the inverse window with
//! `inactive_still_active` instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Half-open hour range on a 24-hour clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    /// First active hour (inclusive)
    pub start_hour: u32,

    /// First inactive hour after the window (exclusive)
    pub end_hour: u32,
}

/// Failure to read an `"start-end"` window string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowParseError {
    #[error("active hours must look like \"start-end\", got {0:?}")]
    Malformed(String),

    #[error("invalid hour {0:?} in active hours")]
    InvalidHour(String),
}

impl ActiveWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Whether `hour` falls inside `[start_hour, end_hour)`
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }

    /// A window that wraps midnight can never match
    pub fn is_wrapping(&self) -> bool {
        self.start_hour > self.end_hour
    }
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self::new(6, 23)
    }
}

impl FromStr for ActiveWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| WindowParseError::Malformed(s.to_string()))?;

        let parse_hour = |raw: &str| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| WindowParseError::InvalidHour(raw.trim().to_string()))
        };

        Ok(Self::new(parse_hour(start)?, parse_hour(end)?))
    }
}

impl fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_hour, self.end_hour)
    }
}
