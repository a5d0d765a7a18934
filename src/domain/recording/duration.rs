//! Duration value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Default encoder time slice (1 second)
pub const DEFAULT_TIMESLICE_MS: u64 = 1_000;

/// Default time to wait for the encoder's final chunk (5 seconds)
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 5_000;

/// Default recording cap for the CLI (30 minutes)
pub const DEFAULT_MAX_DURATION_MS: u64 = 30 * 60 * 1_000;

/// Value object representing a time duration.
/// Immutable and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration {
    milliseconds: u64,
}

impl Duration {
    /// Create a Duration from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { milliseconds: ms }
    }

    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            milliseconds: secs * 1000,
        }
    }

    pub const fn default_timeslice() -> Self {
        Self::from_millis(DEFAULT_TIMESLICE_MS)
    }

    pub const fn default_flush_timeout() -> Self {
        Self::from_millis(DEFAULT_FLUSH_TIMEOUT_MS)
    }

    pub const fn default_max_duration() -> Self {
        Self::from_millis(DEFAULT_MAX_DURATION_MS)
    }

    /// Get duration in whole seconds
    pub const fn as_secs(&self) -> u64 {
        self.milliseconds / 1000
    }

    /// Get duration in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.milliseconds
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_millis(self.milliseconds)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse strings such as "500ms", "30s", "1m", "2m30s".
    /// Units must appear largest first and at most once each.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();
        if input.is_empty() {
            return Err(invalid());
        }

        let mut total_ms: u64 = 0;
        // Rank of the last unit seen: m = 3, s = 2, ms = 1
        let mut last_rank = u8::MAX;
        let mut rest = input.as_str();

        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            let (rank, factor, unit_len) = if rest.starts_with("ms") {
                (1, 1, 2)
            } else if rest.starts_with('s') {
                (2, 1_000, 1)
            } else if rest.starts_with('m') {
                (3, 60_000, 1)
            } else {
                return Err(invalid());
            };
            if rank >= last_rank {
                return Err(invalid());
            }
            last_rank = rank;
            rest = &rest[unit_len..];

            total_ms = value
                .checked_mul(factor)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(invalid)?;
        }

        if total_ms == 0 {
            return Err(invalid());
        }

        Ok(Self {
            milliseconds: total_ms,
        })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.milliseconds % 1000;
        let total_secs = self.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if millis != 0 {
            return write!(f, "{}ms", self.milliseconds);
        }
        if minutes == 0 {
            write!(f, "{}s", seconds)
        } else if seconds == 0 {
            write!(f, "{}m", minutes)
        } else {
            write!(f, "{}m{}s", minutes, seconds)
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::default_timeslice()
    }
}
