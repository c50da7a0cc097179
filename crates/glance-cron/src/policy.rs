//! The two scheduling states and their cadences.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Hourly at minute 0: gives the candidate queue time to refill.
pub const NORMAL_CADENCE: &str = "0 * * * *";
/// Every 12 hours at minute 5: the rate-limit cooldown plus a margin.
pub const RATE_LIMITED_CADENCE: &str = "5 */12 * * *";

/// Which cadence the next run follows, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicy {
    Normal,
    RateLimited,
}

impl SchedulePolicy {
    /// `RateLimited` if the limit was hit at least once during this run.
    pub fn from_rate_limited(rate_limited: bool) -> Self {
        if rate_limited {
            Self::RateLimited
        } else {
            Self::Normal
        }
    }

    pub fn cadence(self) -> &'static str {
        match self {
            Self::Normal => NORMAL_CADENCE,
            Self::RateLimited => RATE_LIMITED_CADENCE,
        }
    }

    /// Nominal wait before the next run.
    pub fn wait(self) -> Duration {
        match self {
            Self::Normal => Duration::from_secs(60 * 60),
            Self::RateLimited => Duration::from_secs(12 * 60 * 60 + 5 * 60),
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::RateLimited => f.write_str("rate_limited"),
        }
    }
}

/// Cadence expression per policy. Defaults to the built-in cadences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadences {
    pub normal: String,
    pub rate_limited: String,
}

impl Cadences {
    pub fn for_policy(&self, policy: SchedulePolicy) -> &str {
        match policy {
            SchedulePolicy::Normal => &self.normal,
            SchedulePolicy::RateLimited => &self.rate_limited,
        }
    }
}

impl Default for Cadences {
    fn default() -> Self {
        Self {
            normal: NORMAL_CADENCE.to_string(),
            rate_limited: RATE_LIMITED_CADENCE.to_string(),
        }
    }
}
