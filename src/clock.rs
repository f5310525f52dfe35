use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Env var pinning "now" to an RFC 3339 instant, e.g. `2024-04-01T09:00:00Z`.
pub const FIXED_NOW_ENV: &str = "PASSPORT_FIXED_NOW";

/// Source of "now" for result timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// `PASSPORT_FIXED_NOW` when set and valid, otherwise the system clock.
    pub fn from_env() -> Self {
        let Ok(raw) = std::env::var(FIXED_NOW_ENV) else {
            return Self::System;
        };
        match Self::parse_fixed(&raw) {
            Some(clock) => {
                info!(target: "passport_trainer", at = %clock.now(), "Fixed clock");
                clock
            }
            None => {
                warn!(target: "passport_trainer", value = %raw, "Ignoring invalid PASSPORT_FIXED_NOW");
                Self::System
            }
        }
    }

    fn parse_fixed(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| Self::fixed(t.with_timezone(&Utc)))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
#[cfg(test)]
pub(crate) fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("fixed timestamp should be valid")
}
