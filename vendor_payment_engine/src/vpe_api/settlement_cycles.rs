use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::MinorUnits;

pub const DEFAULT_CYCLE_BOUNDARIES: [(u32, u32); 6] = [(10, 30), (12, 30), (14, 30), (16, 30), (18, 30), (20, 30)];
/// India Standard Time
pub const DEFAULT_UTC_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;
/// ₹100
pub const DEFAULT_MIN_INSTANT_PAYOUT: i64 = 10_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementConfigError {
    #[error("At least one settlement cycle boundary is required")]
    NoBoundaries,
    #[error("Invalid cycle boundary '{0}'. Use HH:MM")]
    InvalidBoundary(String),
    #[error("Invalid UTC offset '{0}'. Use +HH:MM or -HH:MM")]
    InvalidOffset(String),
}

/// Daily instant-payout windows, in one reference timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    boundaries: Vec<NaiveTime>,
    utc_offset: FixedOffset,
    min_instant: MinorUnits,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        let boundaries =
            DEFAULT_CYCLE_BOUNDARIES.iter().filter_map(|(h, m)| NaiveTime::from_hms_opt(*h, *m, 0)).collect();
        let utc_offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).unwrap_or(Utc.fix());
        Self { boundaries, utc_offset, min_instant: MinorUnits::from(DEFAULT_MIN_INSTANT_PAYOUT) }
    }
}

impl SettlementConfig {
    pub fn new(
        mut boundaries: Vec<NaiveTime>,
        utc_offset: FixedOffset,
        min_instant: MinorUnits,
    ) -> Result<Self, SettlementConfigError> {
        if boundaries.is_empty() {
            return Err(SettlementConfigError::NoBoundaries);
        }
        boundaries.sort();
        boundaries.dedup();
        Ok(Self { boundaries, utc_offset, min_instant })
    }

    /// Parses a comma-separated list of `HH:MM` boundaries, e.g. `"10:30,12:30,14:30"`.
    pub fn parse_boundaries(s: &str) -> Result<Vec<NaiveTime>, SettlementConfigError> {
        let boundaries = s
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| {
                NaiveTime::parse_from_str(b, "%H:%M").map_err(|_| SettlementConfigError::InvalidBoundary(b.into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if boundaries.is_empty() {
            return Err(SettlementConfigError::NoBoundaries);
        }
        Ok(boundaries)
    }

    /// Parses `+05:30`, `-03:00` or `+0530`.
    pub fn parse_offset(s: &str) -> Result<FixedOffset, SettlementConfigError> {
        let err = || SettlementConfigError::InvalidOffset(s.to_string());
        let s = s.trim();
        let (sign, rest) = if let Some(rest) = s.strip_prefix('+') {
            (1, rest)
        } else if let Some(rest) = s.strip_prefix('-') {
            (-1, rest)
        } else {
            return Err(err());
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let hours = digits[..2].parse::<i32>().map_err(|_| err())?;
        let minutes = digits[2..].parse::<i32>().map_err(|_| err())?;
        if minutes >= 60 {
            return Err(err());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
    }

    pub fn boundaries(&self) -> &[NaiveTime] {
        &self.boundaries
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn min_instant(&self) -> MinorUnits {
        self.min_instant
    }

    /// Whether instant payouts are open at `now`, and when the next cycle boundary is.
    ///
    /// The window is open from the first boundary of the day up to and including the last one. The next boundary is
    /// the earliest one at or after `now`, rolling over to tomorrow's first boundary after the last one has passed.
    pub fn cycle_state(&self, now: DateTime<Utc>) -> CycleState {
        let local = now.with_timezone(&self.utc_offset);
        let today = local.date_naive();
        let time = local.time();
        let (Some(first), Some(last)) = (self.boundaries.first(), self.boundaries.last()) else {
            return CycleState { enabled: false, next_cycle_at: now, next_cycle_label: String::default() };
        };
        let enabled = *first <= time && time <= *last;
        let (day, boundary, label) = match self.boundaries.iter().find(|b| **b >= time) {
            Some(b) => (today, *b, "Today"),
            None => (today + Duration::days(1), *first, "Tomorrow"),
        };
        CycleState {
            enabled,
            next_cycle_at: self.to_utc(day, boundary),
            next_cycle_label: format!("{label} {}", boundary.format("%H:%M")),
        }
    }

    fn to_utc(&self, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let offset = Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        Utc.from_utc_datetime(&(day.and_time(time) - offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub enabled: bool,
    pub next_cycle_at: DateTime<Utc>,
    /// Human-readable, e.g. "Today 14:30" or "Tomorrow 10:30"
    pub next_cycle_label: String,
}
