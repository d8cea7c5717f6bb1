//! Scheduling fields persisted on an item's backing node.
//!
//! The document store sees these as a flat string-keyed map. Key names are
//! part of the stored format and must not change between releases.

use super::scheduler::{
    DEFAULT_EASINESS_FACTOR, MAX_QUALITY, MAX_REPETITIONS, ScheduleOutcome, UNSCHEDULED_INTERVAL,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

pub const LAST_INTERVAL_KEY: &str = "card-last-interval";
pub const REPEATS_KEY: &str = "card-repeats";
pub const EASE_FACTOR_KEY: &str = "card-ease-factor";
pub const LAST_REVIEWED_KEY: &str = "card-last-reviewed";
pub const NEXT_SCHEDULE_KEY: &str = "card-next-schedule";
pub const LAST_SCORE_KEY: &str = "card-last-score";

/// Marks a node as a review item and selects its variant.
pub const CARD_TYPE_KEY: &str = "card-type";

pub const SCHEDULING_KEYS: [&str; 6] = [
    LAST_INTERVAL_KEY,
    REPEATS_KEY,
    EASE_FACTOR_KEY,
    LAST_REVIEWED_KEY,
    NEXT_SCHEDULE_KEY,
    LAST_SCORE_KEY,
];

pub type PropertyMap = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct ItemProperties {
    pub last_interval: f64,
    pub repetitions: u32,
    pub easiness_factor: f64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    pub last_score: Option<u8>,
}

impl Default for ItemProperties {
    fn default() -> Self {
        Self {
            last_interval: UNSCHEDULED_INTERVAL,
            repetitions: 0,
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            last_reviewed_at: None,
            next_scheduled_at: None,
            last_score: None,
        }
    }
}

fn read_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn read_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn write_timestamp(value: Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |dt| Value::String(dt.to_rfc3339()))
}

impl ItemProperties {
    /// The property set written by a reset.
    pub fn reset() -> Self {
        Self::default()
    }

    /// Extracts the scheduling fields, filling defaults for anything absent.
    ///
    /// Missing keys, JSON `null`, the legacy `"nil"` marker and unparsable
    /// values all read as absent.
    pub fn from_map(map: &PropertyMap) -> Self {
        let defaults = Self::default();
        Self {
            last_interval: read_number(map.get(LAST_INTERVAL_KEY))
                .unwrap_or(defaults.last_interval),
            repetitions: read_number(map.get(REPEATS_KEY))
                .filter(|n| *n >= 0.0)
                .map(|n| n.min(f64::from(MAX_REPETITIONS)) as u32)
                .unwrap_or(defaults.repetitions),
            easiness_factor: read_number(map.get(EASE_FACTOR_KEY))
                .unwrap_or(defaults.easiness_factor),
            last_reviewed_at: read_timestamp(map.get(LAST_REVIEWED_KEY)),
            next_scheduled_at: read_timestamp(map.get(NEXT_SCHEDULE_KEY)),
            last_score: read_number(map.get(LAST_SCORE_KEY))
                .filter(|n| (0.0..=f64::from(MAX_QUALITY)).contains(n))
                .map(|n| n as u8),
        }
    }

    /// All six scheduling keys, cleared fields as `null`.
    pub fn to_map(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        // JSON has no infinity; an overflowed interval is stored as the largest finite one
        let last_interval = if self.last_interval.is_finite() {
            self.last_interval
        } else {
            f64::MAX
        };
        map.insert(LAST_INTERVAL_KEY.to_string(), Value::from(last_interval));
        map.insert(REPEATS_KEY.to_string(), Value::from(self.repetitions));
        map.insert(EASE_FACTOR_KEY.to_string(), Value::from(self.easiness_factor));
        map.insert(
            LAST_REVIEWED_KEY.to_string(),
            write_timestamp(self.last_reviewed_at),
        );
        map.insert(
            NEXT_SCHEDULE_KEY.to_string(),
            write_timestamp(self.next_scheduled_at),
        );
        map.insert(
            LAST_SCORE_KEY.to_string(),
            self.last_score.map_or(Value::Null, Value::from),
        );
        map
    }

    /// Property set after scoring with `quality` at `now`.
    pub fn after_review(outcome: &ScheduleOutcome, quality: u8, now: DateTime<Utc>) -> Self {
        let (_, next_scheduled_at) = outcome.next_schedule(now);
        Self {
            last_interval: outcome.next_interval,
            repetitions: outcome.next_repetitions,
            easiness_factor: outcome.next_easiness_factor,
            last_reviewed_at: Some(now),
            next_scheduled_at: Some(next_scheduled_at),
            last_score: Some(quality),
        }
    }

    /// Whether the item is due at `now`. Never-scheduled items are always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_scheduled_at.is_none_or(|at| at <= now)
    }
}
