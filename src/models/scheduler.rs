//! SM-5 (SuperMemo 5) spaced repetition scheduler.
//!
//! Unlike SM-2, intervals grow by learned optimal factors stored in a
//! [`DifficultyMatrix`] instead of by the easiness factor alone:
//! - The easiness factor (EF) is adjusted after every review and never drops below 1.3
//! - The optimal factor at the current (repetitions, EF) is blended toward the
//!   factor implied by the quality grade and stored in the returned matrix
//! - Quality grades 0-2: the item is forgotten, interval resets to -1 and repetitions to 1
//! - Quality grades 3-5: interval is the product of optimal factors up to the repetition count

use super::DifficultyMatrix;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;
pub const MIN_EASINESS_FACTOR: f64 = 1.3;
pub const MAX_QUALITY: u8 = 5;

/// Interval sentinel for "never scheduled" and for forgotten items.
pub const UNSCHEDULED_INTERVAL: f64 = -1.0;

/// Upper bound on repetition counts read from storage.
pub const MAX_REPETITIONS: u32 = 10_000;

/// Weight of the newly observed optimal factor when blending.
const LEARNING_FRACTION: f64 = 0.5;

/// Result of one scheduling step.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleOutcome {
    pub next_interval: f64,
    pub next_repetitions: u32,
    pub next_easiness_factor: f64,
    pub next_matrix: DifficultyMatrix,
}

impl ScheduleOutcome {
    /// Interval clamped to zero and the timestamp it lands on.
    ///
    /// Timestamps past the end of year 9999 are capped there, since later
    /// dates cannot be stored as RFC 3339 text.
    pub fn next_schedule(&self, now: DateTime<Utc>) -> (f64, DateTime<Utc>) {
        let days = self.next_interval.max(0.0);
        let latest = latest_schedule();
        let millis = (days * 86_400_000.0).round() as i64;
        let at = Duration::try_milliseconds(millis)
            .and_then(|delta| now.checked_add_signed(delta))
            .map_or(latest, |at| at.min(latest));
        (days, at)
    }

    pub fn is_forgotten(&self) -> bool {
        self.next_interval < 0.0
    }
}

/// Latest representable next-review time: 9999-12-31T23:59:59Z.
pub fn latest_schedule() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Rounds to two decimals, halves rounding up.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Optimal factor for `(n, ef)`: the stored entry, else 4 for the first
/// repetition and the easiness factor itself afterwards.
pub fn optimal_factor(n: u32, easiness_factor: f64, matrix: &DifficultyMatrix) -> f64 {
    match matrix.get(n, easiness_factor) {
        Some(factor) => factor,
        None if n <= 1 => 4.0,
        None => easiness_factor,
    }
}

/// Interval in days after `n` repetitions: `of(n) * of(n-1) * ... * of(1)`.
pub fn interval(n: u32, easiness_factor: f64, matrix: &DifficultyMatrix) -> f64 {
    let mut days = optimal_factor(1, easiness_factor, matrix);
    for k in 2..=n {
        if days.is_infinite() {
            break;
        }
        days = optimal_factor(k, easiness_factor, matrix) * days;
    }
    days
}

fn next_easiness_factor(easiness_factor: f64, quality: u8) -> f64 {
    let miss = f64::from(MAX_QUALITY - quality);
    (easiness_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS_FACTOR)
}

/// Computes the next interval, repetition count, easiness factor and matrix.
///
/// `quality` must be within `0..=5`; anything else is rejected before any
/// computation. A missing easiness factor defaults to 2.5 and a missing or
/// non-positive last interval is treated as 1 day.
pub fn compute_next(
    last_interval: Option<f64>,
    repetitions: u32,
    easiness_factor: Option<f64>,
    quality: u8,
    matrix: &DifficultyMatrix,
) -> Result<ScheduleOutcome> {
    if quality > MAX_QUALITY {
        return Err(Error::InvalidArgument(format!(
            "quality must be between 0 and {}, got {}",
            MAX_QUALITY, quality
        )));
    }

    let last_interval = match last_interval {
        Some(days) if days > 0.0 => days,
        _ => 1.0,
    };
    let easiness_factor = easiness_factor.unwrap_or(DEFAULT_EASINESS_FACTOR);
    let next_ef = next_easiness_factor(easiness_factor, quality);

    let of = optimal_factor(repetitions, easiness_factor, matrix);
    let of_adjusted = of * (0.72 + f64::from(quality) * 0.07);
    let of_blended = (1.0 - LEARNING_FRACTION) * of + LEARNING_FRACTION * of_adjusted;
    let next_matrix = matrix.with_entry(repetitions, easiness_factor, round2(of_blended));

    let raw_interval = interval(repetitions, next_ef, &next_matrix);

    debug!(
        last_interval,
        repetitions,
        easiness_factor,
        quality,
        raw_interval,
        "Computed SM-5 schedule"
    );

    if quality < 3 {
        return Ok(ScheduleOutcome {
            next_interval: UNSCHEDULED_INTERVAL,
            next_repetitions: 1,
            next_easiness_factor: next_ef,
            next_matrix,
        });
    }

    Ok(ScheduleOutcome {
        next_interval: round2(raw_interval),
        next_repetitions: repetitions.saturating_add(1),
        next_easiness_factor: round2(next_ef),
        next_matrix,
    })
}
