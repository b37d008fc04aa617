//! Weekly operating windows of points of interest
//!
//! Answers "can this point be visited from `start` to `end` on this weekday".
//! A visit must fit inside one contiguous open window: arriving during a
//! lunch gap is "closed" even if the point reopens later that day.

use std::collections::BTreeMap;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

use crate::services::settings::MissingWindowPolicy;
use crate::types::{OperatingWindowRow, PointId};

/// Open interval `[start, end)` within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl OpenWindow {
    pub fn contains(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start <= start && end <= self.end
    }
}

/// Stored state of one point on one weekday
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySchedule {
    AlwaysOpen,
    Closed,
    /// Sorted by start, never empty
    Windows(Vec<OpenWindow>),
    /// No rows at all for this weekday
    Unspecified,
}

#[derive(Debug, Clone)]
pub struct OperatingWindowCatalog {
    days: BTreeMap<(PointId, u8), DaySchedule>,
    missing: MissingWindowPolicy,
}

impl OperatingWindowCatalog {
    pub fn new(missing: MissingWindowPolicy) -> Self {
        Self {
            days: BTreeMap::new(),
            missing,
        }
    }

    /// Build the catalog from stored rows.
    ///
    /// Per point and weekday: any always-open row wins, then any closed row;
    /// otherwise the non-empty windows are kept. Rows whose windows are all
    /// zero-length (or lack times) make the day closed.
    pub fn from_rows(rows: &[OperatingWindowRow], missing: MissingWindowPolicy) -> Self {
        let mut grouped: BTreeMap<(PointId, u8), Vec<&OperatingWindowRow>> = BTreeMap::new();
        for row in rows {
            if !(0..=6).contains(&row.weekday) {
                warn!(
                    "Ignoring operating window for point {} with weekday {}",
                    row.point_id, row.weekday
                );
                continue;
            }
            grouped
                .entry((row.point_id, row.weekday as u8))
                .or_default()
                .push(row);
        }

        let mut catalog = Self::new(missing);
        for (key, day_rows) in grouped {
            catalog.days.insert(key, resolve_rows(&day_rows));
        }
        catalog
    }

    /// Stored schedule; `Unspecified` when the point has no rows that day
    pub fn day_schedule(&self, point_id: PointId, weekday: Weekday) -> &DaySchedule {
        self.days
            .get(&(point_id, weekday_index(weekday)))
            .unwrap_or(&DaySchedule::Unspecified)
    }

    pub fn is_always_open(&self, point_id: PointId, weekday: Weekday) -> bool {
        match self.day_schedule(point_id, weekday) {
            DaySchedule::AlwaysOpen => true,
            DaySchedule::Unspecified => self.missing == MissingWindowPolicy::AlwaysOpen,
            _ => false,
        }
    }

    /// Whether `[start, end)` on `weekday` sits inside one open window.
    /// An interval with `end <= start` runs past midnight and is only
    /// visitable at an always-open point.
    pub fn is_open(&self, point_id: PointId, weekday: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        if self.is_always_open(point_id, weekday) {
            return true;
        }
        if end <= start {
            return false;
        }
        match self.day_schedule(point_id, weekday) {
            DaySchedule::Windows(windows) => windows.iter().any(|w| w.contains(start, end)),
            _ => false,
        }
    }
}

fn resolve_rows(rows: &[&OperatingWindowRow]) -> DaySchedule {
    if rows.iter().any(|r| r.is_always_open) {
        return DaySchedule::AlwaysOpen;
    }
    if rows.iter().any(|r| r.is_closed) {
        return DaySchedule::Closed;
    }

    let mut windows: Vec<OpenWindow> = rows
        .iter()
        .filter_map(|r| match (r.start_time, r.end_time) {
            (Some(start), Some(end)) if start < end => Some(OpenWindow { start, end }),
            _ => None,
        })
        .collect();

    if windows.is_empty() {
        return DaySchedule::Closed;
    }
    windows.sort_by_key(|w| (w.start, w.end));
    windows.dedup();
    DaySchedule::Windows(windows)
}

/// 0 = Monday .. 6 = Sunday, matching the stored `weekday` column
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}
