//! Calendar and time window models.
//!
//! A calendar combines open windows (shifts, opening hours) with blocked
//! periods (leave days, maintenance). Blocked periods win.
//!
//! # Time Model
//! All times are in milliseconds relative to a scheduling epoch.
//! A calendar without open windows is open at all times, minus its
//! blocked periods.

use serde::{Deserialize, Serialize};

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Interval start (ms, inclusive).
    pub start_ms: i64,
    /// Interval end (ms, exclusive).
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// The window covering the whole time axis.
    pub fn unbounded() -> Self {
        Self::new(i64::MIN, i64::MAX)
    }

    /// Duration of this window (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end_ms <= self.start_ms
    }

    /// Whether a timestamp falls within this window.
    #[inline]
    pub fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }

    /// Whether `[start, end)` lies entirely inside this window.
    #[inline]
    pub fn covers(&self, start_ms: i64, end_ms: i64) -> bool {
        start_ms >= self.start_ms && end_ms <= self.end_ms
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }
}

/// Resource availability calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Calendar identifier.
    pub id: String,
    /// Periods when the resource is open. Empty = always open.
    pub time_windows: Vec<TimeWindow>,
    /// Periods when the resource is closed (overrides `time_windows`).
    pub blocked_periods: Vec<TimeWindow>,
}

impl Calendar {
    /// Creates an empty calendar (always open).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time_windows: Vec::new(),
            blocked_periods: Vec::new(),
        }
    }

    /// Creates a calendar that is always open.
    pub fn always_available(id: impl Into<String>) -> Self {
        Self::new(id)
    }

    /// Adds an open window.
    pub fn with_window(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.time_windows.push(TimeWindow::new(start_ms, end_ms));
        self
    }

    /// Adds a blocked period.
    pub fn with_blocked(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.blocked_periods.push(TimeWindow::new(start_ms, end_ms));
        self
    }

    /// Normalized availability: sorted, merged, disjoint windows with every
    /// blocked period cut out.
    pub fn free_windows(&self) -> Vec<TimeWindow> {
        let open = if self.time_windows.is_empty() {
            vec![TimeWindow::unbounded()]
        } else {
            merge(self.time_windows.clone())
        };
        let blocked = merge(self.blocked_periods.clone());

        let mut free = Vec::with_capacity(open.len());
        for window in open {
            let mut cursor = window.start_ms;
            for b in blocked.iter().filter(|b| b.overlaps(&window)) {
                if b.start_ms > cursor {
                    free.push(TimeWindow::new(cursor, b.start_ms));
                }
                cursor = cursor.max(b.end_ms);
            }
            if cursor < window.end_ms {
                free.push(TimeWindow::new(cursor, window.end_ms));
            }
        }
        free
    }

    /// Whether a timestamp is within working time.
    pub fn is_working_time(&self, time_ms: i64) -> bool {
        if self.blocked_periods.iter().any(|w| w.contains(time_ms)) {
            return false;
        }
        self.time_windows.is_empty() || self.time_windows.iter().any(|w| w.contains(time_ms))
    }

    /// Whether `[start, end)` fits inside a single free window.
    pub fn covers(&self, start_ms: i64, end_ms: i64) -> bool {
        self.free_windows()
            .iter()
            .any(|w| w.covers(start_ms, end_ms))
    }

    /// Earliest start at or after `from_ms` where `duration_ms` fits
    /// without interruption.
    pub fn earliest_fit(&self, from_ms: i64, duration_ms: i64) -> Option<i64> {
        earliest_fit_in(&self.free_windows(), from_ms, duration_ms)
    }

    /// Total free time within a range [start, end).
    pub fn available_time_in_range(&self, start_ms: i64, end_ms: i64) -> i64 {
        let range = TimeWindow::new(start_ms, end_ms);
        if range.is_empty() {
            return 0;
        }
        self.free_windows()
            .iter()
            .map(|w| {
                let s = w.start_ms.max(range.start_ms);
                let e = w.end_ms.min(range.end_ms);
                (e - s).max(0)
            })
            .sum()
    }
}

/// Earliest start at or after `from_ms` inside sorted disjoint `windows`.
pub(crate) fn earliest_fit_in(windows: &[TimeWindow], from_ms: i64, duration_ms: i64) -> Option<i64> {
    windows.iter().find_map(|w| {
        let start = w.start_ms.max(from_ms);
        (start.saturating_add(duration_ms) <= w.end_ms).then_some(start)
    })
}

/// Sorts and merges overlapping or touching windows, dropping empty ones.
fn merge(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.retain(|w| !w.is_empty());
    windows.sort();
    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for w in windows {
        match merged.last_mut() {
            Some(last) if w.start_ms <= last.end_ms => last.end_ms = last.end_ms.max(w.end_ms),
            _ => merged.push(w),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window() {
        let w = TimeWindow::new(100, 200);
        assert_eq!(w.duration_ms(), 100);
        assert!(w.contains(100));
        assert!(!w.contains(200)); // exclusive end
        assert!(w.covers(100, 200));
        assert!(!w.covers(150, 201));
    }

    #[test]
    fn test_time_window_overlap() {
        let a = TimeWindow::new(0, 100);
        assert!(a.overlaps(&TimeWindow::new(50, 150)));
        assert!(!a.overlaps(&TimeWindow::new(100, 200))); // touching
    }

    #[test]
    fn test_free_windows_merge_and_cut() {
        let cal = Calendar::new("shifts")
            .with_window(16_000, 24_000)
            .with_window(0, 8_000)
            .with_window(6_000, 10_000)
            .with_blocked(2_000, 3_000)
            .with_blocked(20_000, 30_000);

        assert_eq!(
            cal.free_windows(),
            vec![
                TimeWindow::new(0, 2_000),
                TimeWindow::new(3_000, 10_000),
                TimeWindow::new(16_000, 20_000),
            ]
        );
    }

    #[test]
    fn test_always_available_with_leave() {
        let cal = Calendar::always_available("cal").with_blocked(50_000, 60_000);
        let free = cal.free_windows();
        assert_eq!(free.len(), 2);
        assert_eq!(free[0].end_ms, 50_000);
        assert_eq!(free[1].start_ms, 60_000);
        assert!(cal.is_working_time(40_000));
        assert!(!cal.is_working_time(55_000));
    }

    #[test]
    fn test_earliest_fit_skips_short_gaps() {
        let cal = Calendar::new("cal")
            .with_window(0, 1_000)
            .with_window(2_000, 5_000);

        assert_eq!(cal.earliest_fit(0, 500), Some(0));
        assert_eq!(cal.earliest_fit(800, 500), Some(2_000));
        assert_eq!(cal.earliest_fit(0, 4_000), None);
    }

    #[test]
    fn test_covers() {
        let cal = Calendar::new("cal")
            .with_window(0, 10_000)
            .with_blocked(4_000, 5_000);
        assert!(cal.covers(0, 4_000));
        assert!(!cal.covers(3_000, 6_000));
        assert!(cal.covers(5_000, 10_000));
    }

    #[test]
    fn test_available_time_in_range() {
        let cal = Calendar::new("cal")
            .with_window(0, 100_000)
            .with_blocked(40_000, 60_000);

        assert_eq!(cal.available_time_in_range(0, 100_000), 80_000);
        assert_eq!(cal.available_time_in_range(50_000, 70_000), 10_000);
        assert_eq!(cal.available_time_in_range(10, 10), 0);
    }
}
