//! Availability and conflict engine.
//!
//! Pure functions over a stylist's working window and the existing booking
//! intervals for a date. All intervals are half-open `[start, end)`: a
//! booking ending at 10:00 does not collide with one starting at 10:00.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;

/// Slot granularity in minutes.
pub const SLOT_STEP_MIN: i64 = 15;

/// Duration used when the availability query names no service.
pub const DEFAULT_DURATION_MIN: i64 = 30;

/// A candidate booking start time, tagged free or busy for the requested
/// duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub free: bool,
}

/// A booked interval, as the engine sees it. Handlers build these from
/// booking rows; tests build them directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Strict half-open overlap test.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// True iff `[start, end)` collides with none of `existing`.
///
/// This is the gate a booking must pass before it is persisted; the store
/// re-evaluates it under the stylist's lock at commit time.
pub fn is_free(start: NaiveDateTime, end: NaiveDateTime, existing: &[Interval]) -> bool {
    !existing.iter().any(|b| overlaps(start, end, b.start, b.end))
}

/// Scan a stylist's working window `[start_hour, end_hour)` on `date` in
/// `SLOT_STEP_MIN` steps and tag each start where the full `duration_min`
/// still fits before close.
///
/// An inverted window (`start_hour >= end_hour`) yields no slots. The daily
/// booking count is small, so the O(slots × bookings) scan is fine.
pub fn compute_slots(
    date: NaiveDate,
    start_hour: u32,
    end_hour: u32,
    duration_min: i64,
    existing: &[Interval],
) -> Vec<Slot> {
    let (Some(open), Some(close)) = (
        NaiveTime::from_hms_opt(start_hour, 0, 0),
        hour_boundary(end_hour),
    ) else {
        return Vec::new();
    };

    let duration = Duration::minutes(duration_min);
    let step = Duration::minutes(SLOT_STEP_MIN);
    let end_of_day = day_end(date, end_hour, close);

    let mut slots = Vec::new();
    let mut current = date.and_time(open);
    while current + duration <= end_of_day {
        slots.push(Slot {
            start: current,
            free: is_free(current, current + duration, existing),
        });
        current += step;
    }
    slots
}

/// Membership of `date`'s weekday in a comma-separated `work_days` string
/// ("Mon,Tue,Wed"). Unknown tokens are ignored.
pub fn works_on(work_days: &str, date: NaiveDate) -> bool {
    let wanted = weekday_token(date.weekday());
    work_days
        .split(',')
        .any(|day| day.trim().eq_ignore_ascii_case(wanted))
}

fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// `NaiveTime` cannot express 24:00, so a window closing at 24 maps to
/// 00:00 of the next day in `day_end`.
fn hour_boundary(hour: u32) -> Option<NaiveTime> {
    if hour == 24 {
        NaiveTime::from_hms_opt(0, 0, 0)
    } else {
        NaiveTime::from_hms_opt(hour, 0, 0)
    }
}

fn day_end(date: NaiveDate, end_hour: u32, close: NaiveTime) -> NaiveDateTime {
    if end_hour == 24 {
        (date + Duration::days(1)).and_time(close)
    } else {
        date.and_time(close)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap() // a Monday
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn booking(sh: u32, sm: u32, eh: u32, em: u32) -> Interval {
        Interval {
            start: at(sh, sm),
            end: at(eh, em),
        }
    }

    // ── overlaps ──

    #[test]
    fn test_overlap_plain() {
        assert!(overlaps(at(10, 0), at(10, 30), at(10, 15), at(10, 45)));
    }

    #[test]
    fn test_overlap_contained() {
        assert!(overlaps(at(10, 0), at(12, 0), at(10, 30), at(11, 0)));
    }

    #[test]
    fn test_overlap_disjoint() {
        assert!(!overlaps(at(9, 0), at(9, 30), at(11, 0), at(11, 30)));
    }

    #[test]
    fn test_overlap_touching_end_is_free() {
        // Booking ends exactly when the candidate starts.
        assert!(!overlaps(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn test_overlap_touching_start_is_free() {
        // Candidate ends exactly when the booking starts.
        assert!(!overlaps(at(9, 30), at(10, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn test_overlap_symmetric() {
        let cases = [
            (at(10, 0), at(10, 30), at(10, 15), at(10, 45)),
            (at(9, 0), at(9, 30), at(11, 0), at(11, 30)),
            (at(10, 0), at(10, 30), at(10, 30), at(11, 0)),
        ];
        for (a1, a2, b1, b2) in cases {
            assert_eq!(overlaps(a1, a2, b1, b2), overlaps(b1, b2, a1, a2));
        }
    }

    // ── compute_slots ──

    #[test]
    fn test_slots_inverted_window_empty() {
        assert!(compute_slots(date(), 17, 9, 30, &[]).is_empty());
        assert!(compute_slots(date(), 9, 9, 30, &[]).is_empty());
    }

    #[test]
    fn test_slots_cover_window_with_fixed_step() {
        let slots = compute_slots(date(), 9, 17, 30, &[]);
        // 09:00 .. 16:30 inclusive, every 15 minutes.
        assert_eq!(slots.first().unwrap().start, at(9, 0));
        assert_eq!(slots.last().unwrap().start, at(16, 30));
        assert_eq!(slots.len(), 31);
        for pair in slots.windows(2) {
            assert_eq!(pair[1].start - pair[0].start, Duration::minutes(SLOT_STEP_MIN));
        }
        assert!(slots.iter().all(|s| s.free));
    }

    #[test]
    fn test_slots_full_duration_must_fit() {
        // Scenario D: 10–15 window, 90-minute service. Last valid start is
        // 13:30; 14:00 would run until 15:30.
        let slots = compute_slots(date(), 10, 15, 90, &[]);
        assert_eq!(slots.last().unwrap().start, at(13, 30));
        assert!(!slots.iter().any(|s| s.start == at(14, 0)));
    }

    #[test]
    fn test_slots_around_existing_booking() {
        // Scenario A: 9–17 window, booking 10:00–10:30, 30-minute service.
        let existing = [booking(10, 0, 10, 30)];
        let slots = compute_slots(date(), 9, 17, 30, &existing);
        let free_at = |h, m| slots.iter().find(|s| s.start == at(h, m)).unwrap().free;

        assert!(free_at(9, 30)); // ends 10:00, touches only
        assert!(!free_at(9, 45)); // would run until 10:15
        assert!(!free_at(10, 0)); // exactly the booking
        assert!(!free_at(10, 15)); // overlaps the tail
        assert!(free_at(10, 30)); // starts as the booking ends
    }

    #[test]
    fn test_slots_duration_longer_than_window() {
        assert!(compute_slots(date(), 9, 10, 90, &[]).is_empty());
    }

    #[test]
    fn test_slots_window_to_midnight() {
        let slots = compute_slots(date(), 22, 24, 30, &[]);
        assert_eq!(slots.first().unwrap().start, at(22, 0));
        assert_eq!(slots.last().unwrap().start, at(23, 30));
    }

    #[test]
    fn test_slots_idempotent() {
        let existing = [booking(11, 0, 12, 30)];
        let a = compute_slots(date(), 9, 17, 45, &existing);
        let b = compute_slots(date(), 9, 17, 45, &existing);
        assert_eq!(a, b);
    }

    // ── is_free ──

    #[test]
    fn test_is_free_conflict_detected() {
        // Scenario B: request 10:00+30 against an existing 10:15–10:45.
        let existing = [booking(10, 15, 10, 45)];
        assert!(!is_free(at(10, 0), at(10, 30), &existing));
    }

    #[test]
    fn test_is_free_no_bookings() {
        assert!(is_free(at(10, 0), at(10, 30), &[]));
    }

    #[test]
    fn test_is_free_back_to_back() {
        let existing = [booking(10, 0, 10, 30), booking(11, 0, 11, 30)];
        assert!(is_free(at(10, 30), at(11, 0), &existing));
    }

    // ── works_on ──

    #[test]
    fn test_works_on_monday() {
        assert!(works_on("Mon,Tue,Wed,Thu,Fri", date()));
    }

    #[test]
    fn test_works_on_day_off() {
        // 2026-03-07 is a Saturday.
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert!(!works_on("Mon,Tue,Wed,Thu,Fri", saturday));
        assert!(works_on("Sat", saturday));
    }

    #[test]
    fn test_works_on_ignores_case_and_spaces() {
        assert!(works_on("mon, tue", date()));
    }

    #[test]
    fn test_works_on_empty() {
        assert!(!works_on("", date()));
    }
}
