//! Performance scoring.
//!
//! `score = round(tasks_completed * 2 + attendance_rate * 100)` where the
//! attendance rate is the share of entries marked present (0 with no entries).
//! Rounding is half up; every term is non-negative so [`f64::round`] (half away
//! from zero) gives the same result.

use crate::types::{AttendanceEntry, AttendanceStatus};

const POINTS_PER_TASK: f64 = 2.0;
const FULL_ATTENDANCE_POINTS: f64 = 100.0;

/// Returns the fraction of entries marked present, or 0 when there are none.
pub fn attendance_rate(attendance: &[AttendanceEntry]) -> f64 {
    if attendance.is_empty() {
        return 0.0;
    }
    present_count(attendance) as f64 / attendance.len() as f64
}

/// Computes the performance score for the given counters.
pub fn compute_performance(tasks_completed: u32, attendance: &[AttendanceEntry]) -> i64 {
    let attendance_points = if attendance.is_empty() {
        0.0
    } else {
        // Multiply before dividing so rates like 1/8 land exactly on 12.5.
        present_count(attendance) as f64 * FULL_ATTENDANCE_POINTS / attendance.len() as f64
    };
    let raw = f64::from(tasks_completed) * POINTS_PER_TASK + attendance_points;
    raw.round() as i64
}

fn present_count(attendance: &[AttendanceEntry]) -> usize {
    attendance
        .iter()
        .filter(|entry| entry.status == AttendanceStatus::Present)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use crate::types::AttendanceStatus::{Absent, Leave, Present};

    fn entries(statuses: &[AttendanceStatus]) -> Vec<AttendanceEntry> {
        let base = DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        statuses
            .iter()
            .enumerate()
            .map(|(idx, status)| AttendanceEntry {
                date: base + Duration::days(idx as i64),
                status: *status,
            })
            .collect()
    }

    #[test]
    fn no_attendance_scores_tasks_only() {
        for tasks in [0, 1, 7, 50, 1_000] {
            assert_eq!(compute_performance(tasks, &[]), i64::from(tasks) * 2);
        }
        assert_eq!(attendance_rate(&[]), 0.0);
    }

    #[test]
    fn full_attendance_adds_one_hundred() {
        for days in [1, 3, 20] {
            let attendance = entries(&vec![Present; days]);
            for tasks in [0, 4, 33] {
                assert_eq!(
                    compute_performance(tasks, &attendance),
                    i64::from(tasks) * 2 + 100
                );
            }
        }
    }

    #[test]
    fn mixed_attendance_example() {
        let attendance = entries(&[Present, Present, Absent, Leave]);
        assert_eq!(attendance_rate(&attendance), 0.5);
        // Two of four entries are present: 5 * 2 + 50.
        assert_eq!(compute_performance(5, &attendance), 60);
    }

    #[test]
    fn quarter_attendance_example() {
        let attendance = entries(&[Present, Absent, Absent, Leave]);
        assert_eq!(attendance_rate(&attendance), 0.25);
        assert_eq!(compute_performance(5, &attendance), 35);
    }

    #[test]
    fn half_point_rounds_up() {
        // 1 of 8 present -> 12.5 attendance points.
        let mut statuses = vec![Absent; 7];
        statuses.insert(0, Present);
        let attendance = entries(&statuses);
        assert_eq!(compute_performance(0, &attendance), 13);
        assert_eq!(compute_performance(2, &attendance), 17);
    }

    #[test]
    fn below_half_rounds_down() {
        // 1 of 3 present -> 33.33 attendance points.
        let attendance = entries(&[Present, Absent, Leave]);
        assert_eq!(compute_performance(0, &attendance), 33);
        // 2 of 3 present -> 66.67 attendance points.
        let attendance = entries(&[Present, Present, Leave]);
        assert_eq!(compute_performance(0, &attendance), 67);
    }

    #[test]
    fn score_ignores_attendance_order() {
        let statuses = [Present, Absent, Present, Leave, Present, Absent, Absent];
        let expected = compute_performance(9, &entries(&statuses));
        for shift in 0..statuses.len() {
            let mut rotated = statuses.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(compute_performance(9, &entries(&rotated)), expected);
            rotated.reverse();
            assert_eq!(compute_performance(9, &entries(&rotated)), expected);
        }
    }
}
