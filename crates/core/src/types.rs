use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::performance::compute_performance;

/// Employee record as persisted and returned over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub user: Option<String>,
    pub name: String,
    pub department: Option<String>,
    pub attendance: Vec<AttendanceEntry>,
    pub tasks_completed: u32,
    pub performance_score: i64,
    pub salary: f64,
    pub da_increment: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Computes the performance score from the current counters without mutating the record.
    pub fn compute_performance(&self) -> i64 {
        compute_performance(self.tasks_completed, &self.attendance)
    }

    /// Recomputes and stores the derived performance score, returning the new value.
    pub fn refresh_performance(&mut self) -> i64 {
        self.performance_score = self.compute_performance();
        self.performance_score
    }
}

/// Single attendance mark. Entries are kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub date: DateTime<Utc>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    /// Returns the canonical database representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Leave => "leave",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "leave" => Ok(Self::Leave),
            other => Err(AttendanceStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attendance status must be one of present, absent, leave (got {0:?})")]
pub struct AttendanceStatusError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn attendance_status_parses_known_values() {
        assert_eq!(
            "present".parse::<AttendanceStatus>(),
            Ok(AttendanceStatus::Present)
        );
        assert_eq!(
            "absent".parse::<AttendanceStatus>(),
            Ok(AttendanceStatus::Absent)
        );
        assert_eq!("leave".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Leave));
    }

    #[test]
    fn attendance_status_rejects_unknown_and_mixed_case() {
        let err = "sick".parse::<AttendanceStatus>().unwrap_err();
        assert_eq!(err, AttendanceStatusError("sick".to_string()));
        assert!("Present".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn employee_serializes_with_camel_case_fields() {
        let employee = Employee {
            id: "e-1".into(),
            user: None,
            name: "Ada".into(),
            department: Some("R&D".into()),
            attendance: vec![AttendanceEntry {
                date: at("2024-01-02T09:00:00Z"),
                status: AttendanceStatus::Present,
            }],
            tasks_completed: 5,
            performance_score: 0,
            salary: 1000.0,
            da_increment: 0.0,
            created_at: at("2024-01-01T00:00:00Z"),
            updated_at: at("2024-01-01T00:00:00Z"),
        };

        let value = serde_json::to_value(&employee).expect("serialize");
        assert_eq!(value["tasksCompleted"], 5);
        assert_eq!(value["performanceScore"], 0);
        assert_eq!(value["daIncrement"], 0.0);
        assert_eq!(value["attendance"][0]["status"], "present");
        assert!(value["user"].is_null());
    }

    #[test]
    fn refresh_performance_overwrites_stale_score() {
        let mut employee = Employee {
            id: "e-1".into(),
            user: None,
            name: "Ada".into(),
            department: None,
            attendance: Vec::new(),
            tasks_completed: 3,
            performance_score: 999,
            salary: 0.0,
            da_increment: 0.0,
            created_at: at("2024-01-01T00:00:00Z"),
            updated_at: at("2024-01-01T00:00:00Z"),
        };

        assert_eq!(employee.refresh_performance(), 6);
        assert_eq!(employee.performance_score, 6);
    }
}
