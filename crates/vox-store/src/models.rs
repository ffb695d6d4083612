//! Row-level enum mirrors for columns stored as SQLite `TEXT`.
//!
//! `vox-core`'s domain enums don't derive `sqlx::Type` (the core crate has
//! no SQL dependency), so this module keeps a local mirror per column that
//! does, converting to and from the domain type at the query boundary.
//! Same `sqlx::Type`/`FromStr`/`Display` shape the corpus uses for enum
//! columns, adapted for SQLite's string-typed columns rather than a named
//! Postgres enum (so no `type_name` attribute is needed).

use std::fmt;
use std::str::FromStr;

use vox_core::{RiskLevel, StepStatus, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub(crate) enum TaskStatusRow {
    Planned,
    AwaitingApproval,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskStatusRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planned => "planned",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Error returned when parsing an invalid [`TaskStatusRow`] string.
#[derive(Debug, Clone)]
pub(crate) struct StatusParseError(pub String);

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status: {:?}", self.0)
    }
}

impl std::error::Error for StatusParseError {}

impl FromStr for TaskStatusRow {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "awaiting_approval" => Ok(Self::AwaitingApproval),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

impl From<TaskStatus> for TaskStatusRow {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Planned => Self::Planned,
            TaskStatus::AwaitingApproval => Self::AwaitingApproval,
            TaskStatus::Running => Self::Running,
            TaskStatus::Paused => Self::Paused,
            TaskStatus::Completed => Self::Completed,
            TaskStatus::Failed => Self::Failed,
            TaskStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<TaskStatusRow> for TaskStatus {
    fn from(row: TaskStatusRow) -> Self {
        match row {
            TaskStatusRow::Planned => Self::Planned,
            TaskStatusRow::AwaitingApproval => Self::AwaitingApproval,
            TaskStatusRow::Running => Self::Running,
            TaskStatusRow::Paused => Self::Paused,
            TaskStatusRow::Completed => Self::Completed,
            TaskStatusRow::Failed => Self::Failed,
            TaskStatusRow::Cancelled => Self::Cancelled,
        }
    }
}

impl From<StepStatus> for TaskStatusRow {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Planned => Self::Planned,
            StepStatus::AwaitingApproval => Self::AwaitingApproval,
            StepStatus::Running => Self::Running,
            StepStatus::Paused => Self::Paused,
            StepStatus::Completed => Self::Completed,
            StepStatus::Failed => Self::Failed,
            StepStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<TaskStatusRow> for StepStatus {
    fn from(row: TaskStatusRow) -> Self {
        match row {
            TaskStatusRow::Planned => Self::Planned,
            TaskStatusRow::AwaitingApproval => Self::AwaitingApproval,
            TaskStatusRow::Running => Self::Running,
            TaskStatusRow::Paused => Self::Paused,
            TaskStatusRow::Completed => Self::Completed,
            TaskStatusRow::Failed => Self::Failed,
            TaskStatusRow::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub(crate) enum RiskLevelRow {
    Low,
    Medium,
    High,
    Blocked,
}

impl fmt::Display for RiskLevelRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Blocked => "blocked",
        })
    }
}

impl FromStr for RiskLevelRow {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "blocked" => Ok(Self::Blocked),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

impl From<RiskLevel> for RiskLevelRow {
    fn from(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => Self::Low,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::High => Self::High,
            RiskLevel::Blocked => Self::Blocked,
        }
    }
}

impl From<RiskLevelRow> for RiskLevel {
    fn from(row: RiskLevelRow) -> Self {
        match row {
            RiskLevelRow::Low => Self::Low,
            RiskLevelRow::Medium => Self::Medium,
            RiskLevelRow::High => Self::High,
            RiskLevelRow::Blocked => Self::Blocked,
        }
    }
}
