//! Domain types shared by the Session Manager and Task Manager.
//!
//! Enum `Display` impls follow the `snake_case` wire representation used by
//! every event and JSON payload the core emits (see the event enumeration
//! in the design doc).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Ended => "ended",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub persona_id: String,
    pub voice_id: Option<String>,
    pub status: SessionStatus,
    pub active_turn_id: Option<String>,
    pub interruption_count: u32,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Blocked,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Blocked => "blocked",
        })
    }
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    AwaitingApproval,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
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

// ---------------------------------------------------------------------------
// Step status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    AwaitingApproval,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for StepStatus {
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

// ---------------------------------------------------------------------------
// Plan graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanNode {
    pub id: String,
    pub seq: u32,
    pub title: String,
    pub kind: String,
    pub status: StepStatus,
    pub risk: RiskLevel,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanEdge {
    pub from: String,
    pub to: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanGraph {
    pub version: u32,
    pub nodes: Vec<PlanNode>,
    pub edges: Vec<PlanEdge>,
}

impl PlanGraph {
    pub fn empty() -> Self {
        Self {
            version: 1,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task / TaskStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskStep {
    pub id: String,
    pub task_id: String,
    pub seq: u32,
    pub title: String,
    pub status: StepStatus,
    pub risk: RiskLevel,
    pub requires_approval: bool,
    pub tool_name: Option<String>,
    pub input_redacted: Option<String>,
    pub output_redacted: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub intent_text: String,
    pub summary: String,
    pub plan_graph: PlanGraph,
    pub mode: String,
    pub priority: String,
    pub status: TaskStatus,
    pub risk: RiskLevel,
    pub requires_approval: bool,
    pub current_step_id: String,
    pub steps: Vec<TaskStep>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn current_step(&self) -> Option<&TaskStep> {
        self.steps.iter().find(|s| s.id == self.current_step_id)
    }

    pub fn current_step_mut(&mut self) -> Option<&mut TaskStep> {
        self.steps.iter_mut().find(|s| s.id == self.current_step_id)
    }
}

// ---------------------------------------------------------------------------
// Create request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateRequest {
    pub session_id: String,
    pub user_id: String,
    pub intent_text: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskCreated,
    TaskPlanGraph,
    TaskPlanDelta,
    TaskStepStarted,
    TaskStepLog,
    TaskStepCompleted,
    TaskWaitingApproval,
    TaskCompleted,
    TaskFailed,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TaskCreated => "task_created",
            Self::TaskPlanGraph => "task_plan_graph",
            Self::TaskPlanDelta => "task_plan_delta",
            Self::TaskStepStarted => "task_step_started",
            Self::TaskStepLog => "task_step_log",
            Self::TaskStepCompleted => "task_step_completed",
            Self::TaskWaitingApproval => "task_waiting_approval",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub event_type: EventType,
    pub session_id: String,
    pub task_id: String,
    pub step_id: Option<String>,
    pub step_seq: Option<u32>,
    pub step_title: Option<String>,
    pub status: TaskStatus,
    pub risk: RiskLevel,
    pub requires_approval: bool,
    pub queued_position: Option<usize>,
    pub text_delta: Option<String>,
    pub approval_prompt: Option<String>,
    pub result: Option<String>,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub plan_graph: Option<PlanGraph>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn base(task: &Task, event_type: EventType) -> Self {
        let step = task.current_step();
        Self {
            event_type,
            session_id: task.session_id.clone(),
            task_id: task.id.clone(),
            step_id: step.map(|s| s.id.clone()),
            step_seq: step.map(|s| s.seq),
            step_title: step.map(|s| s.title.clone()),
            status: task.status,
            risk: task.risk,
            requires_approval: task.requires_approval,
            queued_position: None,
            text_delta: None,
            approval_prompt: None,
            result: None,
            code: None,
            detail: None,
            plan_graph: None,
            timestamp: Utc::now(),
        }
    }

    pub fn created(task: &Task) -> Self {
        Self::base(task, EventType::TaskCreated)
    }

    pub fn plan_graph(task: &Task) -> Self {
        let mut e = Self::base(task, EventType::TaskPlanGraph);
        e.plan_graph = Some(task.plan_graph.clone());
        e
    }

    pub fn waiting_approval(task: &Task) -> Self {
        let mut e = Self::base(task, EventType::TaskWaitingApproval);
        e.approval_prompt = Some(task.summary.clone());
        e
    }

    pub fn step_started(task: &Task) -> Self {
        Self::base(task, EventType::TaskStepStarted)
    }

    pub fn step_log(task: &Task, delta: &str) -> Self {
        let mut e = Self::base(task, EventType::TaskStepLog);
        e.text_delta = Some(delta.to_string());
        e
    }

    pub fn step_completed(task: &Task) -> Self {
        Self::base(task, EventType::TaskStepCompleted)
    }

    pub fn completed(task: &Task) -> Self {
        let mut e = Self::base(task, EventType::TaskCompleted);
        e.result = task.result.clone();
        e
    }

    pub fn failed(task: &Task, code: Option<String>, detail: Option<String>) -> Self {
        let mut e = Self::base(task, EventType::TaskFailed);
        e.code = code;
        e.detail = detail;
        e
    }

    pub fn plan_delta(task: &Task, detail: Option<String>, queued_position: Option<usize>) -> Self {
        let mut e = Self::base(task, EventType::TaskPlanDelta);
        e.detail = detail;
        e.queued_position = queued_position;
        e
    }
}
