//! The task state machine: creation with idempotency dedup, approval gating,
//! a per-session single-active-task queue, streamed step logs, and terminal
//! transitions that release the session's queue slot and promote the next
//! pending task.
//!
//! State lives behind a single `std::sync::Mutex`; critical sections never
//! hold the guard across an `.await`. Persistence happens after the guard is
//! dropped, so a slow or unavailable store never blocks a transition.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::TaskManagerError;
use crate::events::{EventBus, EventStream};
use crate::ids::new_id;
use crate::plan::build_plan_graph;
use crate::store::TaskStore;
use crate::types::{CreateRequest, Event, RiskLevel, StepStatus, Task, TaskStatus, TaskStep};

/// How long a single store call is allowed to run before the core gives up
/// on it and proceeds with whatever it already has in memory.
const STORE_DEADLINE: StdDuration = StdDuration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    pub idempotency_window: chrono::Duration,
    pub event_history_max: usize,
}

impl ManagerConfig {
    /// `idempotency_window <= 0` falls back to ten seconds. `event_history_max
    /// == 0` falls back to 512.
    pub fn new(idempotency_window: chrono::Duration, event_history_max: usize) -> Self {
        let idempotency_window = if idempotency_window <= chrono::Duration::zero() {
            chrono::Duration::seconds(10)
        } else {
            idempotency_window
        };
        let event_history_max = if event_history_max == 0 {
            512
        } else {
            event_history_max
        };
        Self {
            idempotency_window,
            event_history_max,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(10), 512)
    }
}

/// Result of `TaskManager::create`.
pub struct CreateOutcome {
    pub task: Task,
    pub was_dedup: bool,
    pub started_task: Option<Task>,
}

/// Result of every other transition that may promote a queued task.
pub struct Outcome {
    pub task: Task,
    pub started_task: Option<Task>,
}

struct IdempotencyEntry {
    task_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionQueue {
    active: Option<String>,
    pending: VecDeque<String>,
}

struct TaskManagerState {
    tasks: HashMap<String, Task>,
    sessions: HashMap<String, SessionQueue>,
    idempotency: HashMap<String, IdempotencyEntry>,
    bus: EventBus,
}

impl TaskManagerState {
    fn publish(&mut self, event: Event) {
        self.bus.publish(event);
    }

    fn gc_idempotency(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        self.idempotency
            .retain(|_, entry| now - entry.created_at <= window);
    }

    /// Starts `task_id` immediately if its session has no active task,
    /// otherwise appends it to the session's pending queue. Publishes the
    /// corresponding event either way. Returns `true` if it started.
    fn start_or_queue(&mut self, task_id: &str, now: DateTime<Utc>) -> bool {
        let session_id = self.tasks[task_id].session_id.clone();
        let queue = self.sessions.entry(session_id).or_default();

        if queue.active.is_none() {
            queue.active = Some(task_id.to_string());
            let task = self.tasks.get_mut(task_id).unwrap();
            task.status = TaskStatus::Running;
            if task.started_at.is_none() {
                task.started_at = Some(now);
            }
            task.updated_at = now;
            let current = task.current_step_id.clone();
            if let Some(step) = task.steps.iter_mut().find(|s| s.id == current) {
                step.status = StepStatus::Running;
                step.started_at = Some(now);
            }
            let snapshot = self.tasks.get(task_id).unwrap().clone();
            self.publish(Event::step_started(&snapshot));
            true
        } else {
            queue.pending.push_back(task_id.to_string());
            let position = queue.pending.len();
            let snapshot = self.tasks.get(task_id).unwrap().clone();
            self.publish(Event::plan_delta(&snapshot, None, Some(position)));
            false
        }
    }

    /// Clears the active slot for `session_id` and starts the next
    /// non-terminal pending task, if any. Returns its id.
    fn release_and_start_next(&mut self, session_id: &str, now: DateTime<Utc>) -> Option<String> {
        if let Some(queue) = self.sessions.get_mut(session_id) {
            queue.active = None;
        } else {
            return None;
        }

        loop {
            let next_id = self.sessions.get_mut(session_id)?.pending.pop_front()?;
            let is_terminal = self
                .tasks
                .get(&next_id)
                .map(|t| t.status.is_terminal())
                .unwrap_or(true);
            if is_terminal {
                continue;
            }
            return if self.start_or_queue(&next_id, now) {
                Some(next_id)
            } else {
                None
            };
        }
    }

    /// Marks `task_id` as terminal and drops it from its session's pending
    /// queue. Does NOT promote the next queued task itself: the caller must
    /// publish the task's own terminal events first, then call
    /// `release_and_start_next` if the returned flag says it was active, so
    /// a same-session subscriber sees the terminating task's events before
    /// the promoted task's.
    fn mark_terminal(
        &mut self,
        task_id: &str,
        new_status: TaskStatus,
        error: Option<String>,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> (String, bool) {
        let session_id = {
            let task = self.tasks.get_mut(task_id).unwrap();
            task.status = new_status;
            task.error = error;
            task.result = result;
            task.ended_at = Some(now);
            task.updated_at = now;
            let current = task.current_step_id.clone();
            if let Some(step) = task.steps.iter_mut().find(|s| s.id == current) {
                if !matches!(
                    step.status,
                    StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled
                ) {
                    step.status = match new_status {
                        TaskStatus::Completed => StepStatus::Completed,
                        TaskStatus::Failed => StepStatus::Failed,
                        TaskStatus::Cancelled => StepStatus::Cancelled,
                        _ => step.status,
                    };
                    step.ended_at = Some(now);
                }
            }
            task.session_id.clone()
        };

        let was_active = self
            .sessions
            .get(&session_id)
            .map(|q| q.active.as_deref() == Some(task_id))
            .unwrap_or(false);

        if let Some(queue) = self.sessions.get_mut(&session_id) {
            queue.pending.retain(|id| id != task_id);
        }

        (session_id, was_active)
    }
}

fn normalize_intent(intent_text: &str) -> String {
    intent_text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct TaskManager {
    state: Mutex<TaskManagerState>,
    store: Option<Arc<dyn TaskStore>>,
    config: ManagerConfig,
}

impl TaskManager {
    pub fn new(config: ManagerConfig, store: Option<Arc<dyn TaskStore>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskManagerState {
                tasks: HashMap::new(),
                sessions: HashMap::new(),
                idempotency: HashMap::new(),
                bus: EventBus::new(config.event_history_max),
            }),
            store,
            config,
        })
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn persist_detached(&self, task: Task) {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            match tokio::time::timeout(STORE_DEADLINE, store.save_task(&task)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(task_id = %task.id, error = %err, "failed to persist task")
                }
                Err(_) => tracing::warn!(task_id = %task.id, "persisting task timed out"),
            }
        });
    }

    async fn persist_now(&self, task: &Task) {
        let Some(store) = &self.store else {
            return;
        };
        match tokio::time::timeout(STORE_DEADLINE, store.save_task(task)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(task_id = %task.id, error = %err, "failed to persist task")
            }
            Err(_) => tracing::warn!(task_id = %task.id, "persisting task timed out"),
        }
    }

    /// Creates a task from `req`, deduplicating against an identical
    /// `(session_id, normalized intent_text)` pair seen within the
    /// idempotency window. A fresh task is either started immediately or
    /// queued behind the session's active task, unless `requires_approval`
    /// holds it in `awaiting_approval`.
    pub async fn create(
        &self,
        req: CreateRequest,
        summary: Option<String>,
        risk: RiskLevel,
        requires_approval: bool,
    ) -> Result<CreateOutcome, TaskManagerError> {
        let session_id = req.session_id.trim().to_string();
        let user_id = req.user_id.trim().to_string();
        let intent_text = req.intent_text.trim().to_string();
        let mode = req.mode.as_deref().unwrap_or("").trim().to_string();
        let priority = req.priority.as_deref().unwrap_or("").trim().to_string();

        if session_id.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "session_id must not be empty".to_string(),
            ));
        }
        if intent_text.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "intent_text must not be empty".to_string(),
            ));
        }

        let mut summary = summary.unwrap_or_default().trim().to_string();
        if summary.is_empty() {
            summary = intent_text.clone();
        }

        let normalized = normalize_intent(&intent_text);
        let idem_key = format!("{session_id}|{normalized}");
        let now = Utc::now();

        let mut started_task = None;
        let outcome_task;
        let was_dedup;
        let to_persist;

        {
            let mut state = self.state.lock().unwrap();
            state.gc_idempotency(now, self.config.idempotency_window);

            if let Some(existing_id) = state
                .idempotency
                .get(&idem_key)
                .map(|entry| entry.task_id.clone())
            {
                if let Some(existing) = state.tasks.get(&existing_id) {
                    return Ok(CreateOutcome {
                        task: existing.clone(),
                        was_dedup: true,
                        started_task: None,
                    });
                }
            }

            let task_id = new_id();
            let step_id = new_id();
            let plan_graph = build_plan_graph(&summary, &intent_text, risk, requires_approval);
            let first_title = plan_graph
                .nodes
                .first()
                .map(|n| n.title.clone())
                .unwrap_or_else(|| summary.clone());

            let status = if requires_approval {
                TaskStatus::AwaitingApproval
            } else {
                TaskStatus::Planned
            };
            let step_status = if requires_approval {
                StepStatus::AwaitingApproval
            } else {
                StepStatus::Planned
            };

            let step = TaskStep {
                id: step_id.clone(),
                task_id: task_id.clone(),
                seq: 1,
                title: first_title,
                status: step_status,
                risk,
                requires_approval,
                tool_name: None,
                input_redacted: None,
                output_redacted: None,
                error: None,
                started_at: None,
                ended_at: None,
            };

            let task = Task {
                id: task_id.clone(),
                session_id: session_id.clone(),
                user_id,
                intent_text: intent_text.clone(),
                summary,
                plan_graph,
                mode,
                priority,
                status,
                risk,
                requires_approval,
                current_step_id: step_id,
                steps: vec![step],
                result: None,
                error: None,
                created_at: now,
                updated_at: now,
                started_at: None,
                ended_at: None,
            };

            state.tasks.insert(task_id.clone(), task);
            state.idempotency.insert(
                idem_key,
                IdempotencyEntry {
                    task_id: task_id.clone(),
                    created_at: now,
                },
            );

            let snapshot = state.tasks.get(&task_id).unwrap().clone();
            state.publish(Event::created(&snapshot));
            state.publish(Event::plan_graph(&snapshot));

            if requires_approval {
                state.publish(Event::waiting_approval(&snapshot));
            } else if state.start_or_queue(&task_id, now) {
                started_task = state.tasks.get(&task_id).cloned();
            }

            was_dedup = false;
            outcome_task = state.tasks.get(&task_id).cloned().unwrap();
            to_persist = outcome_task.clone();
        }

        if requires_approval {
            self.persist_now(&to_persist).await;
        } else {
            self.persist_detached(to_persist);
        }
        if let Some(started) = &started_task {
            self.persist_detached(started.clone());
        }

        Ok(CreateOutcome {
            task: outcome_task,
            was_dedup,
            started_task,
        })
    }

    pub async fn approve(
        &self,
        task_id: &str,
        approved: bool,
    ) -> Result<Outcome, TaskManagerError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "task_id must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let mut started_task = None;
        let outcome_task;

        {
            let mut state = self.state.lock().unwrap();
            let status = state
                .tasks
                .get(task_id)
                .map(|t| t.status)
                .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;
            if status != TaskStatus::AwaitingApproval {
                return Err(TaskManagerError::InvalidState(format!(
                    "task {task_id} is not awaiting approval"
                )));
            }

            if !approved {
                let (session_id, was_active) = state.mark_terminal(
                    task_id,
                    TaskStatus::Failed,
                    Some("approval denied".to_string()),
                    None,
                    now,
                );
                let snapshot = state.tasks.get(task_id).cloned().unwrap();
                state.publish(Event::failed(
                    &snapshot,
                    Some("approval_denied".to_string()),
                    Some("approval denied".to_string()),
                ));
                if was_active {
                    if let Some(next_id) = state.release_and_start_next(&session_id, now) {
                        started_task = state.tasks.get(&next_id).cloned();
                    }
                }
            } else {
                {
                    let task = state.tasks.get_mut(task_id).unwrap();
                    task.requires_approval = false;
                    task.updated_at = now;
                    let current = task.current_step_id.clone();
                    if let Some(step) = task.steps.iter_mut().find(|s| s.id == current) {
                        if step.status == StepStatus::AwaitingApproval {
                            step.status = StepStatus::Planned;
                        }
                    }
                }
                if state.start_or_queue(task_id, now) {
                    started_task = state.tasks.get(task_id).cloned();
                }
            }

            outcome_task = state.tasks.get(task_id).cloned().unwrap();
        }

        self.persist_detached(outcome_task.clone());
        if let Some(started) = &started_task {
            self.persist_detached(started.clone());
        }

        Ok(Outcome {
            task: outcome_task,
            started_task,
        })
    }

    pub async fn append_step_log(
        &self,
        task_id: &str,
        delta: &str,
    ) -> Result<(), TaskManagerError> {
        if delta.trim().is_empty() {
            return Ok(());
        }
        let to_persist;
        {
            let mut state = self.state.lock().unwrap();
            let status = state
                .tasks
                .get(task_id)
                .map(|t| t.status)
                .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;
            if status.is_terminal() {
                return Ok(());
            }

            let now = Utc::now();
            {
                let task = state.tasks.get_mut(task_id).unwrap();
                task.updated_at = now;
                let current = task.current_step_id.clone();
                if let Some(step) = task.steps.iter_mut().find(|s| s.id == current) {
                    step.output_redacted = Some(match &step.output_redacted {
                        Some(existing) if !existing.is_empty() => {
                            format!("{existing}\n{delta}")
                        }
                        _ => delta.to_string(),
                    });
                }
            }

            let snapshot = state.tasks.get(task_id).cloned().unwrap();
            state.publish(Event::step_log(&snapshot, delta));
            to_persist = snapshot;
        }
        self.persist_detached(to_persist);
        Ok(())
    }

    pub async fn complete(
        &self,
        task_id: &str,
        result: Option<String>,
    ) -> Result<Outcome, TaskManagerError> {
        self.terminate(task_id, TaskStatus::Completed, None, result, |snapshot| {
            vec![Event::step_completed(snapshot), Event::completed(snapshot)]
        })
        .await
    }

    pub async fn fail(&self, task_id: &str, error: String) -> Result<Outcome, TaskManagerError> {
        self.terminate(
            task_id,
            TaskStatus::Failed,
            Some(error.clone()),
            None,
            move |snapshot| vec![Event::failed(snapshot, None, Some(error.clone()))],
        )
        .await
    }

    pub async fn cancel(&self, task_id: &str, reason: String) -> Result<Outcome, TaskManagerError> {
        self.terminate(
            task_id,
            TaskStatus::Cancelled,
            Some(reason.clone()),
            None,
            move |snapshot| {
                vec![Event::failed(
                    snapshot,
                    Some("cancelled".to_string()),
                    Some(reason.clone()),
                )]
            },
        )
        .await
    }

    async fn terminate(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        error: Option<String>,
        result: Option<String>,
        events: impl FnOnce(&Task) -> Vec<Event>,
    ) -> Result<Outcome, TaskManagerError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "task_id must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let mut started_task = None;
        let outcome_task;

        {
            let mut state = self.state.lock().unwrap();
            let current = state
                .tasks
                .get(task_id)
                .cloned()
                .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;
            if current.status.is_terminal() {
                return Ok(Outcome {
                    task: current,
                    started_task: None,
                });
            }

            let (session_id, was_active) = state.mark_terminal(task_id, new_status, error, result, now);
            let snapshot = state.tasks.get(task_id).cloned().unwrap();
            for event in events(&snapshot) {
                state.publish(event);
            }
            if was_active {
                if let Some(next_id) = state.release_and_start_next(&session_id, now) {
                    started_task = state.tasks.get(&next_id).cloned();
                }
            }
            outcome_task = snapshot;
        }

        self.persist_detached(outcome_task.clone());
        if let Some(started) = &started_task {
            self.persist_detached(started.clone());
        }

        Ok(Outcome {
            task: outcome_task,
            started_task,
        })
    }

    pub async fn pause(&self, task_id: &str, reason: Option<String>) -> Result<Outcome, TaskManagerError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "task_id must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let outcome_task;
        let mut started_task = None;

        {
            let mut state = self.state.lock().unwrap();
            let current = state
                .tasks
                .get(task_id)
                .cloned()
                .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;
            if current.status.is_terminal() || current.status == TaskStatus::Paused {
                return Ok(Outcome {
                    task: current,
                    started_task: None,
                });
            }

            let session_id = current.session_id.clone();
            {
                let task = state.tasks.get_mut(task_id).unwrap();
                task.status = TaskStatus::Paused;
                task.updated_at = now;
                let current_step = task.current_step_id.clone();
                if let Some(step) = task.steps.iter_mut().find(|s| s.id == current_step) {
                    if matches!(step.status, StepStatus::Running | StepStatus::Planned) {
                        step.status = StepStatus::Paused;
                    }
                }
            }

            let was_active = state
                .sessions
                .get(&session_id)
                .map(|q| q.active.as_deref() == Some(task_id))
                .unwrap_or(false);
            if let Some(queue) = state.sessions.get_mut(&session_id) {
                queue.pending.retain(|id| id != task_id);
            }

            let snapshot = state.tasks.get(task_id).cloned().unwrap();
            state.publish(Event::plan_delta(
                &snapshot,
                Some(reason.unwrap_or_else(|| "Paused.".to_string())),
                None,
            ));

            if was_active {
                if let Some(next_id) = state.release_and_start_next(&session_id, now) {
                    started_task = state.tasks.get(&next_id).cloned();
                }
            }

            outcome_task = snapshot;
        }

        self.persist_detached(outcome_task.clone());
        if let Some(started) = &started_task {
            self.persist_detached(started.clone());
        }

        Ok(Outcome {
            task: outcome_task,
            started_task,
        })
    }

    pub async fn resume(&self, task_id: &str) -> Result<Outcome, TaskManagerError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(TaskManagerError::InvalidArgument(
                "task_id must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let outcome_task;
        let mut started_task = None;

        {
            let mut state = self.state.lock().unwrap();
            let status = state
                .tasks
                .get(task_id)
                .map(|t| t.status)
                .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;
            if !matches!(status, TaskStatus::Paused | TaskStatus::Planned) {
                return Err(TaskManagerError::InvalidState(format!(
                    "task {task_id} is not paused or planned"
                )));
            }

            {
                let task = state.tasks.get_mut(task_id).unwrap();
                task.updated_at = now;
                let current = task.current_step_id.clone();
                if let Some(step) = task.steps.iter_mut().find(|s| s.id == current) {
                    if step.status == StepStatus::Paused {
                        step.status = StepStatus::Planned;
                    }
                }
            }

            if state.start_or_queue(task_id, now) {
                started_task = state.tasks.get(task_id).cloned();
            }

            let snapshot = state.tasks.get(task_id).cloned().unwrap();
            state.publish(Event::plan_delta(&snapshot, Some("Resumed.".to_string()), None));
            outcome_task = snapshot;
        }

        self.persist_detached(outcome_task.clone());
        if let Some(started) = &started_task {
            self.persist_detached(started.clone());
        }

        Ok(Outcome {
            task: outcome_task,
            started_task,
        })
    }

    /// Looks the task up in memory first, falling back to the store on a
    /// miss. A plan graph missing from an older persisted row is rebuilt
    /// rather than returned empty.
    pub async fn get(&self, task_id: &str) -> Result<Task, TaskManagerError> {
        {
            let state = self.state.lock().unwrap();
            if let Some(task) = state.tasks.get(task_id) {
                return Ok(task.clone());
            }
        }

        if let Some(store) = &self.store {
            if let Ok(Ok(mut task)) =
                tokio::time::timeout(STORE_DEADLINE, store.get_task(task_id)).await
            {
                if task.plan_graph.nodes.is_empty() {
                    task.plan_graph = build_plan_graph(
                        &task.summary,
                        &task.intent_text,
                        task.risk,
                        task.requires_approval,
                    );
                }
                let mut state = self.state.lock().unwrap();
                state
                    .tasks
                    .entry(task_id.to_string())
                    .or_insert_with(|| task.clone());
                return Ok(task);
            }
        }

        Err(TaskManagerError::NotFound(task_id.to_string()))
    }

    /// Merges the in-memory view for `session_id` with whatever the store
    /// has, newest first. Store unavailability degrades silently to the
    /// in-memory view.
    pub async fn list_by_session(&self, session_id: &str, limit: i64) -> Vec<Task> {
        let mut merged: HashMap<String, Task> = HashMap::new();
        {
            let state = self.state.lock().unwrap();
            for task in state.tasks.values().filter(|t| t.session_id == session_id) {
                merged.insert(task.id.clone(), task.clone());
            }
        }

        if let Some(store) = &self.store {
            match tokio::time::timeout(
                STORE_DEADLINE,
                store.list_tasks_by_session(session_id, limit),
            )
            .await
            {
                Ok(Ok(persisted)) => {
                    for mut task in persisted {
                        if task.plan_graph.nodes.is_empty() {
                            task.plan_graph = build_plan_graph(
                                &task.summary,
                                &task.intent_text,
                                task.risk,
                                task.requires_approval,
                            );
                        }
                        merged.entry(task.id.clone()).or_insert(task);
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(%session_id, error = %err, "store lookup failed, using in-memory view only")
                }
                Err(_) => {
                    tracing::warn!(%session_id, "store lookup timed out, using in-memory view only")
                }
            }
        }

        let mut tasks: Vec<Task> = merged.into_values().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if limit > 0 {
            tasks.truncate(limit as usize);
        }
        tasks
    }

    pub async fn list_events(&self, task_id: &str, limit: i64) -> Result<Vec<Event>, TaskManagerError> {
        self.get(task_id).await?;
        Ok(self.state.lock().unwrap().bus.list_events(task_id, limit))
    }

    pub fn latest_awaiting_approval(&self, session_id: &str) -> Option<Task> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| t.session_id == session_id && t.status == TaskStatus::AwaitingApproval)
            .max_by_key(|t| t.created_at)
            .cloned()
    }

    pub fn latest_paused(&self, session_id: &str) -> Option<Task> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| t.session_id == session_id && t.status == TaskStatus::Paused)
            .max_by_key(|t| t.created_at)
            .cloned()
    }

    pub fn active_task(&self, session_id: &str) -> Option<Task> {
        let state = self.state.lock().unwrap();
        let active_id = state.sessions.get(session_id)?.active.clone()?;
        state.tasks.get(&active_id).cloned()
    }

    /// `(running_count, queued_count)` across every session; used by
    /// operator tooling, not by the state machine itself.
    pub fn snapshot_counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        let running = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count();
        let queued = state.sessions.values().map(|q| q.pending.len()).sum();
        (running, queued)
    }

    /// Registers a subscriber for `session_id`'s events. Returns the stream
    /// and an unsubscribe handle; dropping the handle does not unsubscribe
    /// on its own, call it explicitly.
    pub fn subscribe(self: &Arc<Self>, session_id: &str) -> (EventStream, Unsubscribe) {
        let (id, rx) = self.state.lock().unwrap().bus.subscribe(session_id);
        let manager = self.clone();
        let session_id = session_id.to_string();
        (
            tokio_stream::wrappers::ReceiverStream::new(rx),
            Unsubscribe {
                manager,
                session_id,
                id,
            },
        )
    }
}

pub struct Unsubscribe {
    manager: Arc<TaskManager>,
    session_id: String,
    id: u64,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        self.manager
            .state
            .lock()
            .unwrap()
            .bus
            .unsubscribe(&self.session_id, self.id);
    }
}
