//! Row shape and hand-written SQL for the `tasks` and `task_steps` tables.
//! A task and its steps are replaced atomically: `save_task` deletes the
//! step rows for the task and re-inserts the current set inside the same
//! transaction as the parent upsert.

use anyhow::Context;
use sqlx::SqlitePool;
use vox_core::{PlanGraph, Task, TaskStep};

use crate::models::{RiskLevelRow, TaskStatusRow};

#[derive(sqlx::FromRow)]
pub(crate) struct TaskRow {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub intent_text: String,
    pub summary: String,
    pub plan_graph: String,
    pub mode: String,
    pub priority: String,
    pub status: TaskStatusRow,
    pub risk: RiskLevelRow,
    pub requires_approval: bool,
    pub current_step_id: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct StepRow {
    pub id: String,
    pub task_id: String,
    pub seq: i64,
    pub title: String,
    pub status: TaskStatusRow,
    pub risk: RiskLevelRow,
    pub requires_approval: bool,
    pub tool_name: Option<String>,
    pub input_redacted: Option<String>,
    pub output_redacted: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StepRow {
    fn into_step(self) -> TaskStep {
        TaskStep {
            id: self.id,
            task_id: self.task_id,
            seq: self.seq as u32,
            title: self.title,
            status: self.status.into(),
            risk: self.risk.into(),
            requires_approval: self.requires_approval,
            tool_name: self.tool_name,
            input_redacted: self.input_redacted,
            output_redacted: self.output_redacted,
            error: self.error,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

impl TaskRow {
    fn into_task(self, steps: Vec<TaskStep>) -> anyhow::Result<Task> {
        let plan_graph: PlanGraph =
            serde_json::from_str(&self.plan_graph).context("decoding plan_graph column")?;

        Ok(Task {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            intent_text: self.intent_text,
            summary: self.summary,
            plan_graph,
            mode: self.mode,
            priority: self.priority,
            status: self.status.into(),
            risk: self.risk.into(),
            requires_approval: self.requires_approval,
            current_step_id: self.current_step_id,
            steps,
            result: self.result,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

async fn fetch_steps(pool: &SqlitePool, task_id: &str) -> anyhow::Result<Vec<TaskStep>> {
    let rows: Vec<StepRow> =
        sqlx::query_as("SELECT * FROM task_steps WHERE task_id = ? ORDER BY seq ASC")
            .bind(task_id)
            .fetch_all(pool)
            .await
            .context("fetching task steps")?;
    Ok(rows.into_iter().map(StepRow::into_step).collect())
}

pub(crate) async fn save_task(pool: &SqlitePool, task: &Task) -> anyhow::Result<()> {
    let plan_graph = serde_json::to_string(&task.plan_graph).context("encoding plan_graph")?;
    let status = TaskStatusRow::from(task.status);
    let risk = RiskLevelRow::from(task.risk);

    let mut tx = pool.begin().await.context("beginning save_task transaction")?;

    sqlx::query(
        "INSERT INTO tasks (
            id, session_id, user_id, intent_text, summary, plan_graph, mode, priority,
            status, risk, requires_approval, current_step_id, result, error,
            created_at, updated_at, started_at, ended_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            session_id = excluded.session_id,
            user_id = excluded.user_id,
            intent_text = excluded.intent_text,
            summary = excluded.summary,
            plan_graph = excluded.plan_graph,
            mode = excluded.mode,
            priority = excluded.priority,
            status = excluded.status,
            risk = excluded.risk,
            requires_approval = excluded.requires_approval,
            current_step_id = excluded.current_step_id,
            result = excluded.result,
            error = excluded.error,
            updated_at = excluded.updated_at,
            started_at = excluded.started_at,
            ended_at = excluded.ended_at",
    )
    .bind(&task.id)
    .bind(&task.session_id)
    .bind(&task.user_id)
    .bind(&task.intent_text)
    .bind(&task.summary)
    .bind(plan_graph)
    .bind(&task.mode)
    .bind(&task.priority)
    .bind(status)
    .bind(risk)
    .bind(task.requires_approval)
    .bind(&task.current_step_id)
    .bind(&task.result)
    .bind(&task.error)
    .bind(task.created_at)
    .bind(task.updated_at)
    .bind(task.started_at)
    .bind(task.ended_at)
    .execute(&mut *tx)
    .await
    .context("upserting task")?;

    sqlx::query("DELETE FROM task_steps WHERE task_id = ?")
        .bind(&task.id)
        .execute(&mut *tx)
        .await
        .context("clearing task steps")?;

    for step in &task.steps {
        sqlx::query(
            "INSERT INTO task_steps (
                task_id, id, seq, title, status, risk, requires_approval,
                tool_name, input_redacted, output_redacted, error, started_at, ended_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&step.id)
        .bind(step.seq as i64)
        .bind(&step.title)
        .bind(TaskStatusRow::from(step.status))
        .bind(RiskLevelRow::from(step.risk))
        .bind(step.requires_approval)
        .bind(&step.tool_name)
        .bind(&step.input_redacted)
        .bind(&step.output_redacted)
        .bind(&step.error)
        .bind(step.started_at)
        .bind(step.ended_at)
        .execute(&mut *tx)
        .await
        .context("inserting task step")?;
    }

    tx.commit().await.context("committing save_task transaction")?;

    Ok(())
}

pub(crate) async fn get_task(pool: &SqlitePool, task_id: &str) -> anyhow::Result<Option<Task>> {
    let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .context("fetching task")?;

    match row {
        Some(row) => {
            let steps = fetch_steps(pool, task_id).await?;
            Ok(Some(row.into_task(steps)?))
        }
        None => Ok(None),
    }
}

pub(crate) async fn list_tasks_by_session(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Task>> {
    let effective_limit = if limit > 0 { limit } else { i64::MAX };
    let rows: Vec<TaskRow> = sqlx::query_as(
        "SELECT * FROM tasks WHERE session_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(session_id)
    .bind(effective_limit)
    .fetch_all(pool)
    .await
    .context("listing tasks by session")?;

    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let steps = fetch_steps(pool, &row.id).await?;
        tasks.push(row.into_task(steps)?);
    }
    Ok(tasks)
}
