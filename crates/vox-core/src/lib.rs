//! Task orchestration core for a voice-assistant backend.
//!
//! A session manager tracks conversational sessions and expires them on
//! inactivity; a task manager runs a small state machine per task, queues
//! at most one running task per session, and fans events out to
//! subscribers. Persistence is optional and lives behind the `TaskStore`
//! trait; execution is optional and lives behind the `Executor` trait.

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod ids;
pub mod plan;
pub mod runtime;
pub mod session;
pub mod store;
pub mod task_manager;
pub mod types;

pub use config::CoreConfig;
pub use error::{ExecutorError, SessionManagerError, TaskManagerError, TaskStoreError};
pub use events::{EventBus, EventStream};
pub use executor::{DeltaSink, Executor, ExecutorRequest, ExecutorResponse};
pub use plan::build_plan_graph;
pub use runtime::{RuntimeConfig, TaskRuntime};
pub use session::{ExpireHook, SessionManager, SessionManagerConfig};
pub use store::{InMemoryTaskStore, TaskStore};
pub use task_manager::{CreateOutcome, ManagerConfig, Outcome, TaskManager, Unsubscribe};
pub use types::{
    CreateRequest, Event, EventType, PlanEdge, PlanGraph, PlanNode, RiskLevel, Session,
    SessionStatus, StepStatus, Task, TaskStatus, TaskStep,
};
