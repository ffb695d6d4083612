//! The executor contract. `TaskRuntime` drives any type implementing this
//! trait without knowing what actually produces the response — a model
//! call, a tool pipeline, a scripted stand-in for tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

#[derive(Debug, Clone)]
pub struct ExecutorRequest {
    pub task_id: String,
    pub session_id: String,
    pub intent_text: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorResponse {
    pub result: Option<String>,
}

/// Called synchronously by an executor as it streams partial output. The
/// runtime is responsible for turning these into ordered `AppendStepLog`
/// calls; executors must not assume anything about how the sink is backed.
pub type DeltaSink = std::sync::Arc<dyn Fn(String) + Send + Sync>;

#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(
        &self,
        cancel: CancellationToken,
        request: ExecutorRequest,
        on_delta: DeltaSink,
    ) -> Result<ExecutorResponse, ExecutorError>;
}
