//! A canned executor used only by the demo binary: turns the intent text
//! into a couple of deltas and a result string. Not the real
//! streaming-inference adapter the core deliberately excludes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vox_core::{DeltaSink, Executor, ExecutorError, ExecutorRequest, ExecutorResponse};

pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn run(
        &self,
        _cancel: CancellationToken,
        request: ExecutorRequest,
        on_delta: DeltaSink,
    ) -> Result<ExecutorResponse, ExecutorError> {
        on_delta(format!("Working on: {}", request.summary));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        on_delta("Wrapping up.".to_string());
        Ok(ExecutorResponse {
            result: Some(format!("Completed: {}", request.summary)),
        })
    }
}
