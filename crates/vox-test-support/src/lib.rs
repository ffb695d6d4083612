//! Fixtures shared by `vox-core`, `vox-store` and `vox-cli` integration
//! tests: a scripted executor and small builder helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vox_core::{CreateRequest, DeltaSink, Executor, ExecutorError, ExecutorRequest, ExecutorResponse};

/// An executor driven entirely by a scripted outcome. Records every delta it
/// was asked to emit plus how many times it ran, so tests can assert on
/// executor-bridge behavior without a real model in the loop.
pub struct ScriptedExecutor {
    deltas: Vec<String>,
    outcome: ScriptedOutcome,
    run_count: AtomicUsize,
    seen_deltas: Mutex<Vec<String>>,
}

pub enum ScriptedOutcome {
    Complete(Option<String>),
    Fail(String),
    Hang,
}

impl ScriptedExecutor {
    pub fn new(deltas: Vec<String>, outcome: ScriptedOutcome) -> Arc<Self> {
        Arc::new(Self {
            deltas,
            outcome,
            run_count: AtomicUsize::new(0),
            seen_deltas: Mutex::new(Vec::new()),
        })
    }

    pub fn completing_with(result: Option<String>) -> Arc<Self> {
        Self::new(Vec::new(), ScriptedOutcome::Complete(result))
    }

    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    pub fn seen_deltas(&self) -> Vec<String> {
        self.seen_deltas.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(
        &self,
        cancel: CancellationToken,
        _request: ExecutorRequest,
        on_delta: DeltaSink,
    ) -> Result<ExecutorResponse, ExecutorError> {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        for delta in &self.deltas {
            on_delta(delta.clone());
            self.seen_deltas.lock().unwrap().push(delta.clone());
        }

        match &self.outcome {
            ScriptedOutcome::Complete(result) => Ok(ExecutorResponse {
                result: result.clone(),
            }),
            ScriptedOutcome::Fail(message) => Err(ExecutorError::Failed(message.clone())),
            ScriptedOutcome::Hang => {
                cancel.cancelled().await;
                Err(ExecutorError::Cancelled)
            }
        }
    }
}

pub fn create_request(session_id: &str, intent_text: &str) -> CreateRequest {
    CreateRequest {
        session_id: session_id.to_string(),
        user_id: "test-user".to_string(),
        intent_text: intent_text.to_string(),
        mode: None,
        priority: None,
    }
}
