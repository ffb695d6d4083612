//! Core-level configuration. Plain value types with defaulting baked in;
//! `vox-cli` is responsible for loading raw numbers from TOML/env/flags and
//! handing them to `from_seconds`.

use std::time::Duration;

use crate::session::SessionManagerConfig;
use crate::task_manager::ManagerConfig;
use crate::runtime::RuntimeConfig;

#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    pub session: SessionManagerConfig,
    pub task: ManagerConfig,
    pub runtime: RuntimeConfig,
}

impl CoreConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn from_seconds(
        session_inactivity_timeout_secs: i64,
        ended_retention_secs: i64,
        idempotency_window_secs: i64,
        event_history_max: usize,
        task_timeout_secs: u64,
        task_runtime_enabled: bool,
    ) -> Self {
        Self {
            session: SessionManagerConfig::new(
                chrono::Duration::seconds(session_inactivity_timeout_secs),
                chrono::Duration::seconds(ended_retention_secs),
            ),
            task: ManagerConfig::new(
                chrono::Duration::seconds(idempotency_window_secs),
                event_history_max,
            ),
            runtime: RuntimeConfig {
                enabled: task_runtime_enabled,
                task_timeout: Duration::from_secs(task_timeout_secs.max(1)),
            },
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            session: SessionManagerConfig::default(),
            task: ManagerConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}
