// src/engine/submit.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dag::build_graph;
use crate::errors::{PlanError, RcubicError, Result};
use crate::exec::Executor;
use crate::plan::Plan;
use crate::state::{RunSnapshot, RunView};
use crate::types::RunId;

use super::core::CoreRuntime;
use super::registry::RunRegistry;
use super::runtime::Runtime;
use super::{run_channel, EngineOptions, RunEvent};

/// Entry point for callers (CLI, checkin tool, services).
///
/// Validates plans, launches runs on the current Tokio runtime and keeps a
/// read-only view of every run until it is purged.
pub struct Engine<E: Executor> {
    executor: Arc<E>,
    options: EngineOptions,
    registry: RunRegistry,
}

impl<E: Executor> Engine<E> {
    pub fn new(executor: E, options: EngineOptions) -> Self {
        Self {
            executor: Arc::new(executor),
            options,
            registry: RunRegistry::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Validate `plan` and start a run of it.
    ///
    /// The dependency graph is built before anything else; on failure no
    /// run state is created. Must be called from within a Tokio runtime.
    pub fn submit(&self, plan: Plan) -> std::result::Result<RunHandle, PlanError> {
        let graph = build_graph(&plan)?;
        let run_id = RunId::new();

        let core = CoreRuntime::new(Arc::new(plan), Arc::new(graph), run_id, &self.options);
        let view = core.view();
        let (tx, rx) = run_channel();
        let runtime = Runtime::new(core, tx.clone(), rx, Arc::clone(&self.executor));

        self.registry.insert(view.clone());
        info!(run_id = %run_id, "run accepted");

        let join = tokio::spawn(runtime.run());

        Ok(RunHandle {
            run_id,
            view,
            abort: AbortHandle { tx },
            join,
        })
    }

    /// Read-only view of a run, if it has not been purged.
    pub fn view(&self, run_id: RunId) -> Option<RunView> {
        self.registry.get(run_id)
    }

    pub fn runs(&self) -> Vec<RunId> {
        self.registry.run_ids()
    }

    /// Forget a finished run.
    pub fn purge(&self, run_id: RunId) -> bool {
        self.registry.purge(run_id)
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }
}

/// Requests a run abort from outside the run's decision loop.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: mpsc::Sender<RunEvent>,
}

impl AbortHandle {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Ask the run to abort. A no-op if the run already finished.
    pub async fn abort(&self) {
        if self.tx.send(RunEvent::AbortRequested).await.is_err() {
            warn!("abort requested for a run that already finished");
        }
    }
}

/// A run in progress.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    view: RunView,
    abort: AbortHandle,
    join: JoinHandle<Result<RunSnapshot>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn view(&self) -> &RunView {
        &self.view
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Wait for the run to reach a terminal status.
    pub async fn wait(self) -> Result<RunSnapshot> {
        self.join
            .await
            .map_err(|e| RcubicError::Other(anyhow::anyhow!("run task failed: {e}")))?
    }
}
