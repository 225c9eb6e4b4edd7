//! Step executors — the seam between the engine and provisioning providers.

pub mod simulated;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::Client;
use crate::error::ExecutorError;
use crate::workflow::{StepArtifact, StepId};

/// Context handed to an executor for one step invocation.
///
/// Carries a snapshot of the client (including provider refs recorded by
/// earlier steps); executors never mutate engine state directly.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub client: Client,
    pub step: StepId,
}

/// One unit of provisioning work.
///
/// Implementations are responsible for their own timeouts; the engine treats
/// a returned error as the step's failure.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// The workflow step this executor handles.
    fn step(&self) -> StepId;

    /// Perform the work and return the step's artifact.
    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError>;
}

/// Registry mapping workflow steps to their executors.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<StepId, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for its step, replacing any previous one.
    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        let step = executor.step();
        self.executors.insert(step, executor);
        tracing::debug!(step = %step, "Registered step executor");
    }

    pub fn get(&self, step: StepId) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(&step).cloned()
    }

    pub fn has(&self, step: StepId) -> bool {
        self.executors.contains_key(&step)
    }

    pub fn count(&self) -> usize {
        self.executors.len()
    }
}
