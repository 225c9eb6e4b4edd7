//! Orchestration engine — one sequential workflow task per client.

pub mod approval;
pub(crate) mod runner;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalPayload};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{Client, ClientIntake, ClientStatus};
use crate::config::EngineConfig;
use crate::error::{Error, Result, WorkflowError};
use crate::executor::ExecutorRegistry;
use crate::hub::NotificationHub;
use crate::store::{ClientPage, OnboardingStore};
use crate::workflow::{OnboardingProgress, StepId, WorkflowDefinition};

/// Live state of one client's workflow: the record pair the engine mutates.
pub(crate) struct WorkflowState {
    pub client: Client,
    pub progress: OnboardingProgress,
}

pub(crate) struct EngineInner {
    pub config: EngineConfig,
    pub definition: WorkflowDefinition,
    pub executors: ExecutorRegistry,
    pub store: Arc<dyn OnboardingStore>,
    pub hub: Arc<NotificationHub>,
    pub gate: ApprovalGate,
    /// One lock per client id; the owning task writes, status reads.
    workflows: RwLock<HashMap<Uuid, Arc<RwLock<WorkflowState>>>>,
    /// Running workflow tasks, for abort-on-delete.
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl EngineInner {
    pub(crate) async fn workflow_state(&self, client_id: Uuid) -> Option<Arc<RwLock<WorkflowState>>> {
        self.workflows.read().await.get(&client_id).cloned()
    }

    /// Write the current state through to the store. Persistence failures
    /// are logged, not fatal: the in-memory state stays authoritative for
    /// the life of the process.
    pub(crate) async fn persist(&self, state: &Arc<RwLock<WorkflowState>>) {
        let (client, progress) = {
            let wf = state.read().await;
            (wf.client.clone(), wf.progress.clone())
        };
        if let Err(e) = self.store.upsert_client(&client).await {
            warn!(client_id = %client.id, error = %e, "Failed to persist client");
        }
        if let Err(e) = self.store.upsert_progress(&progress).await {
            warn!(client_id = %client.id, error = %e, "Failed to persist progress");
        }
    }
}

/// The onboarding orchestration engine.
///
/// Owns all per-client workflow state. Cheap to clone; clones share the
/// same engine.
#[derive(Clone)]
pub struct OnboardingEngine {
    inner: Arc<EngineInner>,
}

impl OnboardingEngine {
    pub fn new(
        config: EngineConfig,
        definition: WorkflowDefinition,
        executors: ExecutorRegistry,
        store: Arc<dyn OnboardingStore>,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new(config.event_buffer));
        Self {
            inner: Arc::new(EngineInner {
                config,
                definition,
                executors,
                store,
                hub,
                gate: ApprovalGate::new(),
                workflows: RwLock::new(HashMap::new()),
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The notification hub observers subscribe through.
    pub fn hub(&self) -> Arc<NotificationHub> {
        Arc::clone(&self.inner.hub)
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.inner.definition
    }

    /// Validate intake, create the client and its progress record, and kick
    /// off asynchronous execution of the first step.
    ///
    /// Returns immediately with the initial snapshot: step 0 already
    /// `in_progress`, everything else `pending`.
    pub async fn start(&self, intake: ClientIntake) -> Result<(Client, OnboardingProgress)> {
        let intake = intake.validate()?;

        let mut client = Client::from_intake(intake);
        let mut progress = OnboardingProgress::new(client.id, &self.inner.definition);
        progress.begin();
        if let Some(first) = progress.steps.first_mut() {
            first.begin();
        }
        client.set_status(ClientStatus::InProgress);

        self.inner.store.upsert_client(&client).await?;
        self.inner.store.upsert_progress(&progress).await?;

        let state = Arc::new(RwLock::new(WorkflowState {
            client: client.clone(),
            progress: progress.clone(),
        }));
        self.inner
            .workflows
            .write()
            .await
            .insert(client.id, state);

        let inner = Arc::clone(&self.inner);
        let client_id = client.id;
        let handle = tokio::spawn(async move {
            runner::run_workflow(inner, client_id).await;
        });
        self.inner.tasks.lock().await.insert(client_id, handle);

        info!(client_id = %client_id, name = %client.name, "Onboarding started");
        Ok((client, progress))
    }

    /// Current snapshot for a client.
    ///
    /// Reads the live state when the workflow is (or was) held in memory,
    /// falling back to the store after a restart.
    pub async fn status(&self, client_id: Uuid) -> Result<(Client, OnboardingProgress)> {
        if let Some(state) = self.inner.workflow_state(client_id).await {
            let wf = state.read().await;
            return Ok((wf.client.clone(), wf.progress.clone()));
        }

        let client = self
            .inner
            .store
            .get_client(client_id)
            .await?
            .ok_or(WorkflowError::ClientNotFound { id: client_id })?;
        let progress = self
            .inner
            .store
            .get_progress(client_id)
            .await?
            .ok_or(WorkflowError::ClientNotFound { id: client_id })?;
        Ok((client, progress))
    }

    /// Forward an approval decision to the gate.
    pub async fn decide(
        &self,
        client_id: Uuid,
        step: StepId,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<()> {
        // Unknown clients are a not-found, not an invalid approval state.
        if self.inner.workflow_state(client_id).await.is_none()
            && self.inner.store.get_client(client_id).await?.is_none()
        {
            return Err(WorkflowError::ClientNotFound { id: client_id }.into());
        }

        self.inner
            .gate
            .decide(client_id, step, ApprovalDecision { approved, feedback })
            .await
            .map_err(Error::from)
    }

    /// List clients from the store, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<ClientStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<ClientPage> {
        Ok(self.inner.store.list_clients(status, limit, offset).await?)
    }

    /// Administrative removal of a client and everything attached to it.
    ///
    /// Aborts the workflow task if it is still running — deletion is the
    /// only cancellation path the engine has.
    pub async fn delete(&self, client_id: Uuid) -> Result<Client> {
        if let Some(handle) = self.inner.tasks.lock().await.remove(&client_id)
            && !handle.is_finished()
        {
            warn!(client_id = %client_id, "Aborting in-flight workflow task on delete");
            handle.abort();
        }
        self.inner.gate.cancel_client(client_id).await;

        let in_memory = self.inner.workflows.write().await.remove(&client_id);
        let client = match in_memory {
            Some(state) => Some(state.read().await.client.clone()),
            None => self.inner.store.get_client(client_id).await?,
        };

        self.inner.store.delete_client(client_id).await?;
        self.inner.hub.remove(client_id).await;

        match client {
            Some(client) => {
                info!(client_id = %client_id, name = %client.name, "Client deleted");
                Ok(client)
            }
            None => Err(WorkflowError::ClientNotFound { id: client_id }.into()),
        }
    }

    /// Wait for a client's workflow task to finish (test helper).
    #[doc(hidden)]
    pub async fn join_workflow(&self, client_id: Uuid) {
        let handle = self.inner.tasks.lock().await.remove(&client_id);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
