//! Approval gate — suspends a workflow at an approval-required step until
//! exactly one human decision arrives.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::workflow::StepId;

/// A human decision on a pending approval.
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub feedback: Option<String>,
}

/// What the decision-maker sees for a pending approval.
///
/// Known fields are typed; the contract reference is present once the
/// drafting step produced one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub client_name: String,
    pub project_scope: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}

struct PendingApproval {
    payload: ApprovalPayload,
    tx: oneshot::Sender<ApprovalDecision>,
}

/// Registry of approvals the engine is suspended on.
///
/// Each pending approval is consumed by exactly one decision; anything after
/// that fails with an invalid-state error.
#[derive(Default)]
pub struct ApprovalGate {
    pending: Mutex<HashMap<(Uuid, StepId), PendingApproval>>,
    /// Pairs that have already been decided (or expired). Kept so a second
    /// decision can be distinguished from one that never had an approval.
    resolved: Mutex<HashSet<(Uuid, StepId)>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending approval and return the receiver the workflow
    /// task awaits.
    ///
    /// Idempotent for a still-pending step: the payload is replaced and
    /// `None` is returned — the original suspension stays in place.
    pub async fn request(
        &self,
        client_id: Uuid,
        step: StepId,
        payload: ApprovalPayload,
    ) -> Option<oneshot::Receiver<ApprovalDecision>> {
        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.get_mut(&(client_id, step)) {
            debug!(client_id = %client_id, step = %step, "Approval re-requested; payload replaced");
            existing.payload = payload;
            return None;
        }

        let (tx, rx) = oneshot::channel();
        pending.insert((client_id, step), PendingApproval { payload, tx });
        info!(client_id = %client_id, step = %step, "Approval requested");
        Some(rx)
    }

    /// The payload of a pending approval, if any.
    pub async fn payload(&self, client_id: Uuid, step: StepId) -> Option<ApprovalPayload> {
        self.pending
            .lock()
            .await
            .get(&(client_id, step))
            .map(|p| p.payload.clone())
    }

    /// Deliver a decision to the suspended workflow.
    ///
    /// Exactly one decision is honored per pending approval; deciding a step
    /// that is not pending fails without touching any state.
    pub async fn decide(
        &self,
        client_id: Uuid,
        step: StepId,
        decision: ApprovalDecision,
    ) -> Result<(), WorkflowError> {
        let entry = {
            let mut pending = self.pending.lock().await;
            pending.remove(&(client_id, step))
        };

        let Some(entry) = entry else {
            if self.resolved.lock().await.contains(&(client_id, step)) {
                return Err(WorkflowError::AlreadyDecided { client_id, step });
            }
            return Err(WorkflowError::NoPendingApproval { client_id, step });
        };

        self.resolved.lock().await.insert((client_id, step));

        info!(
            client_id = %client_id,
            step = %step,
            approved = decision.approved,
            "Approval decided"
        );

        // The receiver only disappears if the workflow task is gone.
        entry
            .tx
            .send(decision)
            .map_err(|_| WorkflowError::NotActive { client_id })
    }

    /// Expire a pending approval that timed out. The workflow task calls
    /// this before failing the step; a later decision sees AlreadyDecided.
    pub async fn expire(&self, client_id: Uuid, step: StepId) {
        let removed = self.pending.lock().await.remove(&(client_id, step));
        if removed.is_some() {
            self.resolved.lock().await.insert((client_id, step));
            info!(client_id = %client_id, step = %step, "Pending approval expired");
        }
    }

    /// Drop every pending approval for a client (administrative removal).
    pub async fn cancel_client(&self, client_id: Uuid) {
        self.pending
            .lock()
            .await
            .retain(|(id, _), _| *id != client_id);
    }

    /// Whether an approval is currently pending for the pair.
    pub async fn is_pending(&self, client_id: Uuid, step: StepId) -> bool {
        self.pending.lock().await.contains_key(&(client_id, step))
    }
}
