//! Notification events — the envelope published to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client::ProviderRefs;
use crate::workflow::{StepId, StepStatus};

/// Summary attached to the completion event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub client_name: String,
    pub total_steps: usize,
    pub duration_secs: i64,
    /// Resources created across all steps.
    pub resources: ProviderRefs,
}

/// Variant-specific payload of a notification event.
///
/// Serialized with the envelope as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A step changed status.
    StepUpdate {
        step_id: StepId,
        step_status: StepStatus,
        progress_percentage: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_step: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    /// A step is waiting on a human decision.
    ApprovalRequest {
        step_id: StepId,
        approval_data: Value,
    },
    /// The whole workflow finished.
    OnboardingComplete {
        completed_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<CompletionSummary>,
    },
    /// Something went wrong; the workflow state explains the details.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_details: Option<Value>,
        message: String,
    },
}

/// Event envelope delivered to every observer of a client.
///
/// Ephemeral: events are never persisted, and observers who subscribe after
/// publication do not receive them. Late joiners query the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub client_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl NotificationEvent {
    pub fn new(client_id: Uuid, payload: EventPayload) -> Self {
        Self {
            client_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The wire name of this event's type tag.
    pub fn type_name(&self) -> &'static str {
        match self.payload {
            EventPayload::StepUpdate { .. } => "step_update",
            EventPayload::ApprovalRequest { .. } => "approval_request",
            EventPayload::OnboardingComplete { .. } => "onboarding_complete",
            EventPayload::Error { .. } => "error",
        }
    }
}
