//! Per-client onboarding progress — step records and the aggregate view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::client::ClientStatus;

use super::definition::{StepId, WorkflowDefinition};

/// Status of a single workflow step.
///
/// Transitions are monotonic: Pending → InProgress → Completed | Failed.
/// A step never returns to Pending and never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Typed result of a completed step.
///
/// One variant per step kind, with the provider fields that step is known to
/// produce. Genuinely provider-specific extras go into the step's `extra`
/// map instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepArtifact {
    Workspace {
        folder_id: String,
        folder_name: String,
        folder_url: String,
    },
    Contract {
        document_id: String,
        document_title: String,
        document_url: String,
        template: String,
    },
    MessagingChannel {
        channel_id: String,
        channel_name: String,
        platform: String,
        invite_url: String,
    },
    Repository {
        repository_url: String,
        repository_name: String,
        default_branch: String,
    },
    ProjectBoard {
        board_id: String,
        board_title: String,
        board_url: String,
    },
    WelcomeEmail {
        recipient: String,
        subject: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meeting_link: Option<String>,
    },
    Billing {
        customer_id: String,
        invoice_id: String,
        invoice_url: String,
    },
    Approval {
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
    },
}

impl StepArtifact {
    /// Record this artifact's provider identifiers on the client.
    pub fn record_into(&self, refs: &mut crate::client::ProviderRefs) {
        match self {
            Self::Workspace { folder_id, .. } => {
                refs.workspace_folder_id = Some(folder_id.clone());
            }
            Self::Contract { document_id, .. } => {
                refs.contract_doc_id = Some(document_id.clone());
            }
            Self::MessagingChannel { channel_id, .. } => {
                refs.channel_id = Some(channel_id.clone());
            }
            Self::Repository { repository_url, .. } => {
                refs.repository_url = Some(repository_url.clone());
            }
            Self::ProjectBoard { board_id, .. } => {
                refs.board_id = Some(board_id.clone());
            }
            Self::Billing {
                customer_id,
                invoice_id,
                ..
            } => {
                refs.billing_customer_id = Some(customer_id.clone());
                refs.invoice_id = Some(invoice_id.clone());
            }
            Self::WelcomeEmail { .. } | Self::Approval { .. } => {}
        }
    }
}

/// One step of a client's onboarding, instantiated from the definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingStep {
    pub id: StepId,
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Typed result of the step, set exactly once on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<StepArtifact>,
    /// Provider-specific extras with no fixed schema.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl OnboardingStep {
    /// Move Pending → InProgress and stamp `started_at`.
    /// Returns false (and changes nothing) for any other starting state.
    pub fn begin(&mut self) -> bool {
        if self.status != StepStatus::Pending {
            return false;
        }
        self.status = StepStatus::InProgress;
        self.started_at = Some(Utc::now());
        true
    }

    /// Move InProgress → Completed with the step's artifact.
    /// Returns false if the step is not in progress.
    pub fn complete(&mut self, artifact: Option<StepArtifact>) -> bool {
        if self.status != StepStatus::InProgress {
            return false;
        }
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.artifact = artifact;
        true
    }

    /// Move InProgress → Failed with an error message.
    /// Returns false if the step is already terminal or still pending.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status != StepStatus::InProgress {
            return false;
        }
        self.status = StepStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
        true
    }
}

/// Aggregate onboarding view for one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub client_id: Uuid,
    /// Fixed-length, same order as the workflow definition.
    pub steps: Vec<OnboardingStep>,
    /// Index of the step the cursor is at; equals `steps.len()` only once
    /// the whole workflow completed.
    pub current_step: usize,
    pub overall_status: ClientStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// `round(100 * completed / total)`, always in 0..=100.
    pub progress_percentage: u8,
}

impl OnboardingProgress {
    /// Instantiate a fresh progress record from the workflow definition,
    /// all steps pending.
    pub fn new(client_id: Uuid, definition: &WorkflowDefinition) -> Self {
        let steps = definition
            .steps()
            .iter()
            .map(|spec| OnboardingStep {
                id: spec.id,
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                status: StepStatus::Pending,
                started_at: None,
                completed_at: None,
                error_message: None,
                artifact: None,
                extra: Map::new(),
            })
            .collect();
        Self {
            client_id,
            steps,
            current_step: 0,
            overall_status: ClientStatus::Pending,
            started_at: None,
            completed_at: None,
            progress_percentage: 0,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&OnboardingStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: StepId) -> Option<&mut OnboardingStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Recompute the percentage from completed steps.
    /// Rounds half away from zero: 3 of 8 → 38.
    pub fn recompute_percentage(&mut self) {
        let total = self.steps.len();
        if total == 0 {
            self.progress_percentage = 0;
            return;
        }
        let ratio = self.completed_steps() as f64 / total as f64;
        self.progress_percentage = (ratio * 100.0).round() as u8;
    }

    /// Mark the whole workflow started.
    pub fn begin(&mut self) {
        self.overall_status = ClientStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Mark the whole workflow completed. Valid only once every step is
    /// completed; the cursor moves past the last step.
    pub fn finish(&mut self) {
        debug_assert!(self.completed_steps() == self.steps.len());
        self.current_step = self.steps.len();
        self.overall_status = ClientStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress_percentage = 100;
    }

    /// Mark the whole workflow failed. The cursor stays at the failed step.
    pub fn abort(&mut self) {
        self.overall_status = ClientStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.overall_status,
            ClientStatus::Completed | ClientStatus::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> OnboardingProgress {
        OnboardingProgress::new(Uuid::new_v4(), &WorkflowDefinition::standard())
    }

    #[test]
    fn new_progress_all_pending() {
        let progress = fresh();
        assert_eq!(progress.steps.len(), 8);
        assert!(progress.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(progress.current_step, 0);
        assert_eq!(progress.progress_percentage, 0);
        assert_eq!(progress.overall_status, ClientStatus::Pending);
    }

    #[test]
    fn step_transitions_are_monotonic() {
        let mut progress = fresh();
        let step = &mut progress.steps[0];

        assert!(step.begin());
        assert!(step.started_at.is_some());
        // Cannot begin twice
        assert!(!step.begin());

        assert!(step.complete(None));
        assert!(step.completed_at.is_some());
        // Terminal: cannot fail or re-complete
        assert!(!step.fail("late error"));
        assert!(!step.complete(None));
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn pending_step_cannot_complete_or_fail() {
        let mut progress = fresh();
        let step = &mut progress.steps[0];
        assert!(!step.complete(None));
        assert!(!step.fail("nope"));
        assert_eq!(step.status, StepStatus::Pending);
    }

    #[test]
    fn failed_step_records_error() {
        let mut progress = fresh();
        let step = &mut progress.steps[2];
        step.begin();
        assert!(step.fail("provider said no"));
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error_message.as_deref(), Some("provider said no"));
    }

    #[test]
    fn percentage_rounds_half_away_from_zero() {
        let mut progress = fresh();
        // Complete 3 of 8 → 37.5 → 38
        for i in 0..3 {
            progress.steps[i].begin();
            progress.steps[i].complete(None);
        }
        progress.recompute_percentage();
        assert_eq!(progress.progress_percentage, 38);
    }

    #[test]
    fn percentage_bounds() {
        let mut progress = fresh();
        progress.recompute_percentage();
        assert_eq!(progress.progress_percentage, 0);

        for step in &mut progress.steps {
            step.begin();
            step.complete(None);
        }
        progress.recompute_percentage();
        assert_eq!(progress.progress_percentage, 100);
    }

    #[test]
    fn finish_moves_cursor_past_last_step() {
        let mut progress = fresh();
        progress.begin();
        for step in &mut progress.steps {
            step.begin();
            step.complete(None);
        }
        progress.recompute_percentage();
        progress.finish();
        assert_eq!(progress.current_step, progress.steps.len());
        assert_eq!(progress.overall_status, ClientStatus::Completed);
        assert!(progress.completed_at.is_some());
    }

    #[test]
    fn abort_keeps_cursor_at_failed_step() {
        let mut progress = fresh();
        progress.begin();
        progress.current_step = 2;
        progress.steps[0].begin();
        progress.steps[0].complete(None);
        progress.steps[1].begin();
        progress.steps[1].complete(None);
        progress.steps[2].begin();
        progress.steps[2].fail("rejected");
        progress.recompute_percentage();
        progress.abort();

        assert_eq!(progress.current_step, 2);
        assert_eq!(progress.overall_status, ClientStatus::Failed);
        assert_eq!(progress.progress_percentage, 25);
        assert!(progress.steps[3..]
            .iter()
            .all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn artifact_serde_is_tagged_by_kind() {
        let artifact = StepArtifact::Repository {
            repository_url: "https://github.com/org/repo".into(),
            repository_name: "repo".into(),
            default_branch: "main".into(),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"kind\":\"repository\""));

        let parsed: StepArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn approval_artifact_carries_feedback() {
        let artifact = StepArtifact::Approval {
            approved: true,
            feedback: Some("looks good".into()),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("looks good"));
    }

    #[test]
    fn artifacts_record_provider_refs() {
        let mut refs = crate::client::ProviderRefs::default();
        StepArtifact::Workspace {
            folder_id: "fld_1".into(),
            folder_name: "f".into(),
            folder_url: "u".into(),
        }
        .record_into(&mut refs);
        StepArtifact::Billing {
            customer_id: "cus_1".into(),
            invoice_id: "in_1".into(),
            invoice_url: "u".into(),
        }
        .record_into(&mut refs);

        assert_eq!(refs.workspace_folder_id.as_deref(), Some("fld_1"));
        assert_eq!(refs.billing_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(refs.invoice_id.as_deref(), Some("in_1"));
        // Approval leaves refs untouched
        let before = refs.clone();
        StepArtifact::Approval {
            approved: true,
            feedback: None,
        }
        .record_into(&mut refs);
        assert_eq!(refs, before);
    }

    #[test]
    fn progress_serde_roundtrip() {
        let mut progress = fresh();
        progress.begin();
        progress.steps[0].begin();
        progress.steps[0].complete(Some(StepArtifact::Workspace {
            folder_id: "fld_1".into(),
            folder_name: "Acme - Web Development Project".into(),
            folder_url: "https://drive.example.com/fld_1".into(),
        }));
        progress.recompute_percentage();

        let json = serde_json::to_string(&progress).unwrap();
        let parsed: OnboardingProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.client_id, progress.client_id);
        assert_eq!(parsed.steps.len(), 8);
        assert_eq!(parsed.steps[0].status, StepStatus::Completed);
        assert_eq!(parsed.progress_percentage, 13);
    }
}
