//! The per-client workflow task: drives one client through the step
//! catalogue, suspending at approval gates and publishing every transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::{Client, ClientStatus};
use crate::error::ExecutorError;
use crate::executor::StepContext;
use crate::hub::{CompletionSummary, EventPayload, NotificationEvent};
use crate::workflow::{StepArtifact, StepId, StepSpec, StepStatus};

use super::approval::ApprovalPayload;
use super::{EngineInner, WorkflowState};

/// Result of one step's work, before it is written back to the progress
/// record.
struct StepSuccess {
    artifact: Option<StepArtifact>,
    /// Approval feedback to keep on the step when the artifact came from an
    /// executor rather than the approval itself.
    feedback: Option<String>,
}

/// Drive the whole workflow for one client. Runs as its own tokio task; the
/// engine is the sole mutator of this client's state while it runs.
pub(crate) async fn run_workflow(inner: Arc<EngineInner>, client_id: Uuid) {
    let Some(state) = inner.workflow_state(client_id).await else {
        warn!(client_id = %client_id, "Workflow task started without registered state");
        return;
    };

    let total = inner.definition.len();
    for index in 0..total {
        let spec = inner.definition.steps()[index].clone();

        // Advance the cursor and start the step. `begin` is a no-op for
        // step 0, which `start` already marked in progress.
        let (client, percentage) = {
            let mut wf = state.write().await;
            wf.progress.current_step = index;
            wf.progress.steps[index].begin();
            (wf.client.clone(), wf.progress.progress_percentage)
        };
        inner.persist(&state).await;
        publish_step_update(
            &inner,
            client_id,
            spec.id,
            StepStatus::InProgress,
            percentage,
            Some(index),
            None,
        )
        .await;

        info!(client_id = %client_id, step = %spec.id, "Executing step");

        let outcome = if spec.requires_approval {
            run_approval_step(&inner, &state, &client, &spec).await
        } else {
            run_executor_step(&inner, &client, &spec).await
        };

        match outcome {
            Ok(success) => {
                let (percentage, metadata) = {
                    let mut wf = state.write().await;
                    wf.progress.steps[index].complete(success.artifact.clone());
                    if let Some(feedback) = success.feedback {
                        wf.progress.steps[index]
                            .extra
                            .insert("approval_feedback".to_string(), feedback.into());
                    }
                    wf.progress.recompute_percentage();
                    if let Some(ref artifact) = success.artifact {
                        artifact.record_into(&mut wf.client.provider_refs);
                    }
                    wf.client.updated_at = Utc::now();
                    let metadata = success
                        .artifact
                        .as_ref()
                        .and_then(|a| serde_json::to_value(a).ok());
                    (wf.progress.progress_percentage, metadata)
                };
                inner.persist(&state).await;
                publish_step_update(
                    &inner,
                    client_id,
                    spec.id,
                    StepStatus::Completed,
                    percentage,
                    None,
                    metadata,
                )
                .await;
            }
            Err(reason) => {
                fail_workflow(&inner, &state, &spec, index, reason).await;
                return;
            }
        }

        if inner.config.step_delay > Duration::ZERO && index + 1 < total {
            tokio::time::sleep(inner.config.step_delay).await;
        }
    }

    // Every step completed.
    let (summary, completed_at) = {
        let mut wf = state.write().await;
        wf.progress.finish();
        wf.client.set_status(ClientStatus::Completed);
        let completed_at = wf.progress.completed_at.unwrap_or_else(Utc::now);
        let duration_secs = wf
            .progress
            .started_at
            .map(|started| (completed_at - started).num_seconds())
            .unwrap_or(0);
        (
            CompletionSummary {
                client_name: wf.client.name.clone(),
                total_steps: total,
                duration_secs,
                resources: wf.client.provider_refs.clone(),
            },
            completed_at,
        )
    };
    inner.persist(&state).await;
    inner
        .hub
        .publish(NotificationEvent::new(
            client_id,
            EventPayload::OnboardingComplete {
                completed_at,
                summary: Some(summary),
            },
        ))
        .await;

    info!(client_id = %client_id, "Onboarding completed");
}

/// Run a non-gated step through its executor, retrying per policy.
async fn run_executor_step(
    inner: &EngineInner,
    client: &Client,
    spec: &StepSpec,
) -> Result<StepSuccess, String> {
    match execute_with_retry(inner, client, spec.id).await {
        Ok(artifact) => Ok(StepSuccess {
            artifact: Some(artifact),
            feedback: None,
        }),
        Err(reason) => Err(reason),
    }
}

/// Suspend at the approval gate, then act on the decision.
async fn run_approval_step(
    inner: &EngineInner,
    state: &Arc<RwLock<WorkflowState>>,
    client: &Client,
    spec: &StepSpec,
) -> Result<StepSuccess, String> {
    let payload = {
        let wf = state.read().await;
        approval_payload(&wf.client, &wf.progress.steps)
    };

    let Some(rx) = inner
        .gate
        .request(client.id, spec.id, payload.clone())
        .await
    else {
        // A pending approval already exists for this step; the original
        // suspension owns the receiver, so this task cannot also wait.
        return Err(format!("Approval already pending for step {}", spec.id));
    };

    let approval_data = serde_json::to_value(&payload)
        .unwrap_or_else(|_| serde_json::json!({ "client_name": client.name }));
    inner
        .hub
        .publish(NotificationEvent::new(
            client.id,
            EventPayload::ApprovalRequest {
                step_id: spec.id,
                approval_data,
            },
        ))
        .await;

    info!(client_id = %client.id, step = %spec.id, "Awaiting approval");

    let decision = match inner.config.approval_timeout {
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(received) => received,
            Err(_) => {
                inner.gate.expire(client.id, spec.id).await;
                return Err(format!(
                    "Approval timed out after {}s",
                    limit.as_secs()
                ));
            }
        },
        None => rx.await,
    };

    let decision = match decision {
        Ok(decision) => decision,
        // Sender dropped without a decision (gate cancelled, e.g. on delete).
        Err(_) => return Err("Approval was cancelled".to_string()),
    };

    if !decision.approved {
        let reason = match decision.feedback {
            Some(feedback) => format!("Approval rejected: {feedback}"),
            None => "Approval rejected".to_string(),
        };
        return Err(reason);
    }

    // Approved. If the step has an executor its action still runs; otherwise
    // the approval itself is the step's success condition.
    if inner.executors.has(spec.id) {
        let artifact = execute_with_retry(inner, client, spec.id).await?;
        Ok(StepSuccess {
            artifact: Some(artifact),
            feedback: decision.feedback,
        })
    } else {
        Ok(StepSuccess {
            artifact: Some(StepArtifact::Approval {
                approved: true,
                feedback: decision.feedback,
            }),
            feedback: None,
        })
    }
}

/// Invoke the executor for a step with the engine's retry policy.
async fn execute_with_retry(
    inner: &EngineInner,
    client: &Client,
    step: StepId,
) -> Result<StepArtifact, String> {
    let Some(executor) = inner.executors.get(step) else {
        return Err(ExecutorError::NotRegistered { step }.to_string());
    };

    let ctx = StepContext {
        client: client.clone(),
        step,
    };
    let policy = &inner.config.retry;
    let mut last_error = String::new();

    for attempt in 0..policy.max_attempts.max(1) {
        if attempt > 0 {
            let delay = jittered(policy.backoff_ceiling(attempt - 1));
            warn!(
                client_id = %client.id,
                step = %step,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying step after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match executor.execute(&ctx).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => {
                warn!(client_id = %client.id, step = %step, attempt, error = %e, "Step attempt failed");
                last_error = e.to_string();
            }
        }
    }

    if policy.max_attempts > 1 {
        Err(ExecutorError::RetriesExhausted {
            step,
            attempts: policy.max_attempts,
            reason: last_error,
        }
        .to_string())
    } else {
        Err(last_error)
    }
}

/// Uniform jitter in `[0, ceiling]`.
fn jittered(ceiling: Duration) -> Duration {
    let ceiling_ms = ceiling.as_millis() as u64;
    if ceiling_ms == 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(0..=ceiling_ms);
    Duration::from_millis(ms)
}

/// Fail the current step, mark the workflow failed, and publish both the
/// step update and an error event. No further steps run.
async fn fail_workflow(
    inner: &EngineInner,
    state: &Arc<RwLock<WorkflowState>>,
    spec: &StepSpec,
    index: usize,
    reason: String,
) {
    let (client_id, percentage) = {
        let mut wf = state.write().await;
        wf.progress.steps[index].fail(&reason);
        wf.progress.recompute_percentage();
        wf.progress.abort();
        wf.client.set_status(ClientStatus::Failed);
        (wf.client.id, wf.progress.progress_percentage)
    };
    inner.persist(&state).await;

    publish_step_update(
        inner,
        client_id,
        spec.id,
        StepStatus::Failed,
        percentage,
        None,
        None,
    )
    .await;
    inner
        .hub
        .publish(NotificationEvent::new(
            client_id,
            EventPayload::Error {
                error_code: Some(format!(
                    "STEP_{}_FAILED",
                    spec.id.to_string().to_uppercase()
                )),
                error_details: Some(serde_json::json!({
                    "step_id": spec.id,
                    "error": reason,
                })),
                message: format!("Failed to complete step: {}", spec.name),
            },
        ))
        .await;

    error!(client_id = %client_id, step = %spec.id, reason = %reason, "Workflow failed");
}

async fn publish_step_update(
    inner: &EngineInner,
    client_id: Uuid,
    step_id: StepId,
    step_status: StepStatus,
    progress_percentage: u8,
    current_step: Option<usize>,
    metadata: Option<serde_json::Value>,
) {
    inner
        .hub
        .publish(NotificationEvent::new(
            client_id,
            EventPayload::StepUpdate {
                step_id,
                step_status,
                progress_percentage,
                current_step,
                metadata,
            },
        ))
        .await;
}

/// Build the payload the decision-maker sees, referencing the drafted
/// contract when that step has produced one.
fn approval_payload(
    client: &Client,
    steps: &[crate::workflow::OnboardingStep],
) -> ApprovalPayload {
    let mut payload = ApprovalPayload {
        client_name: client.name.clone(),
        project_scope: client.project_scope.clone(),
        message: format!(
            "Please review the contract for {} before proceeding.",
            client.name
        ),
        document_id: None,
        document_title: None,
        document_url: None,
    };

    let contract = steps
        .iter()
        .find(|s| s.id == StepId::DraftContract)
        .and_then(|s| s.artifact.as_ref());
    if let Some(StepArtifact::Contract {
        document_id,
        document_title,
        document_url,
        ..
    }) = contract
    {
        payload.document_id = Some(document_id.clone());
        payload.document_title = Some(document_title.clone());
        payload.document_url = Some(document_url.clone());
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientIntake, ProjectType};

    #[test]
    fn jitter_respects_ceiling() {
        for _ in 0..50 {
            let d = jittered(Duration::from_millis(20));
            assert!(d <= Duration::from_millis(20));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn approval_payload_includes_contract_when_drafted() {
        let client = Client::from_intake(ClientIntake {
            name: "Acme".into(),
            email: "a@example.com".into(),
            company: None,
            phone: None,
            project_type: ProjectType::Design,
            project_scope: "Rebrand everything end to end".into(),
            budget_range: None,
            timeline: None,
            additional_notes: None,
        });
        let definition = crate::workflow::WorkflowDefinition::standard();
        let mut progress = crate::workflow::OnboardingProgress::new(client.id, &definition);

        let bare = approval_payload(&client, &progress.steps);
        assert!(bare.document_url.is_none());
        assert!(bare.message.contains("Acme"));

        let draft = progress.step_mut(StepId::DraftContract).unwrap();
        draft.begin();
        draft.complete(Some(StepArtifact::Contract {
            document_id: "doc_1".into(),
            document_title: "Service Agreement - Acme".into(),
            document_url: "https://docs.example.com/d/doc_1".into(),
            template: "standard_service_agreement".into(),
        }));

        let with_contract = approval_payload(&client, &progress.steps);
        assert_eq!(with_contract.document_id.as_deref(), Some("doc_1"));
        assert_eq!(
            with_contract.document_url.as_deref(),
            Some("https://docs.example.com/d/doc_1")
        );
    }
}
