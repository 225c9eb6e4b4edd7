//! Error types for ClientFlow.

use uuid::Uuid;

use crate::workflow::StepId;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Intake validation errors — rejected before any state is created.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Name must be {min}-{max} characters, got {got}")]
    NameLength { min: usize, max: usize, got: usize },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Company name exceeds {max} characters")]
    CompanyTooLong { max: usize },

    #[error("Project scope must be {min}-{max} characters, got {got}")]
    ScopeLength { min: usize, max: usize, got: usize },

    #[error("Additional notes exceed {max} characters")]
    NotesTooLong { max: usize },
}

/// Workflow state errors — unknown references or structurally impossible
/// operations given the current state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("Client {id} not found")]
    ClientNotFound { id: Uuid },

    #[error("Step {step} not part of the workflow for client {client_id}")]
    StepNotFound { client_id: Uuid, step: String },

    #[error("No approval pending for client {client_id} step {step}")]
    NoPendingApproval { client_id: Uuid, step: StepId },

    #[error("Approval for client {client_id} step {step} was already decided")]
    AlreadyDecided { client_id: Uuid, step: StepId },

    #[error("Workflow for client {client_id} is no longer active")]
    NotActive { client_id: Uuid },
}

impl WorkflowError {
    /// Whether this error means "the referenced thing does not exist"
    /// (as opposed to "it exists but the operation is invalid right now").
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ClientNotFound { .. } | Self::StepNotFound { .. }
        )
    }
}

/// Step executor errors — captured on the failing step and fatal to the
/// owning workflow.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("No executor registered for step {step}")]
    NotRegistered { step: StepId },

    #[error("Step {step} failed: {reason}")]
    Failed { step: StepId, reason: String },

    #[error("Step {step} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        step: StepId,
        attempts: u32,
        reason: String,
    },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
