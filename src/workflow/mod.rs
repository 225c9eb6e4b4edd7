//! Workflow catalogue and per-client progress state.

pub mod definition;
pub mod progress;

pub use definition::{StepId, StepSpec, WorkflowDefinition};
pub use progress::{OnboardingProgress, OnboardingStep, StepArtifact, StepStatus};
