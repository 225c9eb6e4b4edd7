//! The workflow definition — the ordered step catalogue shared by all clients.

use serde::{Deserialize, Serialize};

/// Identifier of a workflow step. Closed set; the step order is fixed by
/// [`WorkflowDefinition::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    CreateWorkspace,
    DraftContract,
    ContractReview,
    CreateChannel,
    CreateRepository,
    CreateBoard,
    SendWelcome,
    SetupBilling,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateWorkspace => "create_workspace",
            Self::DraftContract => "draft_contract",
            Self::ContractReview => "contract_review",
            Self::CreateChannel => "create_channel",
            Self::CreateRepository => "create_repository",
            Self::CreateBoard => "create_board",
            Self::SendWelcome => "send_welcome",
            Self::SetupBilling => "setup_billing",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StepId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_workspace" => Ok(Self::CreateWorkspace),
            "draft_contract" => Ok(Self::DraftContract),
            "contract_review" => Ok(Self::ContractReview),
            "create_channel" => Ok(Self::CreateChannel),
            "create_repository" => Ok(Self::CreateRepository),
            "create_board" => Ok(Self::CreateBoard),
            "send_welcome" => Ok(Self::SendWelcome),
            "setup_billing" => Ok(Self::SetupBilling),
            _ => Err(format!("Unknown step id: {}", s)),
        }
    }
}

/// Specification of one workflow step.
#[derive(Debug, Clone, Serialize)]
pub struct StepSpec {
    pub id: StepId,
    pub name: &'static str,
    pub description: &'static str,
    /// Whether the step suspends for a human decision before completing.
    pub requires_approval: bool,
    /// Rough duration estimate surfaced to dashboards, in seconds.
    pub estimated_secs: u32,
}

/// The ordered, immutable catalogue of onboarding steps.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    /// The standard client-onboarding workflow.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                StepSpec {
                    id: StepId::CreateWorkspace,
                    name: "Create Workspace Folder",
                    description: "Setting up a dedicated project folder in the document workspace",
                    requires_approval: false,
                    estimated_secs: 30,
                },
                StepSpec {
                    id: StepId::DraftContract,
                    name: "Draft Contract",
                    description: "Generating the project service agreement",
                    requires_approval: false,
                    estimated_secs: 60,
                },
                StepSpec {
                    id: StepId::ContractReview,
                    name: "Contract Review",
                    description: "Waiting for human approval of the drafted contract",
                    requires_approval: true,
                    estimated_secs: 0,
                },
                StepSpec {
                    id: StepId::CreateChannel,
                    name: "Setup Communication",
                    description: "Creating the project messaging channel",
                    requires_approval: false,
                    estimated_secs: 45,
                },
                StepSpec {
                    id: StepId::CreateRepository,
                    name: "Create Repository",
                    description: "Setting up the project source repository",
                    requires_approval: false,
                    estimated_secs: 40,
                },
                StepSpec {
                    id: StepId::CreateBoard,
                    name: "Setup Project Board",
                    description: "Creating the project management board",
                    requires_approval: false,
                    estimated_secs: 50,
                },
                StepSpec {
                    id: StepId::SendWelcome,
                    name: "Send Welcome Email",
                    description: "Sending the welcome email with a kickoff invite",
                    requires_approval: false,
                    estimated_secs: 35,
                },
                StepSpec {
                    id: StepId::SetupBilling,
                    name: "Setup Billing",
                    description: "Creating the billing customer and initial invoice",
                    requires_approval: false,
                    estimated_secs: 45,
                },
            ],
        }
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Position of a step in the workflow, if it is part of it.
    pub fn index_of(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn spec(&self, id: StepId) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == id)
    }
}

impl Default for WorkflowDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn standard_has_eight_ordered_steps() {
        let def = WorkflowDefinition::standard();
        assert_eq!(def.len(), 8);
        assert_eq!(def.steps()[0].id, StepId::CreateWorkspace);
        assert_eq!(def.steps()[7].id, StepId::SetupBilling);
    }

    #[test]
    fn only_contract_review_requires_approval() {
        let def = WorkflowDefinition::standard();
        let gated: Vec<StepId> = def
            .steps()
            .iter()
            .filter(|s| s.requires_approval)
            .map(|s| s.id)
            .collect();
        assert_eq!(gated, vec![StepId::ContractReview]);
    }

    #[test]
    fn index_of_matches_order() {
        let def = WorkflowDefinition::standard();
        for (i, spec) in def.steps().iter().enumerate() {
            assert_eq!(def.index_of(spec.id), Some(i));
        }
    }

    #[test]
    fn step_id_display_matches_serde() {
        let ids = [
            StepId::CreateWorkspace,
            StepId::DraftContract,
            StepId::ContractReview,
            StepId::CreateChannel,
            StepId::CreateRepository,
            StepId::CreateBoard,
            StepId::SendWelcome,
            StepId::SetupBilling,
        ];
        for id in ids {
            let display = format!("{id}");
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(format!("\"{display}\""), json);
            assert_eq!(StepId::from_str(&display).unwrap(), id);
        }
    }
}
