//! Simulated provider executors.
//!
//! Stand-ins for the real provisioning providers: each produces a realistic
//! artifact with generated identifiers after an optional delay. They let the
//! service run end-to-end without any provider credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ExecutorError;
use crate::workflow::{StepArtifact, StepId};

use super::{ExecutorRegistry, StepContext, StepExecutor};

/// Short hex tag for generated identifiers, e.g. `fld_3fa9c1d2`.
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Lower-kebab form of a client name for channel/repo slugs.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Creates the client's workspace folder.
pub struct WorkspaceExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for WorkspaceExecutor {
    fn step(&self) -> StepId {
        StepId::CreateWorkspace
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let folder_id = format!("fld_{}", short_id());
        Ok(StepArtifact::Workspace {
            folder_name: format!(
                "{} - {} Project",
                ctx.client.name,
                ctx.client.project_type.label()
            ),
            folder_url: format!("https://drive.example.com/folders/{folder_id}"),
            folder_id,
        })
    }
}

/// Drafts the service agreement document.
pub struct ContractExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for ContractExecutor {
    fn step(&self) -> StepId {
        StepId::DraftContract
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let document_id = format!("doc_{}", short_id());
        Ok(StepArtifact::Contract {
            document_title: format!("Service Agreement - {}", ctx.client.name),
            document_url: format!("https://docs.example.com/d/{document_id}"),
            template: "standard_service_agreement".to_string(),
            document_id,
        })
    }
}

/// Creates the project messaging channel.
pub struct ChannelExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for ChannelExecutor {
    fn step(&self) -> StepId {
        StepId::CreateChannel
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let channel_id = format!("C{}", short_id().to_uppercase());
        Ok(StepArtifact::MessagingChannel {
            channel_name: format!("project-{}", slugify(&ctx.client.name)),
            platform: "slack".to_string(),
            invite_url: format!("https://chat.example.com/channels/{channel_id}"),
            channel_id,
        })
    }
}

/// Creates the project source repository.
pub struct RepositoryExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for RepositoryExecutor {
    fn step(&self) -> StepId {
        StepId::CreateRepository
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let repository_name = format!("{}-project", slugify(&ctx.client.name));
        Ok(StepArtifact::Repository {
            repository_url: format!("https://github.com/example-org/{repository_name}"),
            repository_name,
            default_branch: "main".to_string(),
        })
    }
}

/// Creates the project management board.
pub struct BoardExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for BoardExecutor {
    fn step(&self) -> StepId {
        StepId::CreateBoard
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let board_id = format!("brd_{}", short_id());
        Ok(StepArtifact::ProjectBoard {
            board_title: format!("{} - Project Board", ctx.client.name),
            board_url: format!("https://boards.example.com/{board_id}"),
            board_id,
        })
    }
}

/// Sends the welcome email with the kickoff invite.
pub struct WelcomeEmailExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for WelcomeEmailExecutor {
    fn step(&self) -> StepId {
        StepId::SendWelcome
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        Ok(StepArtifact::WelcomeEmail {
            recipient: ctx.client.email.clone(),
            subject: format!("Welcome to your project, {}!", ctx.client.name),
            meeting_link: Some(format!(
                "https://meet.example.com/{}",
                short_id()
            )),
        })
    }
}

/// Creates the billing customer and initial invoice.
pub struct BillingExecutor {
    pub delay: Duration,
}

#[async_trait]
impl StepExecutor for BillingExecutor {
    fn step(&self) -> StepId {
        StepId::SetupBilling
    }

    async fn execute(&self, _ctx: &StepContext) -> Result<StepArtifact, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let invoice_id = format!("in_{}", short_id());
        Ok(StepArtifact::Billing {
            customer_id: format!("cus_{}", short_id()),
            invoice_url: format!("https://billing.example.com/invoices/{invoice_id}"),
            invoice_id,
        })
    }
}

/// Register the full simulated executor set.
///
/// `delay` paces each step for demos; pass `Duration::ZERO` in tests. The
/// contract-review step has no executor: approval alone completes it.
pub fn register_simulated(registry: &mut ExecutorRegistry, delay: Duration) {
    registry.register(Arc::new(WorkspaceExecutor { delay }));
    registry.register(Arc::new(ContractExecutor { delay }));
    registry.register(Arc::new(ChannelExecutor { delay }));
    registry.register(Arc::new(RepositoryExecutor { delay }));
    registry.register(Arc::new(BoardExecutor { delay }));
    registry.register(Arc::new(WelcomeEmailExecutor { delay }));
    registry.register(Arc::new(BillingExecutor { delay }));
}
