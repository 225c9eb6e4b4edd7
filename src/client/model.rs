//! Client data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::intake::ClientIntake;

/// Kind of project the client is onboarding for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    WebDevelopment,
    MobileApp,
    Design,
    Marketing,
    Consulting,
    Other,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebDevelopment => write!(f, "web_development"),
            Self::MobileApp => write!(f, "mobile_app"),
            Self::Design => write!(f, "design"),
            Self::Marketing => write!(f, "marketing"),
            Self::Consulting => write!(f, "consulting"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for ProjectType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_development" => Ok(Self::WebDevelopment),
            "mobile_app" => Ok(Self::MobileApp),
            "design" => Ok(Self::Design),
            "marketing" => Ok(Self::Marketing),
            "consulting" => Ok(Self::Consulting),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown project type: {}", s)),
        }
    }
}

impl ProjectType {
    /// Human-readable label, e.g. "Web Development".
    pub fn label(&self) -> &'static str {
        match self {
            Self::WebDevelopment => "Web Development",
            Self::MobileApp => "Mobile App",
            Self::Design => "Design",
            Self::Marketing => "Marketing",
            Self::Consulting => "Consulting",
            Self::Other => "Other",
        }
    }
}

/// Overall onboarding status of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ClientStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown client status: {}", s)),
        }
    }
}

/// Provider identifiers produced by completed workflow steps.
///
/// Each field is populated exactly once, when its step completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
}

impl ProviderRefs {
    /// Whether any provider resource has been recorded yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Client record with onboarding tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub project_type: ProjectType,
    pub project_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    pub status: ClientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Resources created by completed steps.
    #[serde(default, skip_serializing_if = "ProviderRefs::is_empty")]
    pub provider_refs: ProviderRefs,
}

impl Client {
    /// Create a new pending client from validated intake.
    pub fn from_intake(intake: ClientIntake) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: intake.name,
            email: intake.email,
            company: intake.company,
            phone: intake.phone,
            project_type: intake.project_type,
            project_scope: intake.project_scope,
            budget_range: intake.budget_range,
            timeline: intake.timeline,
            additional_notes: intake.additional_notes,
            status: ClientStatus::Pending,
            created_at: now,
            updated_at: now,
            provider_refs: ProviderRefs::default(),
        }
    }

    /// Update the overall status and bump `updated_at`.
    pub fn set_status(&mut self, status: ClientStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
