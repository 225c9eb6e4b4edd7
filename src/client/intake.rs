//! Intake form — the data a prospective client submits, plus validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::model::ProjectType;

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 100;
pub const COMPANY_MAX: usize = 100;
pub const SCOPE_MIN: usize = 10;
pub const SCOPE_MAX: usize = 1000;
pub const NOTES_MAX: usize = 500;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

/// Client intake form submitted to start onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIntake {
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
}

impl ClientIntake {
    /// Validate field constraints, trimming the free-text fields.
    ///
    /// Returns the normalized intake on success; nothing is persisted before
    /// this passes.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.name = self.name.trim().to_string();
        let name_len = self.name.chars().count();
        if name_len < NAME_MIN || name_len > NAME_MAX {
            return Err(ValidationError::NameLength {
                min: NAME_MIN,
                max: NAME_MAX,
                got: name_len,
            });
        }

        self.email = self.email.trim().to_string();
        if !email_regex().is_match(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }

        if let Some(company) = &self.company
            && company.chars().count() > COMPANY_MAX
        {
            return Err(ValidationError::CompanyTooLong { max: COMPANY_MAX });
        }

        self.project_scope = self.project_scope.trim().to_string();
        let scope_len = self.project_scope.chars().count();
        if scope_len < SCOPE_MIN || scope_len > SCOPE_MAX {
            return Err(ValidationError::ScopeLength {
                min: SCOPE_MIN,
                max: SCOPE_MAX,
                got: scope_len,
            });
        }

        if let Some(notes) = &self.additional_notes
            && notes.chars().count() > NOTES_MAX
        {
            return Err(ValidationError::NotesTooLong { max: NOTES_MAX });
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ClientIntake {
        ClientIntake {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            company: None,
            phone: None,
            project_type: ProjectType::WebDevelopment,
            project_scope: "A marketing site with a blog and contact form".into(),
            budget_range: None,
            timeline: None,
            additional_notes: None,
        }
    }

    #[test]
    fn valid_intake_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn name_is_trimmed() {
        let intake = ClientIntake {
            name: "  Jane Doe  ".into(),
            ..valid()
        };
        let validated = intake.validate().unwrap();
        assert_eq!(validated.name, "Jane Doe");
    }

    #[test]
    fn short_name_rejected() {
        let intake = ClientIntake {
            name: "J".into(),
            ..valid()
        };
        assert!(matches!(
            intake.validate(),
            Err(ValidationError::NameLength { got: 1, .. })
        ));
    }

    #[test]
    fn whitespace_name_rejected() {
        let intake = ClientIntake {
            name: "   ".into(),
            ..valid()
        };
        assert!(matches!(
            intake.validate(),
            Err(ValidationError::NameLength { got: 0, .. })
        ));
    }

    #[test]
    fn bad_email_rejected() {
        for email in ["not-an-email", "a@b", "a b@c.com", "@example.com"] {
            let intake = ClientIntake {
                email: email.into(),
                ..valid()
            };
            assert!(
                matches!(intake.validate(), Err(ValidationError::InvalidEmail(_))),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn short_scope_rejected() {
        let intake = ClientIntake {
            project_scope: "too short".into(),
            ..valid()
        };
        assert!(matches!(
            intake.validate(),
            Err(ValidationError::ScopeLength { .. })
        ));
    }

    #[test]
    fn long_scope_rejected() {
        let intake = ClientIntake {
            project_scope: "x".repeat(SCOPE_MAX + 1),
            ..valid()
        };
        assert!(matches!(
            intake.validate(),
            Err(ValidationError::ScopeLength { .. })
        ));
    }

    #[test]
    fn long_notes_rejected() {
        let intake = ClientIntake {
            additional_notes: Some("n".repeat(NOTES_MAX + 1)),
            ..valid()
        };
        assert!(matches!(
            intake.validate(),
            Err(ValidationError::NotesTooLong { .. })
        ));
    }

    #[test]
    fn intake_deserializes_without_optionals() {
        let json = r#"{
            "name": "Jane Doe",
            "email": "jane@example.com",
            "project_type": "design",
            "project_scope": "Brand refresh for a coffee roaster"
        }"#;
        let intake: ClientIntake = serde_json::from_str(json).unwrap();
        assert_eq!(intake.project_type, ProjectType::Design);
        assert!(intake.company.is_none());
        assert!(intake.validate().is_ok());
    }
}
