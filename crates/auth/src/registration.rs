//! Sign-up form validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use clinicflow_core::{DomainError, EmailAddress};

use crate::{PasswordPolicy, PasswordPolicyError};

/// Metadata attached to a sign-up request.
///
/// The requested role is informational only: every new profile starts
/// pending and an administrator picks the role on approval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_role: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Password(#[from] PasswordPolicyError),
}

/// A sign-up request that passed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: EmailAddress,
    pub password: String,
    pub metadata: SignUpMetadata,
}

impl Registration {
    pub fn validate(
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
        policy: &PasswordPolicy,
    ) -> Result<Self, RegistrationError> {
        let display_name = metadata.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name is required").into());
        }

        let email = EmailAddress::parse(email)?;
        policy.check(password)?;

        Ok(Self {
            email,
            password: password.to_string(),
            metadata: SignUpMetadata {
                display_name,
                ..metadata
            },
        })
    }
}
