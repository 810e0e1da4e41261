use serde::Serialize;
use thiserror::Error;

use crate::{Profile, RoleKind, StaffRole, StatusKind};

/// Approval decision derived from a profile's role and status.
///
/// This is the only place role and status are interpreted; everything else
/// (session store, route guard, admin screens) matches on this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Approval {
    /// Waiting for an administrator. The session stays open.
    Pending,
    /// Access granted at the given level.
    Approved(StaffRole),
    /// Access refused. The session must be closed.
    Rejected,
    /// Role or status outside the vocabulary. Treated as a security violation.
    Invalid(InvalidProfile),
}

impl Approval {
    pub fn is_approved(&self) -> bool {
        matches!(self, Approval::Approved(_))
    }

    /// Whether a session holding this profile must be signed out.
    pub fn requires_sign_out(&self) -> bool {
        matches!(self, Approval::Rejected | Approval::Invalid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InvalidProfile {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

/// Derive the approval decision for a profile.
///
/// Precedence:
/// 1. `rejected` in either role or status wins;
/// 2. any out-of-vocabulary role or status is invalid;
/// 3. role `pending` is pending whatever the status says;
/// 4. a staff role is approved only with status `approved`;
/// 5. a staff role with status `pending` or no status is still pending.
pub fn evaluate(profile: &Profile) -> Approval {
    let role = profile.role.kind();
    let status = profile.status.as_ref().map(|s| (s, s.kind()));

    if role == Some(RoleKind::Rejected) || matches!(status, Some((_, Some(StatusKind::Rejected)))) {
        return Approval::Rejected;
    }

    let Some(role) = role else {
        return Approval::Invalid(InvalidProfile::UnknownRole(profile.role.as_str().to_string()));
    };

    let status = match status {
        None => None,
        Some((_, Some(kind))) => Some(kind),
        Some((raw, None)) => {
            return Approval::Invalid(InvalidProfile::UnknownStatus(raw.as_str().to_string()));
        }
    };

    match (role, status) {
        (RoleKind::Staff(staff), Some(StatusKind::Approved)) => Approval::Approved(staff),
        (RoleKind::Staff(_), _) | (RoleKind::Pending, _) => Approval::Pending,
        (RoleKind::Rejected, _) => Approval::Rejected,
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("account is awaiting approval")]
    PendingApproval,

    #[error("account was rejected")]
    Rejected,

    #[error("invalid profile: {0}")]
    InvalidProfile(InvalidProfile),

    #[error("forbidden: requires role '{required}', profile has '{actual}'")]
    InsufficientRole { required: StaffRole, actual: StaffRole },
}

/// Authorize a profile for something that requires `required`.
///
/// Returns the profile's effective staff role on success.
///
/// - No IO
/// - No panics
pub fn authorize(profile: &Profile, required: StaffRole) -> Result<StaffRole, AuthzError> {
    match evaluate(profile) {
        Approval::Approved(role) if role.satisfies(required) => Ok(role),
        Approval::Approved(role) => Err(AuthzError::InsufficientRole {
            required,
            actual: role,
        }),
        Approval::Pending => Err(AuthzError::PendingApproval),
        Approval::Rejected => Err(AuthzError::Rejected),
        Approval::Invalid(reason) => Err(AuthzError::InvalidProfile(reason)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why an authorization decision came out the way it did.
///
/// Used for the blocking screen's message and for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_role: StaffRole,
    pub granted: bool,
    pub approval: Option<Approval>,
    pub reason: String,
    pub suggestions: Vec<String>,
}

/// Explain the decision for `profile` (or for no profile at all).
pub fn explain_authorization(profile: Option<&Profile>, required: StaffRole) -> AuthorizationExplanation {
    let Some(profile) = profile else {
        return AuthorizationExplanation {
            required_role: required,
            granted: false,
            approval: None,
            reason: "No profile is loaded for this session".to_string(),
            suggestions: vec!["Sign in again".to_string()],
        };
    };

    let approval = evaluate(profile);
    let (granted, reason, suggestions) = match &approval {
        Approval::Approved(role) if role.satisfies(required) => (
            true,
            format!("Role '{role}' satisfies required role '{required}'"),
            vec![],
        ),
        Approval::Approved(role) => (
            false,
            format!("Role '{role}' does not grant access to areas that require '{required}'"),
            vec![format!(
                "Ask an administrator to grant the '{}' role or higher",
                required.label()
            )],
        ),
        Approval::Pending => (
            false,
            "Account is awaiting approval by an administrator".to_string(),
            vec!["Check your email regularly; you will be notified when the account is activated".to_string()],
        ),
        Approval::Rejected => (
            false,
            "Account access was rejected by an administrator".to_string(),
            vec!["Contact an administrator to request access".to_string()],
        ),
        Approval::Invalid(reason) => (
            false,
            format!("Profile is invalid: {reason}"),
            vec!["Contact an administrator to review this account".to_string()],
        ),
    };

    AuthorizationExplanation {
        required_role: required,
        granted,
        approval: Some(approval),
        reason,
        suggestions,
    }
}
