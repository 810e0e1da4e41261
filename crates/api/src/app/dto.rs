use serde::{Deserialize, Serialize};

use clinicflow_auth::{Approval, Identity, Profile, SignUpMetadata, StaffRole};
use clinicflow_session::{SecurityAlert, Session, visible_screens};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub requested_role: Option<String>,
}

impl SignUpRequest {
    pub fn metadata(&self) -> SignUpMetadata {
        SignUpMetadata {
            display_name: self.display_name.clone(),
            requested_role: self.requested_role.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveProfileRequest {
    pub role: StaffRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileListQuery {
    pub filter: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub role: StaffRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScreenQuery {
    pub message: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// What the client needs to render the shell: who is signed in, their
/// profile, and which screens the navigation lists.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub authenticated: bool,
    pub loading: bool,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub approval: Option<Approval>,
    pub alert: Option<SecurityAlert>,
    pub screens: Vec<&'static str>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        let screens = visible_screens(&session).iter().map(|s| s.slug()).collect();
        Self {
            authenticated: session.is_authenticated(),
            loading: session.loading,
            approval: session.approval(),
            screens,
            identity: session.identity,
            profile: session.profile,
            alert: session.alert,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<Profile>,
    pub count: usize,
}
