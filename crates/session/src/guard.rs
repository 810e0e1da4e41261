//! Route guard: what to show for a screen given the current session.

use serde::Serialize;

use clinicflow_auth::{Approval, StaffRole, explain_authorization};

use crate::store::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Loading,
    SignInRequired,
    PendingApproval,
    Render,
    Denied { message: String },
}

/// Decide what a screen requiring `required` shows.
///
/// `message` replaces the default explanation on denial.
pub fn guard(session: &Session, required: StaffRole, message: Option<&str>) -> GuardDecision {
    if session.loading {
        return GuardDecision::Loading;
    }
    if session.identity.is_none() {
        return GuardDecision::SignInRequired;
    }
    let Some(profile) = &session.profile else {
        // Identity without a profile only exists while it is being resolved.
        return GuardDecision::Loading;
    };

    let explanation = explain_authorization(Some(profile), required);
    match explanation.approval {
        Some(Approval::Pending) => GuardDecision::PendingApproval,
        _ if explanation.granted => GuardDecision::Render,
        _ => GuardDecision::Denied {
            message: message.map(str::to_string).unwrap_or(explanation.reason),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Screens
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Dashboard,
    Clients,
    Agenda,
    Treatments,
    Campaigns,
    Profile,
    Financial,
    UserManagement,
}

impl Screen {
    pub const ALL: [Screen; 8] = [
        Screen::Dashboard,
        Screen::Clients,
        Screen::Agenda,
        Screen::Treatments,
        Screen::Campaigns,
        Screen::Profile,
        Screen::Financial,
        Screen::UserManagement,
    ];

    pub fn required_role(&self) -> StaffRole {
        match self {
            Screen::Financial => StaffRole::Gerente,
            Screen::UserManagement => StaffRole::Admin,
            _ => StaffRole::Consultora,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Screen::Dashboard => "dashboard",
            Screen::Clients => "clients",
            Screen::Agenda => "agenda",
            Screen::Treatments => "treatments",
            Screen::Campaigns => "campaigns",
            Screen::Profile => "profile",
            Screen::Financial => "financial",
            Screen::UserManagement => "users",
        }
    }

    pub fn guard(&self, session: &Session) -> GuardDecision {
        guard(session, self.required_role(), None)
    }
}

impl core::str::FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Screen::ALL
            .into_iter()
            .find(|screen| screen.slug() == s)
            .ok_or_else(|| format!("unknown screen '{s}'"))
    }
}

/// Screens the navigation shows for this session.
pub fn visible_screens(session: &Session) -> Vec<Screen> {
    Screen::ALL
        .into_iter()
        .filter(|screen| screen.guard(session) == GuardDecision::Render)
        .collect()
}
