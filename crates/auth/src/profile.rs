//! Profile aggregate: the application's own record of a user.
//!
//! A profile is created at sign-up with role and status `pending`, then
//! mutated only by an administrator (approve/reject) or by its owner
//! (contact fields). Role and status are never part of a self-service edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinicflow_core::{Aggregate, AggregateRoot, DomainError, EmailAddress, Entity, IdentityId};

use crate::{ApprovalStatus, Role, StaffRole};

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Application-owned user record, keyed by the identity id.
///
/// Field names follow the `users` table of the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: IdentityId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    /// Older profiles predate the status column and carry no value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: u64,
}

/// Input for provisioning a fresh profile at sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: IdentityId,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Profile {
    /// Build the initial profile for a newly registered identity.
    ///
    /// Every new profile starts as `pending`/`pending` regardless of what the
    /// registration form asked for; only an administrator grants a role.
    pub fn provision(input: NewProfile) -> Result<Self, DomainError> {
        let email = EmailAddress::parse(&input.email)?;

        let display_name = input.display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(Self {
            id: input.id,
            email: email.into(),
            display_name: display_name.to_string(),
            role: Role::PENDING,
            status: Some(ApprovalStatus::PENDING),
            phone: None,
            bio: None,
            email_verified: input.email_verified,
            created_at: input.occurred_at,
            updated_at: input.occurred_at,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            version: 0,
        })
    }

    fn ensure_not_self(&self, actor: &IdentityId) -> Result<(), DomainError> {
        if &self.id == actor {
            return Err(DomainError::unauthorized("users cannot change their own approval"));
        }
        Ok(())
    }
}

impl Entity for Profile {
    type Id = IdentityId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Profile {
    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Self-service edit. Role and status are deliberately not representable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.phone.is_none() && self.bio.is_none()
    }
}

/// Administrator grants a staff role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveProfile {
    pub actor: IdentityId,
    pub role: StaffRole,
    pub occurred_at: DateTime<Utc>,
}

/// Administrator refuses access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectProfile {
    pub actor: IdentityId,
    pub occurred_at: DateTime<Utc>,
}

/// Owner edits contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub patch: ProfilePatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProfileCommand {
    Approve(ApproveProfile),
    Reject(RejectProfile),
    Update(UpdateProfile),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileApproved {
    pub profile_id: IdentityId,
    pub approved_by: IdentityId,
    pub role: StaffRole,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRejected {
    pub profile_id: IdentityId,
    pub rejected_by: IdentityId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub profile_id: IdentityId,
    pub patch: ProfilePatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileEvent {
    Approved(ProfileApproved),
    Rejected(ProfileRejected),
    Updated(ProfileUpdated),
}

impl ProfileEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProfileEvent::Approved(_) => "profile.approved",
            ProfileEvent::Rejected(_) => "profile.rejected",
            ProfileEvent::Updated(_) => "profile.updated",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Profile {
    type Command = ProfileCommand;
    type Event = ProfileEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProfileEvent::Approved(e) => self.apply_approved(e),
            ProfileEvent::Rejected(e) => self.apply_rejected(e),
            ProfileEvent::Updated(e) => self.apply_updated(e),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProfileCommand::Approve(cmd) => self.handle_approve(cmd),
            ProfileCommand::Reject(cmd) => self.handle_reject(cmd),
            ProfileCommand::Update(cmd) => self.handle_update(cmd),
        }
    }
}

impl Profile {
    fn handle_approve(&self, cmd: &ApproveProfile) -> Result<Vec<ProfileEvent>, DomainError> {
        self.ensure_not_self(&cmd.actor)?;

        Ok(vec![ProfileEvent::Approved(ProfileApproved {
            profile_id: self.id.clone(),
            approved_by: cmd.actor.clone(),
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectProfile) -> Result<Vec<ProfileEvent>, DomainError> {
        self.ensure_not_self(&cmd.actor)?;

        if self.role == Role::REJECTED && self.status.as_ref() == Some(&ApprovalStatus::REJECTED) {
            return Err(DomainError::invariant("profile already rejected"));
        }

        Ok(vec![ProfileEvent::Rejected(ProfileRejected {
            profile_id: self.id.clone(),
            rejected_by: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProfile) -> Result<Vec<ProfileEvent>, DomainError> {
        if cmd.patch.is_empty() {
            return Err(DomainError::validation("nothing to update"));
        }

        let mut patch = cmd.patch.clone();
        if let Some(name) = &patch.display_name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(DomainError::validation("display name cannot be empty"));
            }
            patch.display_name = Some(trimmed.to_string());
        }
        patch.phone = patch.phone.map(|p| p.trim().to_string());

        Ok(vec![ProfileEvent::Updated(ProfileUpdated {
            profile_id: self.id.clone(),
            patch,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn apply_approved(&mut self, e: &ProfileApproved) {
        self.role = e.role.into();
        self.status = Some(ApprovalStatus::APPROVED);
        self.approved_by = Some(e.approved_by.clone());
        self.approved_at = Some(e.occurred_at);
        self.updated_at = e.occurred_at;
    }

    fn apply_rejected(&mut self, e: &ProfileRejected) {
        self.role = Role::REJECTED;
        self.status = Some(ApprovalStatus::REJECTED);
        self.rejected_by = Some(e.rejected_by.clone());
        self.rejected_at = Some(e.occurred_at);
        self.updated_at = e.occurred_at;
    }

    fn apply_updated(&mut self, e: &ProfileUpdated) {
        if let Some(name) = &e.patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(phone) = &e.patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(bio) = &e.patch.bio {
            self.bio = Some(bio.clone());
        }
        self.updated_at = e.occurred_at;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
