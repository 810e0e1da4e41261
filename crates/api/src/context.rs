use clinicflow_auth::StaffRole;
use clinicflow_core::IdentityId;

/// The signed-in staff member acting on a request.
///
/// Only inserted once the session has passed the route guard, so the role is
/// always an approved staff role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    identity_id: IdentityId,
    role: StaffRole,
}

impl ActorContext {
    pub fn new(identity_id: IdentityId, role: StaffRole) -> Self {
        Self { identity_id, role }
    }

    pub fn identity_id(&self) -> &IdentityId {
        &self.identity_id
    }

    pub fn role(&self) -> StaffRole {
        self.role
    }
}
