//! `clinicflow-auth`: pure authentication/authorization boundary.
//!
//! Roles, approval statuses, the profile aggregate and the single
//! authorization predicate. No IO: identity providers and stores live in
//! `clinicflow-infra`, session state in `clinicflow-session`.

pub mod authorize;
pub mod identity;
pub mod password;
pub mod profile;
pub mod registration;
pub mod roles;
pub mod status;

pub use authorize::{
    AuthorizationExplanation, Approval, AuthzError, InvalidProfile, authorize, evaluate,
    explain_authorization,
};
pub use identity::Identity;
pub use password::{PasswordPolicy, PasswordPolicyError};
pub use profile::{
    ApproveProfile, NewProfile, Profile, ProfileApproved, ProfileCommand, ProfileEvent,
    ProfilePatch, ProfileRejected, ProfileUpdated, RejectProfile, UpdateProfile,
};
pub use registration::{Registration, RegistrationError, SignUpMetadata};
pub use roles::{Role, RoleKind, StaffRole};
pub use status::{ApprovalStatus, StatusKind};
