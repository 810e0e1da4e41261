use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Approval status as stored on a profile.
///
/// Opaque for the same reason as [`crate::Role`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalStatus(Cow<'static, str>);

impl ApprovalStatus {
    pub const PENDING: ApprovalStatus = ApprovalStatus(Cow::Borrowed("pending"));
    pub const APPROVED: ApprovalStatus = ApprovalStatus(Cow::Borrowed("approved"));
    pub const REJECTED: ApprovalStatus = ApprovalStatus(Cow::Borrowed("rejected"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<StatusKind> {
        match self.as_str() {
            "pending" => Some(StatusKind::Pending),
            "approved" => Some(StatusKind::Approved),
            "rejected" => Some(StatusKind::Rejected),
            _ => None,
        }
    }
}

impl core::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusKind {
    Pending,
    Approved,
    Rejected,
}
