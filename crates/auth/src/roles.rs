use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role value as stored on a profile.
///
/// Kept as an opaque string at this layer: the record store may hold values
/// outside the known vocabulary (legacy data, manual edits), and those must be
/// detected by [`crate::evaluate`] instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const PENDING: Role = Role(Cow::Borrowed("pending"));
    pub const CONSULTORA: Role = Role(Cow::Borrowed("consultora"));
    pub const GERENTE: Role = Role(Cow::Borrowed("gerente"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const REJECTED: Role = Role(Cow::Borrowed("rejected"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the raw value. `None` means the value is outside the vocabulary.
    pub fn kind(&self) -> Option<RoleKind> {
        match self.as_str() {
            "pending" => Some(RoleKind::Pending),
            "rejected" => Some(RoleKind::Rejected),
            other => other.parse::<StaffRole>().ok().map(RoleKind::Staff),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<StaffRole> for Role {
    fn from(value: StaffRole) -> Self {
        match value {
            StaffRole::Consultora => Role::CONSULTORA,
            StaffRole::Gerente => Role::GERENTE,
            StaffRole::Admin => Role::ADMIN,
        }
    }
}

/// Recognised role values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoleKind {
    Pending,
    Staff(StaffRole),
    Rejected,
}

/// Roles that grant access to the application, ordered by privilege.
///
/// `admin > gerente > consultora`; each level implies the permissions of the
/// levels below it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Consultora,
    Gerente,
    Admin,
}

impl StaffRole {
    pub const ALL: [StaffRole; 3] = [StaffRole::Consultora, StaffRole::Gerente, StaffRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Consultora => "consultora",
            StaffRole::Gerente => "gerente",
            StaffRole::Admin => "admin",
        }
    }

    /// Numeric privilege level (consultora = 1, gerente = 2, admin = 3).
    pub fn level(&self) -> u8 {
        match self {
            StaffRole::Consultora => 1,
            StaffRole::Gerente => 2,
            StaffRole::Admin => 3,
        }
    }

    /// Whether holding `self` grants what `required` asks for.
    pub fn satisfies(&self, required: StaffRole) -> bool {
        self.level() >= required.level()
    }

    /// Human-readable label shown in the user management screen.
    pub fn label(&self) -> &'static str {
        match self {
            StaffRole::Consultora => "Consultora",
            StaffRole::Gerente => "Gerente",
            StaffRole::Admin => "Administrador",
        }
    }
}

impl core::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consultora" => Ok(StaffRole::Consultora),
            "gerente" => Ok(StaffRole::Gerente),
            "admin" => Ok(StaffRole::Admin),
            other => Err(format!("unknown staff role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_values_classify() {
        assert_eq!(Role::PENDING.kind(), Some(RoleKind::Pending));
        assert_eq!(Role::REJECTED.kind(), Some(RoleKind::Rejected));
        assert_eq!(Role::new("gerente").kind(), Some(RoleKind::Staff(StaffRole::Gerente)));
        assert_eq!(Role::new("superuser").kind(), None);
        assert_eq!(Role::new("Admin").kind(), None);
    }

    #[test]
    fn admin_satisfies_every_level() {
        assert!(StaffRole::Admin.satisfies(StaffRole::Consultora));
        assert!(StaffRole::Admin.satisfies(StaffRole::Gerente));
        assert!(!StaffRole::Consultora.satisfies(StaffRole::Gerente));
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&StaffRole::Gerente).unwrap();
        assert_eq!(json, "\"gerente\"");
        let role: Role = serde_json::from_str("\"consultora\"").unwrap();
        assert_eq!(role, Role::CONSULTORA);
    }

    fn staff_role() -> impl Strategy<Value = StaffRole> {
        prop::sample::select(StaffRole::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn hierarchy_matches_ordering(held in staff_role(), required in staff_role()) {
            prop_assert_eq!(held.satisfies(required), held >= required);
        }

        #[test]
        fn hierarchy_is_transitive(a in staff_role(), b in staff_role(), c in staff_role()) {
            if a.satisfies(b) && b.satisfies(c) {
                prop_assert!(a.satisfies(c));
            }
        }

        #[test]
        fn staff_roles_round_trip_through_role(held in staff_role()) {
            let role: Role = held.into();
            prop_assert_eq!(role.kind(), Some(RoleKind::Staff(held)));
        }
    }
}
