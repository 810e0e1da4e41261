//! Profile resolution and administration.
//!
//! The resolver is the only component that reads or writes profiles on behalf
//! of the session and the admin screens. Lookups by identity go through the
//! [`RetryPolicy`]; administrative writes go through the `Profile` aggregate so
//! that audit fields are always filled in.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use clinicflow_auth::{
    Approval, ApproveProfile, Identity, NewProfile, Profile, ProfileCommand, ProfilePatch,
    RejectProfile, StaffRole, UpdateProfile, evaluate,
};
use clinicflow_core::{Aggregate, DomainError, IdentityId};
use clinicflow_infra::{ProfileStore, StoreError};

use crate::retry::{Resolution, RetryPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("profile not found: {0}")]
    NotFound(IdentityId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Admin list filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileFilter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl ProfileFilter {
    pub fn matches(&self, profile: &Profile) -> bool {
        match self {
            ProfileFilter::All => true,
            ProfileFilter::Pending => evaluate(profile) == Approval::Pending,
            ProfileFilter::Approved => evaluate(profile).is_approved(),
            ProfileFilter::Rejected => evaluate(profile) == Approval::Rejected,
        }
    }
}

impl core::str::FromStr for ProfileFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct ProfileResolver {
    profiles: Arc<dyn ProfileStore>,
    retry: RetryPolicy,
}

impl ProfileResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, retry: RetryPolicy) -> Self {
        Self { profiles, retry }
    }

    /// Single read, no retry.
    pub async fn fetch(&self, id: &IdentityId) -> Result<Option<Profile>, ResolverError> {
        Ok(self.profiles.get(id).await?)
    }

    /// Look up the profile for `id`, retrying misses and store failures under
    /// the retry policy.
    pub async fn resolve(&self, id: &IdentityId) -> Resolution {
        let attempts = self.retry.attempts;
        let found = self
            .retry
            .run(|attempt| async move {
                match self.profiles.get(id).await {
                    Ok(Some(profile)) => Some(profile),
                    Ok(None) => {
                        warn!(identity_id = %id, attempt, attempts, "profile not found yet");
                        None
                    }
                    Err(e) => {
                        warn!(identity_id = %id, attempt, attempts, error = %e, "profile lookup failed");
                        None
                    }
                }
            })
            .await;

        match found {
            Some(profile) => {
                debug!(identity_id = %id, "profile resolved");
                Resolution::Resolved(profile)
            }
            None => Resolution::Exhausted { attempts },
        }
    }

    /// Create the pending profile for a newly registered identity.
    ///
    /// Idempotent: an existing profile (e.g. one written by a provider hook)
    /// is returned unchanged.
    pub async fn provision(&self, identity: &Identity, display_name: &str) -> Result<Profile, ResolverError> {
        let profile = Profile::provision(NewProfile {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: display_name.to_string(),
            email_verified: identity.email_verified,
            occurred_at: Utc::now(),
        })?;

        match self.profiles.insert(&profile).await {
            Ok(()) => {
                info!(profile_id = %profile.id, "provisioned pending profile");
                Ok(profile)
            }
            Err(StoreError::Conflict { .. }) => self
                .fetch(&identity.id)
                .await?
                .ok_or_else(|| ResolverError::NotFound(identity.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────────

    /// All profiles, newest first.
    pub async fn list_all_profiles(&self) -> Result<Vec<Profile>, ResolverError> {
        let mut profiles = self.profiles.list().await?;
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    /// Profiles matching `filter`, optionally narrowed by a case-insensitive
    /// search over display name and email.
    pub async fn list_profiles(
        &self,
        filter: ProfileFilter,
        search: Option<&str>,
    ) -> Result<Vec<Profile>, ResolverError> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(self
            .list_all_profiles()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .filter(|p| match &needle {
                Some(n) => p.display_name.to_lowercase().contains(n) || p.email.to_lowercase().contains(n),
                None => true,
            })
            .collect())
    }

    pub async fn approve(
        &self,
        id: &IdentityId,
        role: StaffRole,
        actor: &IdentityId,
    ) -> Result<Profile, ResolverError> {
        let profile = self
            .execute(
                id,
                ProfileCommand::Approve(ApproveProfile {
                    actor: actor.clone(),
                    role,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        info!(profile_id = %id, actor = %actor, role = %role, "profile approved");
        Ok(profile)
    }

    pub async fn reject(&self, id: &IdentityId, actor: &IdentityId) -> Result<Profile, ResolverError> {
        let profile = self
            .execute(
                id,
                ProfileCommand::Reject(RejectProfile {
                    actor: actor.clone(),
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        info!(profile_id = %id, actor = %actor, "profile rejected");
        Ok(profile)
    }

    /// Self-service edit of contact fields.
    pub async fn update(&self, id: &IdentityId, patch: ProfilePatch) -> Result<Profile, ResolverError> {
        self.execute(
            id,
            ProfileCommand::Update(UpdateProfile {
                patch,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    async fn execute(&self, id: &IdentityId, command: ProfileCommand) -> Result<Profile, ResolverError> {
        let mut profile = self
            .fetch(id)
            .await?
            .ok_or_else(|| ResolverError::NotFound(id.clone()))?;

        profile.execute(&command)?;
        self.profiles.save(&profile).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use clinicflow_auth::{ApprovalStatus, Role};
    use clinicflow_infra::{InMemoryRecordStore, RecordProfileStore};

    fn resolver() -> (ProfileResolver, Arc<dyn ProfileStore>) {
        let store: Arc<dyn ProfileStore> =
            Arc::new(RecordProfileStore::new(Arc::new(InMemoryRecordStore::new())));
        (
            ProfileResolver::new(store.clone(), RetryPolicy::new(5, Duration::from_millis(500))),
            store,
        )
    }

    async fn seed(resolver: &ProfileResolver, id: &str, name: &str) -> Profile {
        resolver
            .provision(
                &Identity::new(id, format!("{}@clinic.com", id.to_lowercase())),
                name,
            )
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_finds_existing_profile_immediately() {
        let (resolver, _) = resolver();
        let profile = seed(&resolver, "U1", "Ana").await;

        let start = tokio::time::Instant::now();
        assert_eq!(resolver.resolve(&IdentityId::new("U1")).await, Resolution::Resolved(profile));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_exhausts_after_configured_attempts() {
        let (resolver, _) = resolver();
        let resolution = resolver.resolve(&IdentityId::new("U1")).await;
        assert_eq!(resolution, Resolution::Exhausted { attempts: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_picks_up_late_profile() {
        let (resolver, store) = resolver();
        let late = Profile::provision(NewProfile {
            id: IdentityId::new("U2"),
            email: "u2@clinic.com".to_string(),
            display_name: "Bia".to_string(),
            email_verified: true,
            occurred_at: Utc::now(),
        })
        .unwrap();

        let writer = {
            let late = late.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(700)).await;
                store.insert(&late).await.unwrap();
            })
        };

        let resolution = resolver.resolve(&IdentityId::new("U2")).await;
        writer.await.unwrap();
        assert_eq!(resolution, Resolution::Resolved(late));
    }

    #[tokio::test]
    async fn provision_is_idempotent() {
        let (resolver, _) = resolver();
        let first = seed(&resolver, "U1", "Ana").await;
        let second = seed(&resolver, "U1", "Someone Else").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn approve_and_reject_write_audit_fields() {
        let (resolver, _) = resolver();
        seed(&resolver, "U1", "Ana").await;
        seed(&resolver, "U2", "Bia").await;
        let admin = IdentityId::new("ADMIN");

        let approved = resolver
            .approve(&IdentityId::new("U1"), StaffRole::Gerente, &admin)
            .await
            .unwrap();
        assert_eq!(approved.role, Role::GERENTE);
        assert_eq!(approved.status, Some(ApprovalStatus::APPROVED));
        assert_eq!(approved.approved_by, Some(admin.clone()));
        assert!(approved.approved_at.is_some());

        let rejected = resolver.reject(&IdentityId::new("U2"), &admin).await.unwrap();
        assert_eq!(rejected.role, Role::REJECTED);
        assert_eq!(rejected.status, Some(ApprovalStatus::REJECTED));
        assert_eq!(rejected.rejected_by, Some(admin));
        assert!(rejected.rejected_at.is_some());

        let stored = resolver.fetch(&IdentityId::new("U2")).await.unwrap().unwrap();
        assert_eq!(stored, rejected);
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let (resolver, _) = resolver();
        let err = resolver
            .approve(&IdentityId::new("ghost"), StaffRole::Admin, &IdentityId::new("ADMIN"))
            .await
            .unwrap_err();
        assert_eq!(err, ResolverError::NotFound(IdentityId::new("ghost")));
    }

    #[tokio::test]
    async fn list_profiles_filters_and_searches() {
        let (resolver, _) = resolver();
        seed(&resolver, "U1", "Ana Souza").await;
        seed(&resolver, "U2", "Bia Lima").await;
        seed(&resolver, "U3", "Carla Souza").await;
        let admin = IdentityId::new("ADMIN");
        resolver
            .approve(&IdentityId::new("U1"), StaffRole::Consultora, &admin)
            .await
            .unwrap();
        resolver.reject(&IdentityId::new("U2"), &admin).await.unwrap();

        let pending = resolver.list_profiles(ProfileFilter::Pending, None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, IdentityId::new("U3"));

        let souzas = resolver
            .list_profiles(ProfileFilter::All, Some("SOUZA"))
            .await
            .unwrap();
        assert_eq!(souzas.len(), 2);

        let by_email = resolver
            .list_profiles(ProfileFilter::Rejected, Some("u2@"))
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);

        assert_eq!(resolver.list_all_profiles().await.unwrap().len(), 3);
    }

    #[test]
    fn filter_parses_from_query_values() {
        assert_eq!("pending".parse::<ProfileFilter>(), Ok(ProfileFilter::Pending));
        assert_eq!("".parse::<ProfileFilter>(), Ok(ProfileFilter::All));
        assert!("archived".parse::<ProfileFilter>().is_err());
    }
}
