//! Profile persistence on top of the record store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use clinicflow_auth::{Identity, NewProfile, Profile, SignUpMetadata};
use clinicflow_core::{IdentityId, RecordId};

use crate::identity::SignUpHook;
use crate::record_store::{Collection, ListOptions, Record, RecordStore, StoreError};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when no profile exists for the identity.
    async fn get(&self, id: &IdentityId) -> Result<Option<Profile>, StoreError>;

    /// Insert a new profile. Fails with `Conflict` if one already exists.
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Overwrite the stored profile with `profile`.
    async fn save(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Profile>, StoreError>;
}

#[async_trait]
impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    async fn get(&self, id: &IdentityId) -> Result<Option<Profile>, StoreError> {
        (**self).get(id).await
    }

    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        (**self).insert(profile).await
    }

    async fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        (**self).save(profile).await
    }

    async fn list(&self) -> Result<Vec<Profile>, StoreError> {
        (**self).list().await
    }
}

/// Stores profiles as records in the `users` collection.
#[derive(Debug, Clone)]
pub struct RecordProfileStore<S> {
    records: S,
}

impl<S: RecordStore> RecordProfileStore<S> {
    pub fn new(records: S) -> Self {
        Self { records }
    }
}

fn encode(profile: &Profile) -> Result<Record, StoreError> {
    match serde_json::to_value(profile).map_err(|e| StoreError::InvalidRecord(e.to_string()))? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidRecord("profile did not encode to an object".to_string())),
    }
}

fn decode(record: Record) -> Result<Profile, StoreError> {
    serde_json::from_value(JsonValue::Object(record)).map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl<S: RecordStore> ProfileStore for RecordProfileStore<S> {
    async fn get(&self, id: &IdentityId) -> Result<Option<Profile>, StoreError> {
        let record_id = RecordId::from(id.clone());
        match self.records.read(Collection::Users, &record_id).await {
            Ok(record) => decode(record).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        self.records.create(Collection::Users, encode(profile)?).await?;
        Ok(())
    }

    async fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut record = encode(profile)?;
        // Audit fields that are unset must be cleared, not left as they were.
        for field in ["status", "phone", "bio", "approved_by", "approved_at", "rejected_by", "rejected_at"] {
            record.entry(field.to_string()).or_insert(JsonValue::Null);
        }
        let record_id = RecordId::from(profile.id.clone());
        self.records.update(Collection::Users, &record_id, record).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Profile>, StoreError> {
        let result = self.records.list(Collection::Users, &ListOptions::new()).await?;
        result.records.into_iter().map(decode).collect()
    }
}

/// Sign-up hook that provisions the pending profile on the provider side,
/// like a database trigger on the auth users table.
pub struct ProvisionProfileHook<P> {
    profiles: P,
}

impl<P: ProfileStore> ProvisionProfileHook<P> {
    pub fn new(profiles: P) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl<P: ProfileStore> SignUpHook for ProvisionProfileHook<P> {
    async fn after_sign_up(&self, identity: &Identity, metadata: &SignUpMetadata) -> Result<(), String> {
        let profile = Profile::provision(NewProfile {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: metadata.display_name.clone(),
            email_verified: identity.email_verified,
            occurred_at: Utc::now(),
        })
        .map_err(|e| e.to_string())?;

        self.profiles.insert(&profile).await.map_err(|e| e.to_string())?;
        tracing::info!(profile_id = %profile.id, "provisioned pending profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::InMemoryRecordStore;
    use clinicflow_auth::{ApprovalStatus, ApproveProfile, ProfileCommand, Role, StaffRole};
    use clinicflow_core::Aggregate;

    fn store() -> RecordProfileStore<Arc<InMemoryRecordStore>> {
        RecordProfileStore::new(Arc::new(InMemoryRecordStore::new()))
    }

    fn pending(id: &str) -> Profile {
        Profile::provision(NewProfile {
            id: IdentityId::new(id),
            email: format!("{}@clinic.com", id.to_lowercase()),
            display_name: id.to_string(),
            email_verified: true,
            occurred_at: Utc::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        let profiles = store();
        assert_eq!(profiles.get(&IdentityId::new("U1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let profiles = store();
        let profile = pending("U1");
        profiles.insert(&profile).await.unwrap();

        let loaded = profiles.get(&IdentityId::new("U1")).await.unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert!(profiles.insert(&profile).await.is_err());
    }

    #[tokio::test]
    async fn save_persists_approval() {
        let profiles = store();
        let mut profile = pending("U1");
        profiles.insert(&profile).await.unwrap();

        profile
            .execute(&ProfileCommand::Approve(ApproveProfile {
                actor: IdentityId::new("ADMIN"),
                role: StaffRole::Consultora,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        profiles.save(&profile).await.unwrap();

        let loaded = profiles.get(&IdentityId::new("U1")).await.unwrap().unwrap();
        assert_eq!(loaded.role, Role::CONSULTORA);
        assert_eq!(loaded.status, Some(ApprovalStatus::APPROVED));
        assert_eq!(loaded.approved_by, Some(IdentityId::new("ADMIN")));
    }

    #[tokio::test]
    async fn hook_provisions_pending_profile() {
        let profiles = Arc::new(store());
        let hook = ProvisionProfileHook::new(profiles.clone());
        let identity = Identity::new("U7", "new@clinic.com");

        hook.after_sign_up(
            &identity,
            &SignUpMetadata {
                display_name: "Nova".to_string(),
                requested_role: Some("admin".to_string()),
            },
        )
        .await
        .unwrap();

        let profile = profiles.get(&IdentityId::new("U7")).await.unwrap().unwrap();
        assert_eq!(profile.role, Role::PENDING);
        assert_eq!(profile.status, Some(ApprovalStatus::PENDING));
        assert_eq!(profiles.list().await.unwrap().len(), 1);
    }
}
