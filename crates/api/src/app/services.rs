//! Service wiring: identity provider, record store, profile store, session.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use clinicflow_auth::{ApprovalStatus, Identity, NewProfile, Profile, Role};
use clinicflow_core::{EmailAddress, IdentityId};
use clinicflow_infra::{
    AppConfig, AuthError, IdentityProvider, InMemoryIdentityProvider, InMemoryRecordStore, ProfileProvisioning,
    ProfileStore, ProvisionProfileHook, RecordProfileStore, RecordStore,
};
use clinicflow_session::{ProfileResolver, RetryPolicy, SessionStore};

/// Everything the handlers need. One session per process.
#[derive(Clone)]
pub struct AppServices {
    pub identity: Arc<InMemoryIdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub session: SessionStore,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let records = build_record_store(config).await?;
    build_services_with(config, records).await
}

/// Wire everything on top of an existing record store.
pub async fn build_services_with(
    config: &AppConfig,
    records: Arc<dyn RecordStore>,
) -> anyhow::Result<AppServices> {
    let profiles: Arc<dyn ProfileStore> = Arc::new(RecordProfileStore::new(records));

    let mut identity = InMemoryIdentityProvider::new();
    if config.provisioning == ProfileProvisioning::ProviderHook {
        identity = identity.with_sign_up_hook(Arc::new(ProvisionProfileHook::new(profiles.clone())));
    }
    let identity = Arc::new(identity);

    let resolver = ProfileResolver::new(profiles.clone(), RetryPolicy::from_config(config));
    let session = SessionStore::new(
        identity.clone() as Arc<dyn IdentityProvider>,
        resolver,
        config.provisioning,
    );

    // Provider events drive the session from here on.
    tokio::spawn(session.clone().run(identity.subscribe()));
    session.bootstrap().await;

    Ok(AppServices {
        identity,
        profiles,
        session,
    })
}

#[cfg(feature = "postgres")]
async fn build_record_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &config.database_url {
        Some(url) => {
            let store = clinicflow_infra::PostgresRecordStore::connect(url).await?;
            info!("using postgres record store");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryRecordStore::new())),
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_record_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory records");
    }
    Ok(Arc::new(InMemoryRecordStore::new()))
}

impl AppServices {
    /// Create an account with an approved admin profile.
    ///
    /// The first administrator cannot be approved by anyone, so it is written
    /// directly instead of going through the approval command. The id is
    /// derived from the email: the provider account is recreated on every
    /// start while the profile may already be in a persistent store, in which
    /// case it is left as it is.
    pub async fn seed_admin(&self, email: &str, password: &str, display_name: &str) -> anyhow::Result<Identity> {
        let email = EmailAddress::parse(email)?;
        let id = IdentityId::new(format!("admin-{}", email.as_str()));

        let identity = match self.identity.register_account(id.clone(), email.as_str(), password) {
            Ok(identity) => identity,
            Err(AuthError::EmailInUse) => Identity::new(id, email.as_str()).verified(),
            Err(e) => return Err(e.into()),
        };

        if self.profiles.get(&identity.id).await?.is_some() {
            info!(identity_id = %identity.id, "administrator profile already present");
            return Ok(identity);
        }

        let mut profile = Profile::provision(NewProfile {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: display_name.to_string(),
            email_verified: true,
            occurred_at: Utc::now(),
        })?;
        profile.role = Role::ADMIN;
        profile.status = Some(ApprovalStatus::APPROVED);
        profile.approved_at = Some(profile.created_at);

        self.profiles.insert(&profile).await?;
        info!(identity_id = %identity.id, "seeded administrator");
        Ok(identity)
    }
}
