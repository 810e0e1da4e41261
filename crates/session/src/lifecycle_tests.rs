//! End-to-end session lifecycle against the in-memory provider and stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use clinicflow_auth::{
    ApprovalStatus, Identity, NewProfile, Profile, ProfilePatch, Role, SignUpMetadata, StaffRole,
};
use clinicflow_core::IdentityId;
use clinicflow_infra::{
    AuthError, AuthEvent, IdentityProvider, InMemoryIdentityProvider, InMemoryRecordStore,
    ProfileProvisioning, ProfileStore, ProvisionProfileHook, RecordProfileStore,
};

use crate::{
    GuardDecision, ProfileResolver, RetryPolicy, Screen, SecurityAlert, SessionError, SessionStore,
    guard,
};

struct Harness {
    provider: Arc<InMemoryIdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    store: SessionStore,
}

fn profiles() -> Arc<dyn ProfileStore> {
    Arc::new(RecordProfileStore::new(Arc::new(InMemoryRecordStore::new())))
}

fn harness_with(
    provider: InMemoryIdentityProvider,
    profiles: Arc<dyn ProfileStore>,
    provisioning: ProfileProvisioning,
) -> Harness {
    let provider = Arc::new(provider);
    let resolver = ProfileResolver::new(profiles.clone(), RetryPolicy::default());
    let store = SessionStore::new(provider.clone() as Arc<dyn IdentityProvider>, resolver, provisioning);
    Harness {
        provider,
        profiles,
        store,
    }
}

fn harness() -> Harness {
    harness_with(InMemoryIdentityProvider::new(), profiles(), ProfileProvisioning::Client)
}

fn metadata(name: &str) -> SignUpMetadata {
    SignUpMetadata {
        display_name: name.to_string(),
        requested_role: None,
    }
}

impl Harness {
    /// Seed a confirmed account and, optionally, its profile.
    async fn account(&self, id: &str, role: Option<(&'static str, Option<&'static str>)>) -> Identity {
        let email = format!("{}@clinic.com", id.to_lowercase());
        let identity = self.provider.register_account(id, &email, "segredo1").unwrap();

        if let Some((role, status)) = role {
            let mut profile = Profile::provision(NewProfile {
                id: IdentityId::new(id),
                email,
                display_name: id.to_string(),
                email_verified: true,
                occurred_at: Utc::now(),
            })
            .unwrap();
            profile.role = Role::new(role);
            profile.status = status.map(ApprovalStatus::new);
            self.profiles.insert(&profile).await.unwrap();
        }
        identity
    }
}

#[tokio::test(start_paused = true)]
async fn sign_up_with_used_email_is_email_in_use() {
    let h = harness();
    h.store
        .sign_up("bia@clinic.com", "Clinica#2024", metadata("Bia"))
        .await
        .unwrap();
    h.store.sign_out().await.unwrap();

    let err = h
        .store
        .sign_up("Bia@Clinic.com", "Outra#Senha1", metadata("Bia 2"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Auth(AuthError::EmailInUse));
}

#[tokio::test(start_paused = true)]
async fn weak_password_never_reaches_the_provider() {
    let h = harness();
    let err = h
        .store
        .sign_up("bia@clinic.com", "123456", metadata("Bia"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Registration(_)));

    // The account was never created, so the email is still free.
    h.store
        .sign_up("bia@clinic.com", "Clinica#2024", metadata("Bia"))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn new_sign_up_waits_for_approval_without_signing_out() {
    let h = harness();
    let session = h
        .store
        .sign_up("bia@clinic.com", "Clinica#2024", metadata("Bia"))
        .await
        .unwrap();

    let profile = session.profile.clone().unwrap();
    assert_eq!(profile.role, Role::PENDING);
    assert_eq!(profile.status, Some(ApprovalStatus::PENDING));
    assert!(session.identity.is_some());
    assert_eq!(Screen::Dashboard.guard(&session), GuardDecision::PendingApproval);
    assert_eq!(guard(&session, StaffRole::Admin, None), GuardDecision::PendingApproval);
}

#[tokio::test(start_paused = true)]
async fn provider_hook_provisions_the_profile() {
    let profiles = profiles();
    let provider = InMemoryIdentityProvider::new()
        .with_sign_up_hook(Arc::new(ProvisionProfileHook::new(profiles.clone())));
    let h = harness_with(provider, profiles, ProfileProvisioning::ProviderHook);

    let session = h
        .store
        .sign_up("bia@clinic.com", "Clinica#2024", metadata("Bia"))
        .await
        .unwrap();
    assert_eq!(session.profile.map(|p| p.role), Some(Role::PENDING));
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_sign_up_leaves_session_anonymous() {
    let h = harness_with(
        InMemoryIdentityProvider::new().with_confirmation_required(),
        profiles(),
        ProfileProvisioning::Client,
    );
    h.store.bootstrap().await;

    let session = h
        .store
        .sign_up("bia@clinic.com", "Clinica#2024", metadata("Bia"))
        .await
        .unwrap();
    assert!(session.identity.is_none());

    let err = h.store.sign_in("bia@clinic.com", "Clinica#2024").await.unwrap_err();
    assert_eq!(err, SessionError::Auth(AuthError::EmailNotConfirmed));
}

#[tokio::test(start_paused = true)]
async fn approved_profile_renders_by_hierarchy() {
    let h = harness();
    h.account("ADMIN", Some(("admin", Some("approved")))).await;

    let session = h.store.sign_in("admin@clinic.com", "segredo1").await.unwrap();
    assert!(!session.loading);
    assert_eq!(guard(&session, StaffRole::Consultora, None), GuardDecision::Render);
    assert_eq!(guard(&session, StaffRole::Gerente, None), GuardDecision::Render);
    assert_eq!(Screen::UserManagement.guard(&session), GuardDecision::Render);
}

#[tokio::test(start_paused = true)]
async fn consultora_is_denied_gerente_screens() {
    let h = harness();
    h.account("C1", Some(("consultora", Some("approved")))).await;

    let session = h.store.sign_in("c1@clinic.com", "segredo1").await.unwrap();
    assert!(matches!(
        Screen::Financial.guard(&session),
        GuardDecision::Denied { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn rejected_profiles_are_signed_out() {
    for (id, role, status) in [
        ("R1", "rejected", Some("rejected")),
        ("R2", "admin", Some("rejected")),
        ("R3", "rejected", None),
    ] {
        let h = harness();
        h.account(id, Some((role, status))).await;

        let email = format!("{}@clinic.com", id.to_lowercase());
        let session = h.store.sign_in(&email, "segredo1").await.unwrap();

        assert!(session.identity.is_none(), "{id} kept its identity");
        assert!(session.profile.is_none());
        assert_eq!(
            session.alert,
            Some(SecurityAlert::Rejected {
                identity_id: IdentityId::new(id)
            })
        );
        assert_eq!(h.provider.current_identity().await, None);
    }
}

#[tokio::test(start_paused = true)]
async fn missing_profile_is_signed_out_after_five_attempts() {
    let h = harness();
    let u1 = h.account("U1", None).await;

    let start = tokio::time::Instant::now();
    let session = h.store.handle_event(AuthEvent::SignedIn(u1)).await;

    assert!(start.elapsed() >= Duration::from_millis(2000));
    assert_eq!(session.identity, None);
    assert_eq!(session.profile, None);
    assert!(!session.loading);
    assert_eq!(
        session.alert,
        Some(SecurityAlert::MissingProfile {
            identity_id: IdentityId::new("U1"),
            attempts: 5,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_role_is_a_security_alert() {
    let h = harness();
    h.account("X1", Some(("superuser", Some("approved")))).await;

    let session = h.store.sign_in("x1@clinic.com", "segredo1").await.unwrap();
    assert!(session.identity.is_none());
    assert!(matches!(
        session.alert,
        Some(SecurityAlert::InvalidProfile { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn refresh_twice_yields_identical_profile() {
    let h = harness();
    h.account("U1", Some(("gerente", Some("approved")))).await;
    h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    let first = h.store.refresh_profile().await.unwrap();
    let second = h.store.refresh_profile().await.unwrap();
    assert!(first.profile.is_some());
    assert_eq!(first.profile, second.profile);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_rejection_signs_out() {
    let h = harness();
    h.account("U1", Some(("consultora", Some("approved")))).await;
    h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    h.store
        .resolver()
        .reject(&IdentityId::new("U1"), &IdentityId::new("ADMIN"))
        .await
        .unwrap();

    let session = h.store.refresh_profile().await.unwrap();
    assert!(session.identity.is_none());
    assert!(matches!(session.alert, Some(SecurityAlert::Rejected { .. })));
}

#[tokio::test(start_paused = true)]
async fn signing_in_again_rereads_a_profile_rejected_meanwhile() {
    let h = harness();
    h.account("U1", Some(("pending", Some("pending")))).await;
    let session = h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();
    let mut profile = session.profile.unwrap();

    profile.role = Role::REJECTED;
    profile.status = Some(ApprovalStatus::REJECTED);
    h.profiles.save(&profile).await.unwrap();

    let session = h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();
    assert!(session.identity.is_none());
    assert!(session.profile.is_none());
    assert_eq!(
        session.alert,
        Some(SecurityAlert::Rejected {
            identity_id: IdentityId::new("U1")
        })
    );
}

#[tokio::test(start_paused = true)]
async fn provider_sign_in_for_loaded_identity_rereads_profile() {
    let h = harness();
    let u1 = h.account("U1", Some(("consultora", Some("approved")))).await;
    h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    h.store
        .resolver()
        .approve(&IdentityId::new("U1"), StaffRole::Gerente, &IdentityId::new("ADMIN"))
        .await
        .unwrap();

    let session = h.store.handle_event(AuthEvent::SignedIn(u1)).await;
    assert_eq!(session.approval(), Some(clinicflow_auth::Approval::Approved(StaffRole::Gerente)));
}

#[tokio::test(start_paused = true)]
async fn refresh_and_update_require_a_session() {
    let h = harness();
    h.store.bootstrap().await;

    assert_eq!(h.store.refresh_profile().await.unwrap_err(), SessionError::NotAuthenticated);
    assert_eq!(
        h.store
            .update_profile(ProfilePatch {
                phone: Some("11 99999-0000".to_string()),
                ..ProfilePatch::default()
            })
            .await
            .unwrap_err(),
        SessionError::NotAuthenticated
    );
}

#[tokio::test(start_paused = true)]
async fn update_profile_changes_contact_fields_only() {
    let h = harness();
    h.account("U1", Some(("pending", Some("pending")))).await;
    h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    let updated = h
        .store
        .update_profile(ProfilePatch {
            display_name: Some("Ana Souza".to_string()),
            bio: Some("Consultora desde 2019".to_string()),
            ..ProfilePatch::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.display_name, "Ana Souza");
    assert_eq!(updated.role, Role::PENDING);
    assert_eq!(h.store.snapshot().profile, Some(updated));
}

#[tokio::test(start_paused = true)]
async fn stale_resolution_is_discarded() {
    let h = harness();
    let u1 = h.account("U1", None).await;
    h.account("U2", Some(("consultora", Some("approved")))).await;

    let store = h.store.clone();
    let slow = tokio::spawn(async move { store.handle_event(AuthEvent::SignedIn(u1)).await });

    tokio::time::sleep(Duration::from_millis(600)).await;
    let session = h.store.sign_in("u2@clinic.com", "segredo1").await.unwrap();
    assert_eq!(session.identity.map(|i| i.id), Some(IdentityId::new("U2")));

    slow.await.unwrap();
    let session = h.store.snapshot();
    assert_eq!(session.identity.map(|i| i.id), Some(IdentityId::new("U2")));
    assert!(session.profile.is_some());
    assert_eq!(session.alert, None);
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_the_session() {
    let h = harness();
    h.account("U1", Some(("consultora", Some("approved")))).await;
    h.store.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    h.store.sign_out().await.unwrap();
    let session = h.store.snapshot();
    assert!(session.identity.is_none());
    assert!(session.profile.is_none());
    assert_eq!(Screen::Dashboard.guard(&session), GuardDecision::SignInRequired);
}

#[tokio::test(start_paused = true)]
async fn event_loop_follows_provider_events() {
    let h = harness();
    let identity = h.account("U1", Some(("gerente", Some("approved")))).await;
    h.store.bootstrap().await;

    let events = h.provider.subscribe();
    let runner = tokio::spawn(h.store.clone().run(events));
    let mut rx = h.store.subscribe();

    h.provider.emit(AuthEvent::SignedIn(identity));
    let session = rx.wait_for(|s| s.profile.is_some()).await.unwrap().clone();
    assert_eq!(Screen::Financial.guard(&session), GuardDecision::Render);

    h.provider.emit(AuthEvent::SignedOut);
    let session = rx.wait_for(|s| s.identity.is_none()).await.unwrap().clone();
    assert!(session.profile.is_none());

    runner.abort();
}

#[tokio::test(start_paused = true)]
async fn queued_sign_out_does_not_undo_a_later_sign_in() {
    let h = harness();
    h.account("U1", Some(("consultora", Some("approved")))).await;
    h.store.bootstrap().await;

    let events = h.provider.subscribe();
    h.provider.emit(AuthEvent::SignedOut);
    h.provider.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    let runner = tokio::spawn(h.store.clone().run(events));
    let mut rx = h.store.subscribe();
    let session = rx.wait_for(|s| s.profile.is_some()).await.unwrap().clone();
    assert_eq!(session.identity.map(|i| i.id), Some(IdentityId::new("U1")));

    tokio::task::yield_now().await;
    assert!(h.store.snapshot().is_authenticated());

    runner.abort();
}

#[tokio::test(start_paused = true)]
async fn bootstrap_restores_existing_provider_session() {
    let h = harness();
    h.account("U1", Some(("consultora", Some("approved")))).await;
    h.provider.sign_in("u1@clinic.com", "segredo1").await.unwrap();

    let session = h.store.bootstrap().await;
    assert_eq!(session.identity.map(|i| i.id), Some(IdentityId::new("U1")));
    assert!(session.profile.is_some());
    assert!(!session.loading);
}

#[tokio::test(start_paused = true)]
async fn password_reset_delegates_to_provider() {
    let h = harness();
    h.account("U1", None).await;
    h.store.reset_password("u1@clinic.com").await.unwrap();
    assert_eq!(h.provider.reset_requests(), vec!["u1@clinic.com".to_string()]);

    let err = h.store.reset_password("not-an-email").await.unwrap_err();
    assert_eq!(err, SessionError::Auth(AuthError::InvalidEmail));
}
