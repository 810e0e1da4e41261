//! Session store.
//!
//! Owns the process-local [`Session`] and is its only writer. Readers get
//! snapshots through a `watch` channel. Every auth transition bumps the
//! session generation; a profile resolution started under an older
//! generation is discarded when it completes.
//!
//! Invariant: a session holding an identity either ends up holding that
//! identity's profile or is signed out with a [`SecurityAlert`].

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use clinicflow_auth::{
    Approval, Identity, InvalidProfile, PasswordPolicy, Profile, ProfilePatch, Registration,
    RegistrationError, SignUpMetadata, evaluate,
};
use clinicflow_core::IdentityId;
use clinicflow_infra::{AuthError, AuthEvent, IdentityProvider, ProfileProvisioning};

use crate::resolver::{ProfileResolver, ResolverError};
use crate::retry::Resolution;

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Why a session was forcibly signed out.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecurityAlert {
    #[error("no profile found for identity {identity_id} after {attempts} attempts")]
    MissingProfile { identity_id: IdentityId, attempts: u32 },

    #[error("profile {identity_id} was rejected")]
    Rejected { identity_id: IdentityId },

    #[error("profile {identity_id} is invalid: {reason}")]
    InvalidProfile {
        identity_id: IdentityId,
        reason: InvalidProfile,
    },
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    /// Last alert that forced a sign-out. Cleared by the next sign-in.
    pub alert: Option<SecurityAlert>,
    pub generation: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn approval(&self) -> Option<Approval> {
        self.profile.as_ref().map(evaluate)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("no authenticated session")]
    NotAuthenticated,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    resolver: ProfileResolver,
    password_policy: PasswordPolicy,
    provisioning: ProfileProvisioning,
    state: watch::Sender<Session>,
}

/// Cheap-to-clone handle to one session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

/// Who initiated an auth transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Origin {
    /// `sign_in`, `sign_up` or `bootstrap` on this store.
    Local,
    /// An event pushed by the identity provider.
    Provider,
}

enum Transition {
    Resolve { generation: u64, identity_id: IdentityId },
    Settled,
}

impl SessionStore {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        resolver: ProfileResolver,
        provisioning: ProfileProvisioning,
    ) -> Self {
        // Loading until `bootstrap` or the first auth event settles it.
        let (state, _) = watch::channel(Session {
            loading: true,
            ..Session::default()
        });
        Self {
            inner: Arc::new(Inner {
                provider,
                resolver,
                password_policy: PasswordPolicy::default(),
                provisioning,
                state,
            }),
        }
    }

    pub fn resolver(&self) -> &ProfileResolver {
        &self.inner.resolver
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Wait until no profile resolution is in flight.
    pub async fn settled(&self) -> Session {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(session) => session.clone(),
            Err(_) => self.snapshot(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Start-up and the provider event loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the provider's current identity and resolve it.
    pub async fn bootstrap(&self) -> Session {
        self.inner.state.send_modify(|s| s.loading = true);
        let identity = self.inner.provider.current_identity().await;
        self.transition(AuthEvent::InitialSession(identity), Origin::Local).await
    }

    /// Apply one provider-pushed auth event and wait for any profile
    /// resolution it starts.
    pub async fn handle_event(&self, event: AuthEvent) -> Session {
        self.transition(event, Origin::Provider).await
    }

    async fn transition(&self, event: AuthEvent, origin: Origin) -> Session {
        if let Transition::Resolve {
            generation,
            identity_id,
        } = self.begin(&event, origin)
        {
            self.complete(generation, identity_id).await;
        }
        self.snapshot()
    }

    /// Consume provider events until the channel closes.
    ///
    /// Transitions are applied in arrival order; resolutions run on their own
    /// tasks so that a sign-out is never queued behind a retrying lookup.
    pub async fn run(self, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth events lagged; resynchronising from provider");
                    AuthEvent::InitialSession(self.inner.provider.current_identity().await)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if self.is_superseded(&event).await {
                debug!(?event, "skipping auth event superseded by provider state");
                continue;
            }

            debug!(?event, "auth event");
            if let Transition::Resolve {
                generation,
                identity_id,
            } = self.begin(&event, Origin::Provider)
            {
                let store = self.clone();
                tokio::spawn(async move { store.complete(generation, identity_id).await });
            }
        }
    }

    /// Whether the provider has moved on since `event` was queued, e.g. a
    /// sign-out delivered after the next sign-in already happened.
    async fn is_superseded(&self, event: &AuthEvent) -> bool {
        let current = self.inner.provider.current_identity().await;
        match event {
            AuthEvent::InitialSession(_) => false,
            AuthEvent::SignedOut => current.is_some(),
            AuthEvent::SignedIn(identity) | AuthEvent::UserUpdated(identity) => {
                current.map(|c| c.id) != Some(identity.id.clone())
            }
        }
    }

    /// Apply the synchronous part of an auth transition.
    fn begin(&self, event: &AuthEvent, origin: Origin) -> Transition {
        let Some(identity) = event.identity().cloned() else {
            self.inner.state.send_modify(|s| {
                s.generation += 1;
                s.identity = None;
                s.profile = None;
                s.loading = false;
            });
            return Transition::Settled;
        };

        let fresh_sign_in = matches!(event, AuthEvent::SignedIn(_) | AuthEvent::InitialSession(_));
        let mut transition = Transition::Settled;

        self.inner.state.send_if_modified(|s| {
            let same_identity = s.identity.as_ref().map(|i| &i.id) == Some(&identity.id);

            // The provider echoes a sign-in whose profile is already being read.
            if origin == Origin::Provider && fresh_sign_in && same_identity && s.loading {
                return false;
            }

            s.generation += 1;
            // A sign-in made here never trusts the profile from before it.
            if !same_identity || (origin == Origin::Local && fresh_sign_in) {
                s.profile = None;
            }
            if fresh_sign_in {
                s.alert = None;
            }
            // A profile already on screen stays there while it is re-read.
            s.loading = s.profile.is_none();
            s.identity = Some(identity.clone());

            transition = Transition::Resolve {
                generation: s.generation,
                identity_id: identity.id.clone(),
            };
            true
        });

        transition
    }

    async fn complete(&self, generation: u64, identity_id: IdentityId) {
        match self.inner.resolver.resolve(&identity_id).await {
            Resolution::Resolved(profile) => self.accept(generation, profile).await,
            Resolution::Exhausted { attempts } => {
                self.force_sign_out(
                    generation,
                    SecurityAlert::MissingProfile {
                        identity_id,
                        attempts,
                    },
                )
                .await;
            }
        }
    }

    /// Install a resolved profile, or sign out if it may not hold a session.
    async fn accept(&self, generation: u64, profile: Profile) {
        let identity_id = profile.id.clone();
        let approval = evaluate(&profile);

        if !approval.requires_sign_out() {
            let applied = self.inner.state.send_if_modified(|s| {
                if s.generation != generation {
                    return false;
                }
                s.profile = Some(profile);
                s.loading = false;
                true
            });
            if !applied {
                debug!(generation, identity_id = %identity_id, "discarding stale profile resolution");
            }
            return;
        }

        let alert = match approval {
            Approval::Invalid(reason) => SecurityAlert::InvalidProfile { identity_id, reason },
            _ => SecurityAlert::Rejected { identity_id },
        };
        self.force_sign_out(generation, alert).await;
    }

    async fn force_sign_out(&self, generation: u64, alert: SecurityAlert) {
        let applied = self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.generation += 1;
            s.identity = None;
            s.profile = None;
            s.loading = false;
            s.alert = Some(alert.clone());
            true
        });

        if !applied {
            debug!(generation, "discarding stale security alert");
            return;
        }

        error!(alert = %alert, "security alert; forcing sign-out");
        if let Err(e) = self.inner.provider.sign_out().await {
            error!(error = %e, "provider sign-out failed after security alert");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let identity = match self.inner.provider.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(code = e.code(), "sign-in failed");
                return Err(e.into());
            }
        };

        info!(identity_id = %identity.id, "signed in");
        self.transition(AuthEvent::SignedIn(identity), Origin::Local).await;
        Ok(self.settled().await)
    }

    /// Validate locally, register with the provider and, when the client is
    /// responsible for it, create the pending profile.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<Session, SessionError> {
        let registration = Registration::validate(email, password, metadata, &self.inner.password_policy)?;
        let identity = self.inner.provider.sign_up(&registration).await?;
        info!(identity_id = %identity.id, "registered");

        if self.inner.provisioning == ProfileProvisioning::Client {
            self.inner
                .resolver
                .provision(&identity, &registration.metadata.display_name)
                .await?;
        }

        let signed_in = self
            .inner
            .provider
            .current_identity()
            .await
            .is_some_and(|current| current.id == identity.id);

        if signed_in {
            self.transition(AuthEvent::SignedIn(identity), Origin::Local).await;
            return Ok(self.settled().await);
        }
        Ok(self.snapshot())
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let identity_id = self.snapshot().identity.map(|i| i.id);
        self.inner.provider.sign_out().await?;
        self.handle_event(AuthEvent::SignedOut).await;
        if let Some(id) = identity_id {
            info!(identity_id = %id, "signed out");
        }
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), SessionError> {
        self.inner.provider.reset_password(email).await?;
        Ok(())
    }

    /// Edit the signed-in user's own contact fields.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile, SessionError> {
        let session = self.snapshot();
        let (Some(identity), Some(_)) = (&session.identity, &session.profile) else {
            return Err(SessionError::NotAuthenticated);
        };

        let updated = self.inner.resolver.update(&identity.id, patch).await?;

        let generation = session.generation;
        let installed = updated.clone();
        self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.profile = Some(installed);
            true
        });

        Ok(updated)
    }

    /// Re-read the profile once. A profile that may no longer hold a session
    /// signs it out.
    pub async fn refresh_profile(&self) -> Result<Session, SessionError> {
        let session = self.snapshot();
        let Some(identity) = &session.identity else {
            return Err(SessionError::NotAuthenticated);
        };

        match self.inner.resolver.fetch(&identity.id).await? {
            Some(profile) => self.accept(session.generation, profile).await,
            None => {
                self.force_sign_out(
                    session.generation,
                    SecurityAlert::MissingProfile {
                        identity_id: identity.id.clone(),
                        attempts: 1,
                    },
                )
                .await;
            }
        }

        Ok(self.snapshot())
    }
}
