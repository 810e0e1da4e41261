//! Identity provider boundary.
//!
//! The provider owns credentials and issues [`Identity`] records. It pushes
//! auth-state changes over a broadcast channel; the session store is the only
//! consumer that turns them into session state.

pub mod errors;
pub mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use clinicflow_auth::{Identity, Registration, SignUpMetadata};

pub use errors::AuthError;
pub use in_memory::InMemoryIdentityProvider;

/// Auth-state change pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "identity", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Emitted once when the provider restores (or fails to restore) a session.
    InitialSession(Option<Identity>),
    SignedIn(Identity),
    /// Token refresh or identity metadata change for the current user.
    UserUpdated(Identity),
    SignedOut,
}

impl AuthEvent {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthEvent::InitialSession(identity) => identity.as_ref(),
            AuthEvent::SignedIn(identity) | AuthEvent::UserUpdated(identity) => Some(identity),
            AuthEvent::SignedOut => None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Register a new account from an already validated registration.
    async fn sign_up(&self, registration: &Registration) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;

    /// The identity of the currently signed-in user, if any.
    async fn current_identity(&self) -> Option<Identity>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[async_trait]
impl<P> IdentityProvider for Arc<P>
where
    P: IdentityProvider + ?Sized,
{
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        (**self).sign_in(email, password).await
    }

    async fn sign_up(&self, registration: &Registration) -> Result<Identity, AuthError> {
        (**self).sign_up(registration).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        (**self).reset_password(email).await
    }

    async fn current_identity(&self) -> Option<Identity> {
        (**self).current_identity().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        (**self).subscribe()
    }
}

/// Post-registration hook run by the provider after an account is created
/// (the BaaS "on user created" trigger).
#[async_trait]
pub trait SignUpHook: Send + Sync {
    async fn after_sign_up(&self, identity: &Identity, metadata: &SignUpMetadata) -> Result<(), String>;
}
