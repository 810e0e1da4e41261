use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use clinicflow_auth::{Identity, Registration};
use clinicflow_core::{EmailAddress, IdentityId, RecordId};

use super::{AuthError, AuthEvent, IdentityProvider, SignUpHook};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
    confirmed: bool,
    disabled: bool,
    failed_attempts: u32,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<EmailAddress, Account>,
    current: Option<Identity>,
    reset_requests: Vec<EmailAddress>,
}

/// In-memory identity provider for tests/dev.
///
/// Behaves like the hosted providers in the ways the session depends on:
/// case-insensitive emails, duplicate detection, unconfirmed accounts,
/// failed-attempt lockout and an optional post-registration hook.
pub struct InMemoryIdentityProvider {
    state: Mutex<State>,
    events: broadcast::Sender<AuthEvent>,
    require_confirmation: bool,
    max_failed_attempts: u32,
    sign_up_hook: Option<Arc<dyn SignUpHook>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
            require_confirmation: false,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            sign_up_hook: None,
        }
    }

    /// New accounts must confirm their email before they can sign in.
    pub fn with_confirmation_required(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    pub fn with_sign_up_hook(mut self, hook: Arc<dyn SignUpHook>) -> Self {
        self.sign_up_hook = Some(hook);
        self
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, State>, AuthError> {
        self.state.lock().map_err(|_| AuthError::Provider {
            code: "internal".to_string(),
            message: "identity state lock poisoned".to_string(),
        })
    }

    /// Seed a confirmed account with a fixed id.
    pub fn register_account(
        &self,
        id: impl Into<IdentityId>,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let email = EmailAddress::parse(email).map_err(|_| AuthError::InvalidEmail)?;
        let identity = Identity::new(id, email.as_str()).verified();

        let mut state = self.state()?;
        if state.accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }
        state.accounts.insert(
            email,
            Account {
                identity: identity.clone(),
                password: password.to_string(),
                confirmed: true,
                disabled: false,
                failed_attempts: 0,
            },
        );
        Ok(identity)
    }

    pub fn confirm_email(&self, email: &str) -> Result<(), AuthError> {
        let email = EmailAddress::parse(email).map_err(|_| AuthError::InvalidEmail)?;
        let mut state = self.state()?;
        let account = state.accounts.get_mut(&email).ok_or(AuthError::UserNotFound)?;
        account.confirmed = true;
        account.identity.email_verified = true;
        account.failed_attempts = 0;
        Ok(())
    }

    pub fn disable(&self, email: &str) -> Result<(), AuthError> {
        let email = EmailAddress::parse(email).map_err(|_| AuthError::InvalidEmail)?;
        let mut state = self.state()?;
        let account = state.accounts.get_mut(&email).ok_or(AuthError::UserNotFound)?;
        account.disabled = true;
        Ok(())
    }

    /// Push an arbitrary auth event, as the hosted provider would on token
    /// refresh or a change made from another device.
    pub fn emit(&self, event: AuthEvent) {
        if let Ok(mut state) = self.state() {
            match &event {
                AuthEvent::InitialSession(identity) => state.current = identity.clone(),
                AuthEvent::SignedIn(identity) | AuthEvent::UserUpdated(identity) => {
                    state.current = Some(identity.clone());
                }
                AuthEvent::SignedOut => state.current = None,
            }
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Emails a password reset was requested for.
    pub fn reset_requests(&self) -> Vec<String> {
        self.state()
            .map(|s| s.reset_requests.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = EmailAddress::parse(email).map_err(|_| AuthError::InvalidEmail)?;

        let identity = {
            let mut state = self.state()?;
            let account = state.accounts.get_mut(&email).ok_or(AuthError::UserNotFound)?;

            if account.failed_attempts >= self.max_failed_attempts {
                return Err(AuthError::RateLimited);
            }
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            if account.password != password {
                account.failed_attempts += 1;
                return Err(AuthError::InvalidCredentials);
            }
            if !account.confirmed {
                return Err(AuthError::EmailNotConfirmed);
            }

            account.failed_attempts = 0;
            let identity = account.identity.clone();
            state.current = Some(identity.clone());
            identity
        };

        let _ = self.events.send(AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, registration: &Registration) -> Result<Identity, AuthError> {
        if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        let email = registration.email.clone();
        let identity = Identity::new(IdentityId::new(RecordId::generate().into_inner()), email.as_str())
            .with_display_name(registration.metadata.display_name.clone());

        {
            let mut state = self.state()?;
            if state.accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            state.accounts.insert(
                email,
                Account {
                    identity: identity.clone(),
                    password: registration.password.clone(),
                    confirmed: !self.require_confirmation,
                    disabled: false,
                    failed_attempts: 0,
                },
            );
        }

        if let Some(hook) = &self.sign_up_hook {
            hook.after_sign_up(&identity, &registration.metadata)
                .await
                .map_err(|message| AuthError::Provider {
                    code: "sign_up_hook".to_string(),
                    message,
                })?;
        }

        if !self.require_confirmation {
            self.state()?.current = Some(identity.clone());
            let _ = self.events.send(AuthEvent::SignedIn(identity.clone()));
        }

        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state()?.current = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = EmailAddress::parse(email).map_err(|_| AuthError::InvalidEmail)?;
        let mut state = self.state()?;
        // Unknown emails succeed silently so the endpoint cannot be used to
        // probe for accounts.
        if let Some(account) = state.accounts.get_mut(&email) {
            // Recovering the account lifts a failed-attempt lockout.
            account.failed_attempts = 0;
            state.reset_requests.push(email);
        }
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        self.state().ok().and_then(|s| s.current.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
