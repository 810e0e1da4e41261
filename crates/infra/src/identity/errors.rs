use serde::Serialize;
use thiserror::Error;

/// Failure reported by the identity provider.
///
/// Provider-specific codes and messages are normalised here so that every
/// caller sees the same variants regardless of which backend is configured.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email not confirmed")]
    EmailNotConfirmed,

    #[error("too many attempts")]
    RateLimited,

    #[error("password too weak")]
    WeakPassword,

    #[error("email already in use")]
    EmailInUse,

    #[error("invalid email")]
    InvalidEmail,

    #[error("user not found")]
    UserNotFound,

    #[error("user disabled")]
    UserDisabled,

    #[error("operation not allowed")]
    OperationNotAllowed,

    #[error("provider error ({code}): {message}")]
    Provider { code: String, message: String },
}

impl AuthError {
    /// Normalise a provider error code (or, for providers that only return a
    /// message, the message text).
    pub fn from_provider_code(code: &str, message: &str) -> Self {
        match code {
            "auth/user-not-found" => return AuthError::UserNotFound,
            "auth/wrong-password" | "auth/invalid-credential" | "auth/invalid-login-credentials" => {
                return AuthError::InvalidCredentials;
            }
            "auth/invalid-email" => return AuthError::InvalidEmail,
            "auth/user-disabled" => return AuthError::UserDisabled,
            "auth/too-many-requests" => return AuthError::RateLimited,
            "auth/email-already-in-use" => return AuthError::EmailInUse,
            "auth/weak-password" => return AuthError::WeakPassword,
            "auth/operation-not-allowed" => return AuthError::OperationNotAllowed,
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("invalid login credentials") {
            AuthError::InvalidCredentials
        } else if lower.contains("email not confirmed") {
            AuthError::EmailNotConfirmed
        } else if lower.contains("already registered") {
            AuthError::EmailInUse
        } else if lower.contains("password should be at least") {
            AuthError::WeakPassword
        } else if lower.contains("user not found") {
            AuthError::UserNotFound
        } else if lower.contains("too many requests") || lower.contains("rate limit") {
            AuthError::RateLimited
        } else {
            AuthError::Provider {
                code: code.to_string(),
                message: message.to_string(),
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailNotConfirmed => "email_not_confirmed",
            AuthError::RateLimited => "rate_limited",
            AuthError::WeakPassword => "weak_password",
            AuthError::EmailInUse => "email_in_use",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserDisabled => "user_disabled",
            AuthError::OperationNotAllowed => "operation_not_allowed",
            AuthError::Provider { .. } => "provider_error",
        }
    }

    /// Message suitable for showing on the sign-in screen.
    pub fn user_message(&self) -> &str {
        match self {
            AuthError::InvalidCredentials => "Email or password is incorrect.",
            AuthError::EmailNotConfirmed => "Confirm your email address before signing in.",
            AuthError::RateLimited => "Too many attempts. Try again in a few minutes.",
            AuthError::WeakPassword => "Password is too weak.",
            AuthError::EmailInUse => "This email is already registered.",
            AuthError::InvalidEmail => "Email address is invalid.",
            AuthError::UserNotFound => "No account found for this email.",
            AuthError::UserDisabled => "This account has been disabled.",
            AuthError::OperationNotAllowed => "This sign-in method is not enabled.",
            AuthError::Provider { .. } => "Authentication failed. Try again.",
        }
    }
}
