//! Password policy applied before a sign-up reaches the identity provider.

use thiserror::Error;

/// Passwords that are refused regardless of length (compared case-insensitively).
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "123321", "111111", "000000", "qwerty", "abcdef", "123123", "abc123",
    "senha", "teste",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("password is required")]
    Missing,

    #[error("password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("password is too weak; avoid obvious sequences and common words")]
    Common,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        // Both identity providers refuse anything shorter.
        Self { min_length: 6 }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.is_empty() {
            return Err(PasswordPolicyError::Missing);
        }
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort { min: self.min_length });
        }
        if is_common(password) {
            return Err(PasswordPolicyError::Common);
        }
        Ok(())
    }
}

fn is_common(password: &str) -> bool {
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return true;
    }

    // A single repeated character ("aaaaaa", "999999").
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}
