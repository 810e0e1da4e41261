//! Configuration loading and representation.
//!
//! Everything comes from environment variables:
//!
//! | Variable                              | Default          |
//! |---------------------------------------|------------------|
//! | `CLINICFLOW_BIND_ADDR`                | `127.0.0.1:8080` |
//! | `DATABASE_URL`                        | unset (in-memory store) |
//! | `CLINICFLOW_PROFILE_RETRY_ATTEMPTS`   | `5`              |
//! | `CLINICFLOW_PROFILE_RETRY_DELAY_MS`   | `500`            |
//! | `CLINICFLOW_PROFILE_PROVISIONING`     | `client`         |

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PROFILE_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_PROFILE_RETRY_DELAY_MS: u64 = 500;

/// Who creates the pending profile after a successful sign-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ProfileProvisioning {
    /// The session store inserts the profile itself.
    #[default]
    Client,
    /// A provider-side hook (database trigger) inserts it; the session only
    /// waits for it to appear.
    ProviderHook,
}

impl core::str::FromStr for ProfileProvisioning {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "provider_hook" | "provider-hook" | "hook" => Ok(Self::ProviderHook),
            other => Err(ConfigError::Invalid {
                key: "CLINICFLOW_PROFILE_PROVISIONING",
                value: other.to_string(),
                reason: "expected 'client' or 'provider_hook'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub profile_retry_attempts: u32,
    pub profile_retry_delay: Duration,
    pub provisioning: ProfileProvisioning,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("CLINICFLOW_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.trim().parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "CLINICFLOW_BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let profile_retry_attempts = match get("CLINICFLOW_PROFILE_RETRY_ATTEMPTS") {
            None => DEFAULT_PROFILE_RETRY_ATTEMPTS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CLINICFLOW_PROFILE_RETRY_ATTEMPTS",
                        value: raw,
                        reason: "expected a positive integer".to_string(),
                    });
                }
            },
        };

        let delay_ms = match get("CLINICFLOW_PROFILE_RETRY_DELAY_MS") {
            None => DEFAULT_PROFILE_RETRY_DELAY_MS,
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "CLINICFLOW_PROFILE_RETRY_DELAY_MS",
                value: raw.clone(),
                reason: "expected milliseconds as an integer".to_string(),
            })?,
        };

        let provisioning = match get("CLINICFLOW_PROFILE_PROVISIONING") {
            None => ProfileProvisioning::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            profile_retry_attempts,
            profile_retry_delay: Duration::from_millis(delay_ms),
            provisioning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.profile_retry_attempts, 5);
        assert_eq!(cfg.profile_retry_delay, Duration::from_millis(500));
        assert_eq!(cfg.provisioning, ProfileProvisioning::Client);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("CLINICFLOW_BIND_ADDR", "0.0.0.0:9000"),
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("CLINICFLOW_PROFILE_RETRY_ATTEMPTS", "3"),
            ("CLINICFLOW_PROFILE_RETRY_DELAY_MS", "250"),
            ("CLINICFLOW_PROFILE_PROVISIONING", "provider_hook"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/clinic"));
        assert_eq!(cfg.profile_retry_attempts, 3);
        assert_eq!(cfg.profile_retry_delay, Duration::from_millis(250));
        assert_eq!(cfg.provisioning, ProfileProvisioning::ProviderHook);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config(&[("CLINICFLOW_BIND_ADDR", "nowhere")]).is_err());
        assert!(config(&[("CLINICFLOW_PROFILE_RETRY_ATTEMPTS", "0")]).is_err());
        assert!(config(&[("CLINICFLOW_PROFILE_RETRY_DELAY_MS", "soon")]).is_err());

        let err = config(&[("CLINICFLOW_PROFILE_PROVISIONING", "magic")]).unwrap_err();
        assert!(err.to_string().contains("CLINICFLOW_PROFILE_PROVISIONING"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(cfg.database_url, None);
    }
}
