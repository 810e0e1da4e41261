//! Infrastructure layer: identity provider, record store, profile store, config.

pub mod config;
pub mod identity;
pub mod profiles;
pub mod record_store;

pub use config::{AppConfig, ConfigError, ProfileProvisioning};
pub use identity::{AuthError, AuthEvent, IdentityProvider, InMemoryIdentityProvider, SignUpHook};
pub use profiles::{ProfileStore, ProvisionProfileHook, RecordProfileStore};
pub use record_store::{
    Collection, Direction, Filter, FilterOp, InMemoryRecordStore, ListOptions, ListResult, OrderBy,
    Record, RecordStore, StoreError,
};
#[cfg(feature = "postgres")]
pub use record_store::PostgresRecordStore;
