//! `clinicflow-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by the auth, infra and session crates
//! (no infrastructure concerns).

pub mod aggregate;
pub mod email;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, Entity};
pub use email::EmailAddress;
pub use error::DomainError;
pub use id::{IdentityId, RecordId};
