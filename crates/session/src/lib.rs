//! `clinicflow-session`: session lifecycle on top of the identity provider.
//!
//! - `store`: the session store and its auth event loop
//! - `resolver`: profile lookup with retry, plus admin approve/reject
//! - `guard`: route guard and the screen table
//! - `retry`: the fixed-delay retry policy

pub mod guard;
pub mod resolver;
pub mod retry;
pub mod store;

pub use guard::{GuardDecision, Screen, guard, visible_screens};
pub use resolver::{ProfileFilter, ProfileResolver, ResolverError};
pub use retry::{Resolution, RetryPolicy};
pub use store::{SecurityAlert, Session, SessionError, SessionStore};

#[cfg(test)]
mod lifecycle_tests;
