//! Permission resolution and pre-execution access enforcement.
//!
//! [`PermissionResolver`] hydrates role, permission, and resource-grant data
//! from a [`GrantStore`] backend into an immutable [`PermissionBundle`],
//! cached per subject with a TTL. [`AccessContext`] combines a validated
//! identity with its bundle; [`AccessEnforcer`] cross-checks extracted table
//! references against it before any SQL reaches the analytical engine.

mod context;
mod enforcer;
mod grants;
mod resolver;

pub use context::AccessContext;
pub use enforcer::{AccessEnforcer, EnforcementError};
pub use grants::{AccessLevel, GrantStore, GrantStoreError, PermissionBundle, ResourceGrant};
pub use resolver::PermissionResolver;
