//! Capability-based permission engine.
//!
//! Core principle: **every privileged operation names a role, and a role is
//! held only where its manager granted it.**
//!
//! - [`Acl`] decides [`PermissionRequest`]s and applies grants, revocations
//!   and manager changes against any [`PermissionStore`].
//! - [`Predicate`]s narrow a grant to particular arguments, block ranges or
//!   an external oracle.
//! - [`Manifest`] seeds permissions from TOML.

mod acl;
mod error;
mod manifest;
mod memory;
mod predicate;
mod request;
mod types;

pub use acl::{
    Acl, ANY_ENTITY, BURN_ENTITY, Change, Decision, Grant, Grantee, Manager, PermissionRecord,
    PermissionStore,
};
pub use error::{Error, Result};
pub use manifest::{Manifest, PermissionEntry, PermissionSpec};
pub use memory::MemoryStore;
pub use predicate::{Arg, Environment, Op, Predicate};
pub use request::PermissionRequest;
pub use types::{Address, RoleId, Word};
