//! Policy error types.

use crate::{Address, RoleId};
use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// `create_permission` was called for a role that already has a manager.
    #[error("permission for role {role} at {target} already exists")]
    PermissionExists { target: Address, role: RoleId },

    /// The grantee already holds the role at the target.
    #[error("{grantee} already holds role {role} at {target}")]
    AlreadyGranted {
        grantee: Address,
        target: Address,
        role: RoleId,
    },

    /// The grantee does not hold the role at the target.
    #[error("{grantee} does not hold role {role} at {target}")]
    NotGranted {
        grantee: Address,
        target: Address,
        role: RoleId,
    },

    /// The permission was burned and can no longer be changed.
    #[error("permission for role {role} at {target} is frozen")]
    Frozen { target: Address, role: RoleId },

    /// A manager value that can never manage anything.
    #[error("invalid permission manager: {0}")]
    InvalidManager(Address),

    /// A value could not be interpreted (bad hex, bad predicate word, ...).
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// Failed to parse a permission manifest.
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// An I/O error occurred while reading a manifest.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
