use crate::abi::Selector;
use policy::{Address, Word};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("not initialized")]
    NotInitialized,

    #[error("invalid executor: {0}")]
    InvalidExecutor(String),

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("script action targets banned address {0}")]
    BannedAddress(Address),

    /// A component refused the call. Nested frames pass this through as is.
    #[error("reverted: {0}")]
    Reverted(String),

    #[error("no code at {0}")]
    NoCode(Address),

    #[error("call depth exceeded at depth {0}")]
    CallDepthExceeded(usize),

    #[error("state change attempted during a static call")]
    StaticCallViolation,

    #[error("unknown selector {0}")]
    UnknownSelector(Selector),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("no entry for {app_id} in namespace {namespace}")]
    MissingEntry { namespace: Word, app_id: Word },

    #[error("{app_id} is already bound to {existing}")]
    EntryConflict { app_id: Word, existing: Address },

    #[error("unknown namespace {0}")]
    UnknownNamespace(Word),

    #[error("executor {0} is already enabled")]
    ExecutorAlreadyEnabled(u32),

    #[error("executor {0} is already disabled")]
    ExecutorAlreadyDisabled(u32),

    #[error("script modified the kernel binding of {0}")]
    ProtectedStateModified(Address),

    #[error("block timestamp {0} is out of range")]
    TimestampOutOfRange(u64),

    #[error(transparent)]
    Policy(policy::Error),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<policy::Error> for Error {
    fn from(e: policy::Error) -> Self {
        match e {
            policy::Error::PermissionDenied(reason) => Error::PermissionDenied(reason),
            other => Error::Policy(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
