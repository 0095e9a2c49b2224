//! Charter runtime: an organization core on a deterministic ledger.
//!
//! The runtime is organized around these concepts:
//!
//! - **Ledger**: journaled world state. Every top-level operation commits
//!   all of its effects or none, and nested calls roll back on failure.
//! - **Component**: stateless code deployed at an address, driven through a
//!   selector-dispatched ABI and running against an [`Env`].
//! - **Kernel**: the namespace registry wiring apps into an organization,
//!   with the ACL app deciding every privileged operation.
//! - **Scripts**: versioned action batches, resolved through the script
//!   registry and run by an executor in the caller's context.
//!
//! # Example
//!
//! ```ignore
//! use policy::Address;
//! use runtime::{Action, Counter, Ledger, Organization, calls, execute};
//!
//! let creator = Address::from_low_u64(0x100);
//! let mut ledger = Ledger::new();
//! let org = Organization::bootstrap(&mut ledger, creator)?.value;
//! let host = org.install_script_host(&mut ledger, creator)?;
//! let counter = ledger.deploy(creator, Counter, &[])?;
//!
//! let script = calls::encode(&[Action::new(counter, Counter::increment())])?;
//! execute(&mut ledger, creator, host, &script)?;
//! assert_eq!(Counter::value_of(&mut ledger, counter)?, 1);
//! ```

pub mod abi;
pub mod acl;
pub mod app;
pub mod apps;
mod component;
mod error;
pub mod ids;
pub mod interface;
pub mod kernel;
pub mod ledger;
mod org;
pub mod proxy;
pub mod script;

pub use acl::AclApp;
pub use apps::{Counter, ScriptHost};
pub use component::Component;
pub use error::{Error, Result};
pub use kernel::{Kernel, Namespace};
pub use ledger::{BlockContext, Committed, Env, Ledger, MAX_CALL_DEPTH, Receipt};
pub use org::{Organization, execute, execute_with_ban};
pub use proxy::{AppProxy, KernelProxy, PinnedAppProxy};
pub use script::{Action, CALLS_SPEC_ID, CallsScript, ScriptRegistry, ScriptRunner, calls};
