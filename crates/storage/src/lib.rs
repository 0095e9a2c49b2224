//! SQLite-backed audit log for charter organizations.
//!
//! Every privileged mutation in an organization (registry entries,
//! permission changes, executor registration, script results) emits an
//! audit record. Records of a transaction only reach this store once the
//! transaction committed; reverted work never leaves a trace here.
//!
//! # Core Concepts
//!
//! ## EventStore
//!
//! The [`EventStore`] wraps a SQLite database and provides methods to append
//! records and query them per transaction or per emitting component.
//!
//! ## Event
//!
//! An [`Event`] has a unique id, the [`TxId`] of the transaction that
//! committed it, the emitting component's address, the block it was
//! committed in, and an [`EventKind`].
//!
//! # Example
//!
//! ```no_run
//! use policy::Address;
//! use storage::{Event, EventKind, EventStore, TxId};
//!
//! let store = EventStore::open("events.db")?;
//!
//! let tx = TxId::new();
//! let registry = Address::from_low_u64(2);
//! store.append(&Event::new(
//!     tx,
//!     registry,
//!     1,
//!     chrono::Utc::now(),
//!     EventKind::ExecutorRegistered { index: 1, executor: Address::from_low_u64(3) },
//! ))?;
//!
//! for event in store.load_transaction(tx)? {
//!     println!("{} {:?}", event.block, event.kind);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind, TxId};
pub use store::{EventStore, TransactionSummary};
