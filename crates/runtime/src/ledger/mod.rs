//! Deterministic, journaled execution ledger.
//!
//! The ledger owns every component and its storage. Each top-level
//! operation either commits all of its effects or none: every frame takes a
//! checkpoint on entry and rolls back to it when the frame fails, and the
//! failure then unwinds the enclosing frames too.

mod env;
mod journal;

pub use env::Env;

use crate::{Component, Error, Result};
use journal::{Checkpoint, Entry, Journal};
use policy::{Address, Word};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{Event, EventKind, EventStore, TxId};
use tracing::{debug, info, warn};

/// Frames nested deeper than this fail with [`Error::CallDepthExceeded`].
pub const MAX_CALL_DEPTH: usize = 128;

/// Height and time of the block operations execute in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 1,
            timestamp: 1_700_000_000,
        }
    }
}

/// Outcome of a committed top-level operation.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub tx_id: TxId,
    pub value: T,
    /// Audit records the operation emitted, in order.
    pub events: Vec<Event>,
}

/// A committed call.
pub type Receipt = Committed<Vec<u8>>;

struct Account {
    code: Arc<dyn Component>,
    storage: BTreeMap<Word, Vec<u8>>,
}

pub struct Ledger {
    accounts: BTreeMap<Address, Account>,
    nonces: BTreeMap<Address, u64>,
    journal: Journal,
    pending: Vec<(Address, EventKind)>,
    block: BlockContext,
    store: Option<EventStore>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            nonces: BTreeMap::new(),
            journal: Journal::default(),
            pending: Vec::new(),
            block: BlockContext::default(),
            store: None,
        }
    }

    /// Persist the audit records of every committed operation to `store`.
    pub fn with_store(mut self, store: EventStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&EventStore> {
        self.store.as_ref()
    }

    pub fn block(&self) -> BlockContext {
        self.block
    }

    /// Move to the next block, `seconds` later. Both counters saturate.
    pub fn advance_block(&mut self, seconds: u64) {
        self.block.number = self.block.number.saturating_add(1);
        self.block.timestamp = self.block.timestamp.saturating_add(seconds);
    }

    /// Name of the component deployed at `address`.
    pub fn code_name(&self, address: Address) -> Option<&'static str> {
        self.accounts.get(&address).map(|a| a.code.name())
    }

    /// Raw storage value, for inspection.
    pub fn storage_at(&self, address: Address, key: &Word) -> Option<&[u8]> {
        self.accounts
            .get(&address)
            .and_then(|a| a.storage.get(key))
            .map(Vec::as_slice)
    }

    /// Call `to` from the account `from` as one transaction.
    pub fn transact(&mut self, from: Address, to: Address, input: &[u8]) -> Result<Receipt> {
        self.atomically(from, |env| env.call(to, input))
    }

    /// Deploy `component` from `from` as one transaction.
    pub fn deploy(
        &mut self,
        from: Address,
        component: impl Component,
        args: &[u8],
    ) -> Result<Address> {
        let code: Arc<dyn Component> = Arc::new(component);
        Ok(self.atomically(from, |env| env.deploy(code, args))?.value)
    }

    /// Read-only call; never commits anything.
    pub fn view(&mut self, to: Address, input: &[u8]) -> Result<Vec<u8>> {
        let checkpoint = self.checkpoint();
        let result = Env::top(self, Address::ZERO).static_call(to, input);
        self.revert_to(checkpoint);
        result
    }

    /// Run `f` as one transaction sent by `from`: commit everything it did
    /// if it succeeds, nothing if it fails.
    pub fn atomically<T>(
        &mut self,
        from: Address,
        f: impl FnOnce(&mut Env<'_>) -> Result<T>,
    ) -> Result<Committed<T>> {
        let checkpoint = self.checkpoint();
        let tx_id = TxId::new();

        let result = f(&mut Env::top(self, from));
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.revert_to(checkpoint);
                warn!(%tx_id, %from, error = %e, "transaction reverted");
                return Err(e);
            }
        };

        let block = self.block;
        let timestamp = match chrono_timestamp(block.timestamp) {
            Ok(timestamp) => timestamp,
            Err(e) => {
                self.revert_to(checkpoint);
                warn!(%tx_id, error = %e, "transaction reverted");
                return Err(e);
            }
        };
        let events: Vec<Event> = self.pending[checkpoint.events..]
            .iter()
            .map(|(emitter, kind)| {
                Event::new(tx_id, *emitter, block.number, timestamp, kind.clone())
            })
            .collect();

        if let Some(store) = &self.store {
            if let Err(e) = store.append_all(&events) {
                self.revert_to(checkpoint);
                warn!(%tx_id, error = %e, "audit log write failed, transaction reverted");
                return Err(e.into());
            }
        }

        self.journal.clear();
        self.pending.clear();
        info!(%tx_id, %from, block = block.number, events = events.len(), "transaction committed");

        Ok(Committed {
            tx_id,
            value,
            events,
        })
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal: self.journal.len(),
            events: self.pending.len(),
        }
    }

    pub(crate) fn revert_to(&mut self, checkpoint: Checkpoint) {
        for entry in self.journal.unwind(checkpoint.journal) {
            match entry {
                Entry::StorageSet {
                    address,
                    key,
                    previous,
                } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        match previous {
                            Some(value) => account.storage.insert(key, value),
                            None => account.storage.remove(&key),
                        };
                    }
                }
                Entry::AccountCreated { address } => {
                    self.accounts.remove(&address);
                }
                Entry::NonceSet { address, previous } => match previous {
                    Some(nonce) => {
                        self.nonces.insert(address, nonce);
                    }
                    None => {
                        self.nonces.remove(&address);
                    }
                },
            }
        }
        self.pending.truncate(checkpoint.events);
    }

    pub(crate) fn code(&self, address: Address) -> Option<Arc<dyn Component>> {
        self.accounts.get(&address).map(|a| Arc::clone(&a.code))
    }

    pub(crate) fn has_code(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    pub(crate) fn load(&self, address: Address, key: &Word) -> Option<&[u8]> {
        self.storage_at(address, key)
    }

    pub(crate) fn set(
        &mut self,
        address: Address,
        key: Word,
        value: Option<Vec<u8>>,
    ) -> Result<()> {
        let account = self.accounts.get_mut(&address).ok_or(Error::NoCode(address))?;
        let previous = match value {
            Some(value) => account.storage.insert(key, value),
            None => account.storage.remove(&key),
        };
        self.journal.record(Entry::StorageSet {
            address,
            key,
            previous,
        });
        Ok(())
    }

    pub(crate) fn emit(&mut self, emitter: Address, kind: EventKind) {
        debug!(%emitter, kind = kind.name(), "audit record");
        self.pending.push((emitter, kind));
    }

    /// Reserve the next address for a deployment by `deployer`.
    pub(crate) fn next_address(&mut self, deployer: Address) -> Address {
        let previous = self.nonces.get(&deployer).copied();
        let nonce = previous.unwrap_or(0);
        self.nonces.insert(deployer, nonce + 1);
        self.journal.record(Entry::NonceSet {
            address: deployer,
            previous,
        });
        derive_address(deployer, nonce)
    }

    pub(crate) fn create_account(
        &mut self,
        address: Address,
        code: Arc<dyn Component>,
    ) -> Result<()> {
        if self.accounts.contains_key(&address) {
            return Err(Error::Reverted(format!("address {address} already has code")));
        }
        self.accounts.insert(
            address,
            Account {
                code,
                storage: BTreeMap::new(),
            },
        );
        self.journal.record(Entry::AccountCreated { address });
        Ok(())
    }
}

/// Address of the `nonce`-th deployment by `deployer`.
pub fn derive_address(deployer: Address, nonce: u64) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(deployer.0);
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address(bytes)
}

/// Storage key for `label` qualified by `parts`.
pub fn slot(label: &str, parts: &[Word]) -> Word {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    for part in parts {
        hasher.update(part.0);
    }
    Word(hasher.finalize().into())
}

fn chrono_timestamp(secs: u64) -> Result<chrono::DateTime<chrono::Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .ok_or(Error::TimestampOutOfRange(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Decoder, Encoder};
    use pretty_assertions::assert_eq;

    const ALICE: Address = Address::from_low_u64(0xa11ce);

    fn key() -> Word {
        slot("test.key", &[])
    }

    /// Writes its argument, then forwards the rest of the payload to the
    /// address in the second word, failing if the forward fails.
    struct Recorder;

    impl Component for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
            let mut args = Decoder::new(input);
            let value = args.u64()?;
            env.store(key(), &value)?;
            let (caller, this) = (env.caller(), env.this());
            env.emit(EventKind::ScriptCall {
                sender: caller,
                source: this,
                target: this,
            })?;
            if value == 0 {
                return Err(Error::Reverted("zero".into()));
            }
            if args.remaining() > 0 {
                let next = args.address()?;
                let rest = args.bytes()?;
                env.call(next, &rest)?;
            }
            Ok(Encoder::new().u64(value).finish())
        }
    }

    struct Recursive;

    impl Component for Recursive {
        fn name(&self) -> &'static str {
            "recursive"
        }

        fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
            let this = env.this();
            env.call(this, input)
        }
    }

    struct Writer;

    impl Component for Writer {
        fn name(&self) -> &'static str {
            "writer"
        }

        fn call(&self, env: &mut Env<'_>, _input: &[u8]) -> Result<Vec<u8>> {
            env.store(key(), &1u64)?;
            Ok(Vec::new())
        }
    }

    fn stored(ledger: &Ledger, at: Address) -> Option<u64> {
        ledger
            .storage_at(at, &key())
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
    }

    #[test]
    fn commits_successful_transactions() {
        let mut ledger = Ledger::new();
        let a = ledger.deploy(ALICE, Recorder, &[]).unwrap();

        let receipt = ledger
            .transact(ALICE, a, &Encoder::new().u64(7).finish())
            .unwrap();
        assert_eq!(Decoder::new(&receipt.value).u64().unwrap(), 7);
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events[0].emitter, a);
        assert_eq!(stored(&ledger, a), Some(7));
    }

    #[test]
    fn nested_failure_reverts_every_frame() {
        let mut ledger = Ledger::new();
        let a = ledger.deploy(ALICE, Recorder, &[]).unwrap();
        let b = ledger.deploy(ALICE, Recorder, &[]).unwrap();

        let inner = Encoder::new().u64(0).finish();
        let outer = Encoder::new().u64(5).address(b).bytes(&inner).finish();
        let err = ledger.transact(ALICE, a, &outer).unwrap_err();

        assert!(matches!(err, Error::Reverted(ref reason) if reason == "zero"));
        assert_eq!(stored(&ledger, a), None);
        assert_eq!(stored(&ledger, b), None);

        // the ledger is still usable and nothing leaked into the next commit
        let receipt = ledger.transact(ALICE, b, &Encoder::new().u64(2).finish()).unwrap();
        assert_eq!(receipt.events.len(), 1);
    }

    #[test]
    fn static_calls_cannot_write() {
        let mut ledger = Ledger::new();
        let w = ledger.deploy(ALICE, Writer, &[]).unwrap();

        assert!(matches!(ledger.view(w, &[]), Err(Error::StaticCallViolation)));
        assert_eq!(stored(&ledger, w), None);
    }

    #[test]
    fn view_never_commits() {
        let mut ledger = Ledger::new();
        let r = ledger.deploy(ALICE, Recorder, &[]).unwrap();
        assert!(ledger.view(r, &Encoder::new().u64(1).finish()).is_err());
        assert_eq!(stored(&ledger, r), None);
    }

    #[test]
    fn unbounded_recursion_hits_the_depth_limit() {
        let mut ledger = Ledger::new();
        let r = ledger.deploy(ALICE, Recursive, &[]).unwrap();
        assert!(matches!(
            ledger.transact(ALICE, r, &[]),
            Err(Error::CallDepthExceeded(depth)) if depth == MAX_CALL_DEPTH + 1
        ));
    }

    #[test]
    fn calling_an_empty_address_fails() {
        let mut ledger = Ledger::new();
        let nobody = Address::from_low_u64(0xdead);
        assert!(matches!(
            ledger.transact(ALICE, nobody, &[]),
            Err(Error::NoCode(address)) if address == nobody
        ));
    }

    #[test]
    fn block_clock_saturates_and_refuses_unrepresentable_times() {
        let mut ledger = Ledger::new();
        let a = ledger.deploy(ALICE, Recorder, &[]).unwrap();
        ledger.transact(ALICE, a, &Encoder::new().u64(3).finish()).unwrap();

        ledger.advance_block(u64::MAX);
        ledger.advance_block(60);
        assert_eq!(ledger.block().number, 3);
        assert_eq!(ledger.block().timestamp, u64::MAX);

        let err = ledger
            .transact(ALICE, a, &Encoder::new().u64(9).finish())
            .unwrap_err();
        assert!(matches!(err, Error::TimestampOutOfRange(u64::MAX)));
        assert_eq!(stored(&ledger, a), Some(3));
    }

    #[test]
    fn failed_deployment_releases_the_address() {
        struct Refuses;

        impl Component for Refuses {
            fn name(&self) -> &'static str {
                "refuses"
            }

            fn construct(&self, _env: &mut Env<'_>, _args: &[u8]) -> Result<()> {
                Err(Error::Reverted("no".into()))
            }

            fn call(&self, _env: &mut Env<'_>, _input: &[u8]) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let mut ledger = Ledger::new();
        assert!(ledger.deploy(ALICE, Refuses, &[]).is_err());
        let first = derive_address(ALICE, 0);
        assert_eq!(ledger.code_name(first), None);

        let deployed = ledger.deploy(ALICE, Writer, &[]).unwrap();
        assert_eq!(deployed, first);
        assert_eq!(ledger.code_name(deployed), Some("writer"));
    }
}
