//! In-memory permission host.

use crate::{
    Address, Environment, Error, PermissionRecord, PermissionRequest, PermissionStore, RoleId,
};
use std::collections::HashMap;

/// Permission records kept in a map, with a settable block context and
/// fixed oracle answers. Unknown oracles deny.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<(Address, RoleId), PermissionRecord>,
    oracles: HashMap<Address, bool>,
    pub block_number: u64,
    pub timestamp: u64,
}

impl MemoryStore {
    pub fn set_oracle(&mut self, oracle: Address, answer: bool) {
        self.oracles.insert(oracle, answer);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PermissionStore for MemoryStore {
    type Error = Error;

    fn load(&mut self, target: Address, role: RoleId) -> Result<Option<PermissionRecord>, Error> {
        Ok(self.records.get(&(target, role)).cloned())
    }

    fn save(
        &mut self,
        target: Address,
        role: RoleId,
        record: &PermissionRecord,
    ) -> Result<(), Error> {
        self.records.insert((target, role), record.clone());
        Ok(())
    }
}

impl Environment for MemoryStore {
    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn can_perform(&mut self, oracle: Address, _request: &PermissionRequest) -> bool {
        self.oracles.get(&oracle).copied().unwrap_or(false)
    }
}
