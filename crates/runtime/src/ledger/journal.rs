//! Undo log backing checkpoints and rollback.

use policy::{Address, Word};

#[derive(Debug)]
pub(crate) enum Entry {
    StorageSet {
        address: Address,
        key: Word,
        previous: Option<Vec<u8>>,
    },
    AccountCreated {
        address: Address,
    },
    NonceSet {
        address: Address,
        previous: Option<u64>,
    },
}

/// Position to roll back to: journal length and pending audit record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    pub journal: usize,
    pub events: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<Entry>,
}

impl Journal {
    pub fn record(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries after `len`, newest first, removed from the journal.
    pub fn unwind(&mut self, len: usize) -> impl Iterator<Item = Entry> + '_ {
        self.entries.drain(len..).rev()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
