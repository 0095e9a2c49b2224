use crate::{Address, RoleId, Word};

/// A permission question: may `who` exercise `role` on `target`, given `args`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub who: Address,
    pub target: Address,
    pub role: RoleId,
    pub args: Vec<Word>,
}

impl PermissionRequest {
    pub fn new(who: Address, target: Address, role: RoleId) -> Self {
        Self {
            who,
            target,
            role,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Word>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// The argument at `position`, if the caller supplied one.
    pub fn arg(&self, position: usize) -> Option<Word> {
        self.args.get(position).copied()
    }
}
