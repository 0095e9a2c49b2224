//! Audit record types.

use chrono::{DateTime, Utc};
use policy::{Address, Change, Predicate, RoleId, Word};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Uuid);

impl TxId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A registry entry was set.
    EntrySet {
        namespace: Word,
        app_id: Word,
        implementation: Address,
    },
    /// A proxy instance was created for an app id.
    InstanceCreated {
        proxy: Address,
        app_id: Word,
        upgradeable: bool,
    },
    PermissionCreated {
        target: Address,
        role: RoleId,
        manager: Address,
    },
    PermissionGranted {
        grantee: Address,
        target: Address,
        role: RoleId,
        predicates: Vec<Predicate>,
    },
    PermissionRevoked {
        grantee: Address,
        target: Address,
        role: RoleId,
    },
    ManagerChanged {
        target: Address,
        role: RoleId,
        manager: Address,
    },
    PermissionFrozen {
        target: Address,
        role: RoleId,
    },
    ExecutorRegistered {
        index: u32,
        executor: Address,
    },
    ExecutorEnabled {
        index: u32,
        executor: Address,
    },
    ExecutorDisabled {
        index: u32,
        executor: Address,
    },
    /// One action of a calls script was issued.
    ScriptCall {
        sender: Address,
        source: Address,
        target: Address,
    },
    /// A script ran to completion.
    ScriptResult {
        executor: Address,
        #[serde(with = "hex")]
        script: Vec<u8>,
        #[serde(with = "hex")]
        input: Vec<u8>,
        #[serde(with = "hex")]
        output: Vec<u8>,
    },
}

impl EventKind {
    /// Stable name used for filtering (`charter logs --kind`).
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::EntrySet { .. } => "entry_set",
            EventKind::InstanceCreated { .. } => "instance_created",
            EventKind::PermissionCreated { .. } => "permission_created",
            EventKind::PermissionGranted { .. } => "permission_granted",
            EventKind::PermissionRevoked { .. } => "permission_revoked",
            EventKind::ManagerChanged { .. } => "manager_changed",
            EventKind::PermissionFrozen { .. } => "permission_frozen",
            EventKind::ExecutorRegistered { .. } => "executor_registered",
            EventKind::ExecutorEnabled { .. } => "executor_enabled",
            EventKind::ExecutorDisabled { .. } => "executor_disabled",
            EventKind::ScriptCall { .. } => "script_call",
            EventKind::ScriptResult { .. } => "script_result",
        }
    }
}

impl From<Change> for EventKind {
    fn from(change: Change) -> Self {
        match change {
            Change::Created {
                target,
                role,
                manager,
            } => EventKind::PermissionCreated {
                target,
                role,
                manager,
            },
            Change::Granted {
                grantee,
                target,
                role,
                predicates,
            } => EventKind::PermissionGranted {
                grantee,
                target,
                role,
                predicates,
            },
            Change::Revoked {
                grantee,
                target,
                role,
            } => EventKind::PermissionRevoked {
                grantee,
                target,
                role,
            },
            Change::ManagerChanged {
                target,
                role,
                manager,
            } => EventKind::ManagerChanged {
                target,
                role,
                manager,
            },
            Change::Frozen { target, role } => EventKind::PermissionFrozen { target, role },
        }
    }
}

/// An audit record emitted by a component during a committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub tx_id: TxId,
    /// Storage context that emitted the record.
    pub emitter: Address,
    pub block: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(
        tx_id: TxId,
        emitter: Address,
        block: u64,
        timestamp: DateTime<Utc>,
        kind: EventKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx_id,
            emitter,
            block,
            timestamp,
            kind,
        }
    }
}
