//! Permission records and the engine that reads and mutates them.
//!
//! A record is keyed by `(target, role)`. A missing record means the role
//! was never created at that target and every check is denied; an existing
//! record always has a manager, the only account allowed to change it.

use crate::{Address, Environment, Error, PermissionRequest, Predicate, RoleId};
use serde::{Deserialize, Serialize};

/// Grantee sentinel matching any caller.
pub const ANY_ENTITY: Address = Address([0xff; 20]);

/// Grantee/manager sentinel that freezes a permission forever.
pub const BURN_ENTITY: Address = Address::from_low_u64(1);

/// Who a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    Account(Address),
    Any,
}

impl Grantee {
    pub fn from_address(address: Address) -> Self {
        if address == ANY_ENTITY {
            Grantee::Any
        } else {
            Grantee::Account(address)
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Grantee::Account(address) => *address,
            Grantee::Any => ANY_ENTITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Manager {
    Account(Address),
    /// Frozen: nobody may change the record again.
    Burned,
}

impl Manager {
    pub fn address(&self) -> Address {
        match self {
            Manager::Account(address) => *address,
            Manager::Burned => BURN_ENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    /// AND-combined; empty means unconditional.
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub manager: Manager,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl PermissionRecord {
    fn managed_by(manager: Address) -> Self {
        let manager = if manager == BURN_ENTITY {
            Manager::Burned
        } else {
            Manager::Account(manager)
        };
        Self {
            manager,
            grants: Vec::new(),
        }
    }

    /// The grant deciding for `who`: an exact grant wins over the wildcard.
    pub fn grant_for(&self, who: Address) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|g| g.grantee == Grantee::Account(who))
            .or_else(|| self.grants.iter().find(|g| g.grantee == Grantee::Any))
    }

    pub fn is_frozen(&self) -> bool {
        self.manager == Manager::Burned
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Outcome of a successful mutation, one per audit record to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    Created {
        target: Address,
        role: RoleId,
        manager: Address,
    },
    Granted {
        grantee: Address,
        target: Address,
        role: RoleId,
        predicates: Vec<Predicate>,
    },
    Revoked {
        grantee: Address,
        target: Address,
        role: RoleId,
    },
    ManagerChanged {
        target: Address,
        role: RoleId,
        manager: Address,
    },
    Frozen {
        target: Address,
        role: RoleId,
    },
}

/// Backing storage for permission records.
///
/// Implementations must read live state on every call; the engine never
/// caches a record between operations.
pub trait PermissionStore {
    type Error: From<Error>;

    fn load(
        &mut self,
        target: Address,
        role: RoleId,
    ) -> Result<Option<PermissionRecord>, Self::Error>;

    fn save(
        &mut self,
        target: Address,
        role: RoleId,
        record: &PermissionRecord,
    ) -> Result<(), Self::Error>;
}

/// The permission engine, borrowing its host for one operation.
pub struct Acl<'h, H> {
    host: &'h mut H,
}

impl<'h, H> Acl<'h, H>
where
    H: PermissionStore + Environment,
{
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }

    /// Decide a permission request.
    pub fn check(&mut self, request: &PermissionRequest) -> Result<Decision, H::Error> {
        let Some(record) = self.host.load(request.target, request.role)? else {
            return Ok(Decision::Deny {
                reason: format!("role {} was never created at {}", request.role, request.target),
            });
        };

        let Some(grant) = record.grant_for(request.who) else {
            return Ok(Decision::Deny {
                reason: format!(
                    "{} does not hold role {} at {}",
                    request.who, request.role, request.target
                ),
            });
        };

        for (i, predicate) in grant.predicates.iter().enumerate() {
            if !predicate.evaluate(&mut *self.host, request) {
                return Ok(Decision::Deny {
                    reason: format!("predicate #{i} of role {} not satisfied", request.role),
                });
            }
        }

        Ok(Decision::Allow)
    }

    pub fn has_permission(&mut self, request: &PermissionRequest) -> Result<bool, H::Error> {
        Ok(self.check(request)?.is_allowed())
    }

    /// Bootstrap a role at a target. Succeeds once per `(target, role)`.
    pub fn create_permission(
        &mut self,
        grantee: Address,
        target: Address,
        role: RoleId,
        manager: Address,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Change>, H::Error> {
        if self.host.load(target, role)?.is_some() {
            return Err(Error::PermissionExists { target, role }.into());
        }
        if manager.is_zero() || manager == ANY_ENTITY {
            return Err(Error::InvalidManager(manager).into());
        }

        let mut record = PermissionRecord::managed_by(manager);
        let mut changes = vec![Change::Created {
            target,
            role,
            manager,
        }];
        if grantee != BURN_ENTITY {
            record.grants.push(Grant {
                grantee: Grantee::from_address(grantee),
                predicates: predicates.clone(),
            });
            changes.push(Change::Granted {
                grantee,
                target,
                role,
                predicates,
            });
        }
        if grantee == BURN_ENTITY || record.is_frozen() {
            record.manager = Manager::Burned;
            changes.push(Change::Frozen { target, role });
        }

        self.host.save(target, role, &record)?;
        Ok(changes)
    }

    /// Create a role that is frozen from the start: nobody holds it, ever.
    pub fn create_burned_permission(
        &mut self,
        target: Address,
        role: RoleId,
    ) -> Result<Vec<Change>, H::Error> {
        if self.host.load(target, role)?.is_some() {
            return Err(Error::PermissionExists { target, role }.into());
        }
        self.host
            .save(target, role, &PermissionRecord::managed_by(BURN_ENTITY))?;
        Ok(vec![
            Change::Created {
                target,
                role,
                manager: BURN_ENTITY,
            },
            Change::Frozen { target, role },
        ])
    }

    pub fn grant(
        &mut self,
        caller: Address,
        grantee: Address,
        target: Address,
        role: RoleId,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Change>, H::Error> {
        let mut record = self.managed_record(caller, target, role)?;

        if grantee == BURN_ENTITY {
            record.manager = Manager::Burned;
            self.host.save(target, role, &record)?;
            return Ok(vec![Change::Frozen { target, role }]);
        }

        let entry = Grantee::from_address(grantee);
        if record.grants.iter().any(|g| g.grantee == entry) {
            return Err(Error::AlreadyGranted {
                grantee,
                target,
                role,
            }
            .into());
        }
        record.grants.push(Grant {
            grantee: entry,
            predicates: predicates.clone(),
        });
        self.host.save(target, role, &record)?;

        Ok(vec![Change::Granted {
            grantee,
            target,
            role,
            predicates,
        }])
    }

    pub fn revoke(
        &mut self,
        caller: Address,
        grantee: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Vec<Change>, H::Error> {
        let mut record = self.managed_record(caller, target, role)?;

        let entry = Grantee::from_address(grantee);
        let before = record.grants.len();
        record.grants.retain(|g| g.grantee != entry);
        if record.grants.len() == before {
            return Err(Error::NotGranted {
                grantee,
                target,
                role,
            }
            .into());
        }
        self.host.save(target, role, &record)?;

        Ok(vec![Change::Revoked {
            grantee,
            target,
            role,
        }])
    }

    /// Hand the record to a new manager. The manager can never be cleared.
    pub fn set_manager(
        &mut self,
        caller: Address,
        new_manager: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Vec<Change>, H::Error> {
        if new_manager.is_zero() || new_manager == ANY_ENTITY {
            return Err(Error::InvalidManager(new_manager).into());
        }
        let mut record = self.managed_record(caller, target, role)?;

        if new_manager == BURN_ENTITY {
            record.manager = Manager::Burned;
            self.host.save(target, role, &record)?;
            return Ok(vec![Change::Frozen { target, role }]);
        }

        record.manager = Manager::Account(new_manager);
        self.host.save(target, role, &record)?;
        Ok(vec![Change::ManagerChanged {
            target,
            role,
            manager: new_manager,
        }])
    }

    /// Freeze the record: existing grants stay, nothing changes any more.
    pub fn burn(
        &mut self,
        caller: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Vec<Change>, H::Error> {
        let mut record = self.managed_record(caller, target, role)?;
        record.manager = Manager::Burned;
        self.host.save(target, role, &record)?;
        Ok(vec![Change::Frozen { target, role }])
    }

    /// Current manager, `BURN_ENTITY` when frozen, `None` when never created.
    pub fn manager(&mut self, target: Address, role: RoleId) -> Result<Option<Address>, H::Error> {
        Ok(self.host.load(target, role)?.map(|r| r.manager.address()))
    }

    /// The grant recorded for exactly this grantee, ignoring the wildcard.
    pub fn grant_of(
        &mut self,
        grantee: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Option<Grant>, H::Error> {
        let entry = Grantee::from_address(grantee);
        Ok(self
            .host
            .load(target, role)?
            .and_then(|r| r.grants.into_iter().find(|g| g.grantee == entry)))
    }

    fn managed_record(
        &mut self,
        caller: Address,
        target: Address,
        role: RoleId,
    ) -> Result<PermissionRecord, H::Error> {
        let record = self.host.load(target, role)?.ok_or_else(|| {
            Error::PermissionDenied(format!("role {role} was never created at {target}"))
        })?;
        match record.manager {
            Manager::Burned => Err(Error::Frozen { target, role }.into()),
            Manager::Account(manager) if manager == caller => Ok(record),
            Manager::Account(_) => Err(Error::PermissionDenied(format!(
                "{caller} is not the manager of role {role} at {target}"
            ))
            .into()),
        }
    }
}
