//! The organization's permission app.
//!
//! Wraps the [`policy::Acl`] engine so its records live in the app's own
//! storage and its predicates see the ledger's block and oracles. Every
//! mutation becomes an audit record.

use crate::abi::{self, Decoder, Encoder, Selector};
use crate::ledger::slot;
use crate::{Component, Env, Error, Result, app, ids, interface};
use policy::{
    Acl, Address, Change, Environment, PermissionRecord, PermissionRequest, PermissionStore,
    Predicate, RoleId, Word,
};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Adapter giving the engine access to one call frame.
struct LedgerHost<'e, 'a> {
    env: &'e mut Env<'a>,
}

impl<'e, 'a> LedgerHost<'e, 'a> {
    fn new(env: &'e mut Env<'a>) -> Self {
        Self { env }
    }
}

fn record_slot(target: Address, role: RoleId) -> Word {
    slot("acl.permission", &[target.to_word(), role.0])
}

impl PermissionStore for LedgerHost<'_, '_> {
    type Error = Error;

    fn load(&mut self, target: Address, role: RoleId) -> Result<Option<PermissionRecord>> {
        self.env.load(&record_slot(target, role))
    }

    fn save(&mut self, target: Address, role: RoleId, record: &PermissionRecord) -> Result<()> {
        self.env.store(record_slot(target, role), record)
    }
}

impl Environment for LedgerHost<'_, '_> {
    fn block_number(&self) -> u64 {
        self.env.block().number
    }

    fn timestamp(&self) -> u64 {
        self.env.block().timestamp
    }

    fn can_perform(&mut self, oracle: Address, request: &PermissionRequest) -> bool {
        let query = Encoder::call(interface::oracle::CAN_PERFORM)
            .address(request.who)
            .address(request.target)
            .word(request.role.0)
            .words(&request.args)
            .finish();
        match self
            .env
            .static_call(oracle, &query)
            .and_then(|answer| Decoder::new(&answer).bool())
        {
            Ok(answer) => answer,
            Err(e) => {
                debug!(%oracle, error = %e, "oracle failed, denying");
                false
            }
        }
    }
}

fn decode_predicates(words: &[Word]) -> Result<Vec<Predicate>> {
    words
        .iter()
        .map(|w| Predicate::decode(w).map_err(Error::from))
        .collect()
}

fn encode_predicates(predicates: &[Predicate]) -> Result<Vec<Word>> {
    predicates
        .iter()
        .map(|p| p.encode().map_err(Error::from))
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Initialize,
    CreatePermission,
    CreateBurnedPermission,
    GrantPermission,
    RevokePermission,
    SetPermissionManager,
    BurnPermissionManager,
    GetPermissionManager,
    GetPermission,
    HasPermission,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::acl::*;
    abi::dispatch_table(&[
        (INITIALIZE, Method::Initialize),
        (CREATE_PERMISSION, Method::CreatePermission),
        (CREATE_BURNED_PERMISSION, Method::CreateBurnedPermission),
        (GRANT_PERMISSION, Method::GrantPermission),
        (REVOKE_PERMISSION, Method::RevokePermission),
        (SET_PERMISSION_MANAGER, Method::SetPermissionManager),
        (BURN_PERMISSION_MANAGER, Method::BurnPermissionManager),
        (GET_PERMISSION_MANAGER, Method::GetPermissionManager),
        (GET_PERMISSION, Method::GetPermission),
        (HAS_PERMISSION, Method::HasPermission),
    ])
});

/// ACL implementation. The base is petrified at deployment; the kernel
/// installs a proxy in front of it.
pub struct AclApp;

impl AclApp {
    fn record(env: &mut Env<'_>, changes: Vec<Change>) -> Result<()> {
        for change in changes {
            debug!(acl = %env.this(), ?change, "permission change");
            env.emit(change.into())?;
        }
        Ok(())
    }

    /// Only the kernel this ACL belongs to may initialize it; the creator
    /// receives `CREATE_PERMISSIONS_ROLE` and manages it.
    fn initialize(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let creator = args.address()?;
        let kernel = app::kernel(env)?;
        if env.caller() != kernel {
            return Err(Error::PermissionDenied(format!(
                "{} is not the kernel of this ACL",
                env.caller()
            )));
        }
        app::initialize(env)?;

        let this = env.this();
        let role = *ids::CREATE_PERMISSIONS_ROLE;
        let changes = Acl::new(&mut LedgerHost::new(env))
            .create_permission(creator, this, role, creator, Vec::new())?;
        Self::record(env, changes)?;
        info!(acl = %this, %creator, "ACL initialized");
        Ok(Vec::new())
    }

    fn create_permission(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let grantee = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);
        let manager = args.address()?;
        let predicates = decode_predicates(&args.words()?)?;
        app::require_initialized(env)?;
        app::auth(env, *ids::CREATE_PERMISSIONS_ROLE, &[])?;

        let changes = Acl::new(&mut LedgerHost::new(env))
            .create_permission(grantee, target, role, manager, predicates)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn create_burned_permission(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let target = args.address()?;
        let role = RoleId(args.word()?);
        app::require_initialized(env)?;
        app::auth(env, *ids::CREATE_PERMISSIONS_ROLE, &[])?;

        let changes = Acl::new(&mut LedgerHost::new(env)).create_burned_permission(target, role)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn grant(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let grantee = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);
        let predicates = decode_predicates(&args.words()?)?;
        app::require_initialized(env)?;

        let caller = env.caller();
        let changes = Acl::new(&mut LedgerHost::new(env))
            .grant(caller, grantee, target, role, predicates)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn revoke(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let grantee = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);
        app::require_initialized(env)?;

        let caller = env.caller();
        let changes = Acl::new(&mut LedgerHost::new(env)).revoke(caller, grantee, target, role)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn set_manager(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let manager = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);
        app::require_initialized(env)?;

        let caller = env.caller();
        let changes =
            Acl::new(&mut LedgerHost::new(env)).set_manager(caller, manager, target, role)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn burn(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let target = args.address()?;
        let role = RoleId(args.word()?);
        app::require_initialized(env)?;

        let caller = env.caller();
        let changes = Acl::new(&mut LedgerHost::new(env)).burn(caller, target, role)?;
        Self::record(env, changes)?;
        Ok(Vec::new())
    }

    fn get_permission(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let grantee = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);

        let grant = Acl::new(&mut LedgerHost::new(env)).grant_of(grantee, target, role)?;
        let out = match grant {
            Some(grant) => Encoder::new()
                .bool(true)
                .words(&encode_predicates(&grant.predicates)?),
            None => Encoder::new().bool(false).words(&[]),
        };
        Ok(out.finish())
    }

    fn has_permission(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let who = args.address()?;
        let target = args.address()?;
        let role = RoleId(args.word()?);
        let how = args.words()?;

        let request = PermissionRequest::new(who, target, role).with_args(how);
        let decision = Acl::new(&mut LedgerHost::new(env)).check(&request)?;
        if let policy::Decision::Deny { reason } = &decision {
            debug!(%who, %target, %role, %reason, "permission denied");
        }
        Ok(Encoder::new().bool(decision.is_allowed()).finish())
    }
}

impl Component for AclApp {
    fn name(&self) -> &'static str {
        "acl"
    }

    fn construct(&self, env: &mut Env<'_>, _args: &[u8]) -> Result<()> {
        app::petrify(env)
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let (selector, mut args) = abi::split_call(input)?;
        let method = METHODS
            .get(&selector)
            .copied()
            .ok_or(Error::UnknownSelector(selector))?;

        match method {
            Method::Initialize => Self::initialize(env, &mut args),
            Method::CreatePermission => Self::create_permission(env, &mut args),
            Method::CreateBurnedPermission => Self::create_burned_permission(env, &mut args),
            Method::GrantPermission => Self::grant(env, &mut args),
            Method::RevokePermission => Self::revoke(env, &mut args),
            Method::SetPermissionManager => Self::set_manager(env, &mut args),
            Method::BurnPermissionManager => Self::burn(env, &mut args),
            Method::GetPermissionManager => {
                let target = args.address()?;
                let role = RoleId(args.word()?);
                let manager = Acl::new(&mut LedgerHost::new(env)).manager(target, role)?;
                Ok(Encoder::new()
                    .address(manager.unwrap_or(Address::ZERO))
                    .finish())
            }
            Method::GetPermission => Self::get_permission(env, &mut args),
            Method::HasPermission => Self::has_permission(env, &mut args),
        }
    }
}
