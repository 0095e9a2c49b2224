//! Organization core: the namespace → id → implementation registry.
//!
//! The kernel runs behind a [`KernelProxy`](crate::proxy::KernelProxy), so
//! all of its state lives at the organization's address. Mutating the
//! registry requires `APP_MANAGER_ROLE` with arguments `[namespace, app_id]`,
//! which the kernel checks against the ACL it resolves from its own
//! registry at the moment of the check.

use crate::abi::{self, Decoder, Encoder, Selector};
use crate::ledger::slot;
use crate::proxy::{AppProxy, PinnedAppProxy};
use crate::{Component, Env, Error, Result, app, ids, interface};
use policy::{Address, Word};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use storage::EventKind;
use tracing::info;

static CORE_NAMESPACE: LazyLock<Word> = LazyLock::new(|| Word::hash("charter.namespace.core"));
static APP_BASES_NAMESPACE: LazyLock<Word> =
    LazyLock::new(|| Word::hash("charter.namespace.bases"));
static APP_ADDRESSES_NAMESPACE: LazyLock<Word> =
    LazyLock::new(|| Word::hash("charter.namespace.apps"));

/// Partition of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Kernel implementation.
    Core,
    /// Implementation templates proxies resolve to.
    AppBases,
    /// Live, directly usable instances.
    AppAddresses,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Core, Namespace::AppBases, Namespace::AppAddresses];

    pub fn id(&self) -> Word {
        match self {
            Namespace::Core => *CORE_NAMESPACE,
            Namespace::AppBases => *APP_BASES_NAMESPACE,
            Namespace::AppAddresses => *APP_ADDRESSES_NAMESPACE,
        }
    }

    pub fn from_id(id: &Word) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.id() == *id)
            .ok_or(Error::UnknownNamespace(*id))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Core => "core",
            Namespace::AppBases => "bases",
            Namespace::AppAddresses => "apps",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.name() == s)
            .ok_or_else(|| Error::UnknownNamespace(Word::hash(s.as_bytes())))
    }
}

pub(crate) fn read_entry(env: &Env<'_>, namespace: Namespace, app_id: Word) -> Result<Address> {
    Ok(env
        .load(&entry_slot(namespace, app_id))?
        .unwrap_or(Address::ZERO))
}

pub(crate) fn write_entry(
    env: &mut Env<'_>,
    namespace: Namespace,
    app_id: Word,
    implementation: Address,
) -> Result<()> {
    env.store(entry_slot(namespace, app_id), &implementation)
}

fn entry_slot(namespace: Namespace, app_id: Word) -> Word {
    slot("kernel.apps", &[namespace.id(), app_id])
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Initialize,
    SetApp,
    GetApp,
    CreateInstance,
    NewAppInstance,
    NewPinnedAppInstance,
    Acl,
    HasPermission,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::kernel::*;
    abi::dispatch_table(&[
        (INITIALIZE, Method::Initialize),
        (SET_APP, Method::SetApp),
        (GET_APP, Method::GetApp),
        (CREATE_INSTANCE, Method::CreateInstance),
        (NEW_APP_INSTANCE, Method::NewAppInstance),
        (NEW_PINNED_APP_INSTANCE, Method::NewPinnedAppInstance),
        (ACL, Method::Acl),
        (HAS_PERMISSION, Method::HasPermission),
    ])
});

/// Kernel implementation. Deploy it petrified and reach it through a
/// kernel proxy.
pub struct Kernel;

impl Kernel {
    /// Constructor arguments.
    pub fn args(petrify: bool) -> Vec<u8> {
        Encoder::new().bool(petrify).finish()
    }

    fn set_entry(
        env: &mut Env<'_>,
        namespace: Namespace,
        app_id: Word,
        implementation: Address,
    ) -> Result<()> {
        write_entry(env, namespace, app_id, implementation)?;
        env.emit(EventKind::EntrySet {
            namespace: namespace.id(),
            app_id,
            implementation,
        })?;
        info!(kernel = %env.this(), %namespace, %app_id, %implementation, "registry entry set");
        Ok(())
    }

    fn acl(env: &Env<'_>) -> Result<Address> {
        read_entry(env, Namespace::AppAddresses, *ids::ACL_APP_ID)
    }

    fn has_permission(
        env: &mut Env<'_>,
        who: Address,
        target: Address,
        role: Word,
        args: &[Word],
    ) -> Result<bool> {
        let acl = Self::acl(env)?;
        if acl.is_zero() {
            return Ok(false);
        }
        let query = Encoder::call(interface::acl::HAS_PERMISSION)
            .address(who)
            .address(target)
            .word(role)
            .words(args)
            .finish();
        Decoder::new(&env.static_call(acl, &query)?).bool()
    }

    /// The caller must hold `APP_MANAGER_ROLE` for `[namespace, app_id]`.
    fn authorize(env: &mut Env<'_>, namespace: Namespace, app_id: Word) -> Result<()> {
        let caller = env.caller();
        let this = env.this();
        let role = *ids::APP_MANAGER_ROLE;
        if Self::has_permission(env, caller, this, role.0, &[namespace.id(), app_id])? {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "{caller} may not manage {app_id} in namespace {namespace}"
            )))
        }
    }

    fn deploy_proxy(
        env: &mut Env<'_>,
        namespace: Namespace,
        app_id: Word,
        pinned_to: Option<Address>,
        init: &[u8],
    ) -> Result<Address> {
        let kernel = env.this();
        let proxy = match pinned_to {
            Some(implementation) => env.deploy(
                Arc::new(PinnedAppProxy),
                &PinnedAppProxy::args(kernel, app_id, implementation, init),
            )?,
            None => env.deploy(
                Arc::new(AppProxy),
                &AppProxy::args(kernel, namespace, app_id, init),
            )?,
        };
        env.emit(EventKind::InstanceCreated {
            proxy,
            app_id,
            upgradeable: pinned_to.is_none(),
        })?;
        info!(%kernel, %proxy, %app_id, pinned = pinned_to.is_some(), "instance created");
        Ok(proxy)
    }

    fn initialize(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let acl_base = args.address()?;
        let permissions_creator = args.address()?;
        app::initialize(env)?;

        if !env.has_code(acl_base) {
            return Err(Error::NoCode(acl_base));
        }
        let acl_id = *ids::ACL_APP_ID;
        Self::set_entry(env, Namespace::AppBases, acl_id, acl_base)?;
        let acl = Self::deploy_proxy(env, Namespace::AppBases, acl_id, None, &[])?;
        Self::set_entry(env, Namespace::AppAddresses, acl_id, acl)?;

        let init = Encoder::call(interface::acl::INITIALIZE)
            .address(permissions_creator)
            .finish();
        env.call(acl, &init)?;
        Ok(Vec::new())
    }

    fn set_app(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let namespace = Namespace::from_id(&args.word()?)?;
        let app_id = args.word()?;
        let implementation = args.address()?;
        app::require_initialized(env)?;
        Self::authorize(env, namespace, app_id)?;

        if !env.has_code(implementation) {
            return Err(Error::NoCode(implementation));
        }
        Self::set_entry(env, namespace, app_id, implementation)?;
        Ok(Vec::new())
    }

    fn create_instance(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let namespace = Namespace::from_id(&args.word()?)?;
        let app_id = args.word()?;
        let init = args.bytes()?;
        app::require_initialized(env)?;
        Self::authorize(env, namespace, app_id)?;

        if read_entry(env, namespace, app_id)?.is_zero() {
            return Err(Error::MissingEntry {
                namespace: namespace.id(),
                app_id,
            });
        }
        let proxy = Self::deploy_proxy(env, namespace, app_id, None, &init)?;
        Ok(Encoder::new().address(proxy).finish())
    }

    fn new_app_instance(
        env: &mut Env<'_>,
        args: &mut Decoder<'_>,
        pinned: bool,
    ) -> Result<Vec<u8>> {
        let app_id = args.word()?;
        let base = args.address()?;
        let init = args.bytes()?;
        let set_default = args.bool()?;
        app::require_initialized(env)?;
        Self::authorize(env, Namespace::AppBases, app_id)?;

        let existing = read_entry(env, Namespace::AppBases, app_id)?;
        if existing.is_zero() {
            if !env.has_code(base) {
                return Err(Error::NoCode(base));
            }
            Self::set_entry(env, Namespace::AppBases, app_id, base)?;
        } else if existing != base {
            return Err(Error::EntryConflict { app_id, existing });
        }

        let pinned_to = pinned.then_some(base);
        let proxy = Self::deploy_proxy(env, Namespace::AppBases, app_id, pinned_to, &init)?;

        if set_default {
            Self::authorize(env, Namespace::AppAddresses, app_id)?;
            Self::set_entry(env, Namespace::AppAddresses, app_id, proxy)?;
        }
        Ok(Encoder::new().address(proxy).finish())
    }
}

impl Component for Kernel {
    fn name(&self) -> &'static str {
        "kernel"
    }

    fn construct(&self, env: &mut Env<'_>, args: &[u8]) -> Result<()> {
        if !args.is_empty() && Decoder::new(args).bool()? {
            app::petrify(env)?;
        }
        Ok(())
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let (selector, mut args) = abi::split_call(input)?;
        let method = METHODS
            .get(&selector)
            .copied()
            .ok_or(Error::UnknownSelector(selector))?;

        match method {
            Method::Initialize => Self::initialize(env, &mut args),
            Method::SetApp => Self::set_app(env, &mut args),
            Method::GetApp => {
                let namespace = Namespace::from_id(&args.word()?)?;
                let app_id = args.word()?;
                let entry = read_entry(env, namespace, app_id)?;
                Ok(Encoder::new().address(entry).finish())
            }
            Method::CreateInstance => Self::create_instance(env, &mut args),
            Method::NewAppInstance => Self::new_app_instance(env, &mut args, false),
            Method::NewPinnedAppInstance => Self::new_app_instance(env, &mut args, true),
            Method::Acl => Ok(Encoder::new().address(Self::acl(env)?).finish()),
            Method::HasPermission => {
                let who = args.address()?;
                let target = args.address()?;
                let role = args.word()?;
                let how = args.words()?;
                let allowed = Self::has_permission(env, who, target, role, &how)?;
                Ok(Encoder::new().bool(allowed).finish())
            }
        }
    }
}
