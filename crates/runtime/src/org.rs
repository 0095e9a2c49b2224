//! Typed client for an organization deployed on a [`Ledger`].
//!
//! Wraps the ABI so hosts and tests can bootstrap an organization and drive
//! its kernel, ACL and script registry without building payloads by hand.

use crate::abi::{Decoder, Encoder};
use crate::acl::AclApp;
use crate::apps::ScriptHost;
use crate::kernel::{Kernel, Namespace};
use crate::ledger::{Committed, Ledger, Receipt};
use crate::proxy::KernelProxy;
use crate::script::{CallsScript, ScriptRegistry};
use crate::{Component, Env, Result, ids, interface};
use policy::{Address, PermissionSpec, Predicate, RoleId, Word};
use std::sync::Arc;
use tracing::info;

/// Addresses of a bootstrapped organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Organization {
    /// The kernel proxy: the organization's stable address.
    pub kernel: Address,
    pub acl: Address,
    pub registry: Address,
    /// The calls executor, registered at index 1.
    pub calls_executor: Address,
}

fn deploy(env: &mut Env<'_>, component: impl Component, args: &[u8]) -> Result<Address> {
    env.deploy(Arc::new(component), args)
}

fn create_permission_call(
    grantee: Address,
    target: Address,
    role: RoleId,
    manager: Address,
    predicates: &[Word],
) -> Vec<u8> {
    Encoder::call(interface::acl::CREATE_PERMISSION)
        .address(grantee)
        .address(target)
        .word(role.0)
        .address(manager)
        .words(predicates)
        .finish()
}

fn encode_predicates(predicates: &[Predicate]) -> Result<Vec<Word>> {
    predicates
        .iter()
        .map(|p| p.encode().map_err(Into::into))
        .collect()
}

impl Organization {
    /// Deploy and wire a complete organization in one transaction.
    ///
    /// `creator` ends up holding `CREATE_PERMISSIONS_ROLE` on the ACL,
    /// `APP_MANAGER_ROLE` on the kernel and both registry roles, and manages
    /// all of them.
    pub fn bootstrap(ledger: &mut Ledger, creator: Address) -> Result<Committed<Organization>> {
        let committed = ledger.atomically(creator, |env| {
            let kernel_base = deploy(env, Kernel, &Kernel::args(true))?;
            let acl_base = deploy(env, AclApp, &[])?;
            let kernel = deploy(env, KernelProxy, &KernelProxy::args(kernel_base))?;

            let init = Encoder::call(interface::kernel::INITIALIZE)
                .address(acl_base)
                .address(creator)
                .finish();
            env.call(kernel, &init)?;
            let query = Encoder::call(interface::kernel::ACL).finish();
            let acl = Decoder::new(&env.static_call(kernel, &query)?).address()?;

            env.call(
                acl,
                &create_permission_call(creator, kernel, *ids::APP_MANAGER_ROLE, creator, &[]),
            )?;

            let registry_base = deploy(env, ScriptRegistry, &[])?;
            let registry_init = Encoder::call(interface::registry::INITIALIZE).finish();
            let create = Encoder::call(interface::kernel::NEW_APP_INSTANCE)
                .word(*ids::SCRIPT_REGISTRY_APP_ID)
                .address(registry_base)
                .bytes(&registry_init)
                .bool(true)
                .finish();
            let registry = Decoder::new(&env.call(kernel, &create)?).address()?;

            for role in [*ids::REGISTRY_ADD_EXECUTOR_ROLE, *ids::REGISTRY_MANAGER_ROLE] {
                env.call(acl, &create_permission_call(creator, registry, role, creator, &[]))?;
            }

            let calls_executor = deploy(env, CallsScript, &[])?;
            env.call(calls_executor, &Encoder::call(interface::executor::INITIALIZE).finish())?;
            let add = Encoder::call(interface::registry::ADD_EXECUTOR)
                .address(calls_executor)
                .finish();
            env.call(registry, &add)?;

            Ok(Organization {
                kernel,
                acl,
                registry,
                calls_executor,
            })
        })?;
        info!(kernel = %committed.value.kernel, %creator, "organization bootstrapped");
        Ok(committed)
    }

    // Kernel

    pub fn set_app(
        &self,
        ledger: &mut Ledger,
        from: Address,
        namespace: Namespace,
        app_id: Word,
        implementation: Address,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::kernel::SET_APP)
            .word(namespace.id())
            .word(app_id)
            .address(implementation)
            .finish();
        ledger.transact(from, self.kernel, &call)
    }

    pub fn get_app(
        &self,
        ledger: &mut Ledger,
        namespace: Namespace,
        app_id: Word,
    ) -> Result<Address> {
        let call = Encoder::call(interface::kernel::GET_APP)
            .word(namespace.id())
            .word(app_id)
            .finish();
        Decoder::new(&ledger.view(self.kernel, &call)?).address()
    }

    /// New upgradeable proxy for an existing `(namespace, app_id)` entry.
    pub fn create_instance(
        &self,
        ledger: &mut Ledger,
        from: Address,
        namespace: Namespace,
        app_id: Word,
        init: &[u8],
    ) -> Result<Address> {
        let call = Encoder::call(interface::kernel::CREATE_INSTANCE)
            .word(namespace.id())
            .word(app_id)
            .bytes(init)
            .finish();
        Decoder::new(&ledger.transact(from, self.kernel, &call)?.value).address()
    }

    pub fn new_app_instance(
        &self,
        ledger: &mut Ledger,
        from: Address,
        app_id: Word,
        base: Address,
        init: &[u8],
        set_default: bool,
    ) -> Result<Address> {
        self.new_instance(
            ledger,
            from,
            interface::kernel::NEW_APP_INSTANCE,
            app_id,
            base,
            init,
            set_default,
        )
    }

    pub fn new_pinned_app_instance(
        &self,
        ledger: &mut Ledger,
        from: Address,
        app_id: Word,
        base: Address,
        init: &[u8],
        set_default: bool,
    ) -> Result<Address> {
        self.new_instance(
            ledger,
            from,
            interface::kernel::NEW_PINNED_APP_INSTANCE,
            app_id,
            base,
            init,
            set_default,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new_instance(
        &self,
        ledger: &mut Ledger,
        from: Address,
        signature: &str,
        app_id: Word,
        base: Address,
        init: &[u8],
        set_default: bool,
    ) -> Result<Address> {
        let call = Encoder::call(signature)
            .word(app_id)
            .address(base)
            .bytes(init)
            .bool(set_default)
            .finish();
        Decoder::new(&ledger.transact(from, self.kernel, &call)?.value).address()
    }

    /// Ask the kernel, as any app would.
    pub fn has_permission(
        &self,
        ledger: &mut Ledger,
        who: Address,
        target: Address,
        role: RoleId,
        args: &[Word],
    ) -> Result<bool> {
        let call = Encoder::call(interface::kernel::HAS_PERMISSION)
            .address(who)
            .address(target)
            .word(role.0)
            .words(args)
            .finish();
        Decoder::new(&ledger.view(self.kernel, &call)?).bool()
    }

    // ACL

    pub fn create_permission(
        &self,
        ledger: &mut Ledger,
        from: Address,
        grantee: Address,
        target: Address,
        role: RoleId,
        manager: Address,
    ) -> Result<Receipt> {
        ledger.transact(
            from,
            self.acl,
            &create_permission_call(grantee, target, role, manager, &[]),
        )
    }

    pub fn create_burned_permission(
        &self,
        ledger: &mut Ledger,
        from: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::acl::CREATE_BURNED_PERMISSION)
            .address(target)
            .word(role.0)
            .finish();
        ledger.transact(from, self.acl, &call)
    }

    /// Create every permission of a resolved manifest in one transaction.
    pub fn apply_permissions(
        &self,
        ledger: &mut Ledger,
        from: Address,
        specs: &[PermissionSpec],
    ) -> Result<Committed<()>> {
        let acl = self.acl;
        let calls = specs
            .iter()
            .map(|spec| {
                Ok(create_permission_call(
                    spec.grantee,
                    spec.target,
                    spec.role,
                    spec.manager,
                    &encode_predicates(&spec.predicates)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        ledger.atomically(from, |env| {
            for call in &calls {
                env.call(acl, call)?;
            }
            Ok(())
        })
    }

    pub fn grant_permission(
        &self,
        ledger: &mut Ledger,
        from: Address,
        grantee: Address,
        target: Address,
        role: RoleId,
        predicates: &[Predicate],
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::acl::GRANT_PERMISSION)
            .address(grantee)
            .address(target)
            .word(role.0)
            .words(&encode_predicates(predicates)?)
            .finish();
        ledger.transact(from, self.acl, &call)
    }

    pub fn revoke_permission(
        &self,
        ledger: &mut Ledger,
        from: Address,
        grantee: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::acl::REVOKE_PERMISSION)
            .address(grantee)
            .address(target)
            .word(role.0)
            .finish();
        ledger.transact(from, self.acl, &call)
    }

    pub fn set_permission_manager(
        &self,
        ledger: &mut Ledger,
        from: Address,
        manager: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::acl::SET_PERMISSION_MANAGER)
            .address(manager)
            .address(target)
            .word(role.0)
            .finish();
        ledger.transact(from, self.acl, &call)
    }

    pub fn burn_permission_manager(
        &self,
        ledger: &mut Ledger,
        from: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::acl::BURN_PERMISSION_MANAGER)
            .address(target)
            .word(role.0)
            .finish();
        ledger.transact(from, self.acl, &call)
    }

    /// The role's manager; `None` if the role was never created.
    pub fn permission_manager(
        &self,
        ledger: &mut Ledger,
        target: Address,
        role: RoleId,
    ) -> Result<Option<Address>> {
        let call = Encoder::call(interface::acl::GET_PERMISSION_MANAGER)
            .address(target)
            .word(role.0)
            .finish();
        let manager = Decoder::new(&ledger.view(self.acl, &call)?).address()?;
        Ok((!manager.is_zero()).then_some(manager))
    }

    /// Predicates of the grant recorded for exactly `grantee`, if any.
    pub fn permission(
        &self,
        ledger: &mut Ledger,
        grantee: Address,
        target: Address,
        role: RoleId,
    ) -> Result<Option<Vec<Predicate>>> {
        let call = Encoder::call(interface::acl::GET_PERMISSION)
            .address(grantee)
            .address(target)
            .word(role.0)
            .finish();
        let out = ledger.view(self.acl, &call)?;
        let mut out = Decoder::new(&out);
        if !out.bool()? {
            return Ok(None);
        }
        let predicates = out
            .words()?
            .iter()
            .map(|w| Predicate::decode(w).map_err(Into::into))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(predicates))
    }

    // Script registry

    /// Register an executor; returns its index.
    pub fn add_executor(
        &self,
        ledger: &mut Ledger,
        from: Address,
        executor: Address,
    ) -> Result<u32> {
        let call = Encoder::call(interface::registry::ADD_EXECUTOR)
            .address(executor)
            .finish();
        Decoder::new(&ledger.transact(from, self.registry, &call)?.value).u32()
    }

    pub fn enable_executor(
        &self,
        ledger: &mut Ledger,
        from: Address,
        index: u32,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::registry::ENABLE_EXECUTOR)
            .u64(index as u64)
            .finish();
        ledger.transact(from, self.registry, &call)
    }

    pub fn disable_executor(
        &self,
        ledger: &mut Ledger,
        from: Address,
        index: u32,
    ) -> Result<Receipt> {
        let call = Encoder::call(interface::registry::DISABLE_EXECUTOR)
            .u64(index as u64)
            .finish();
        ledger.transact(from, self.registry, &call)
    }

    /// `(executor, enabled)` at `index`; the zero address if unused.
    pub fn executor(&self, ledger: &mut Ledger, index: u32) -> Result<(Address, bool)> {
        let call = Encoder::call(interface::registry::EXECUTOR)
            .u64(index as u64)
            .finish();
        let out = ledger.view(self.registry, &call)?;
        let mut out = Decoder::new(&out);
        Ok((out.address()?, out.bool()?))
    }

    /// The enabled executor `script` would run on, if any.
    pub fn script_executor(&self, ledger: &mut Ledger, script: &[u8]) -> Result<Option<Address>> {
        let call = Encoder::call(interface::registry::GET_SCRIPT_EXECUTOR)
            .bytes(script)
            .finish();
        let executor = Decoder::new(&ledger.view(self.registry, &call)?).address()?;
        Ok((!executor.is_zero()).then_some(executor))
    }

    // Script host

    /// Install a new, initialized script host instance. The first install
    /// registers the host base and makes the instance the default.
    pub fn install_script_host(&self, ledger: &mut Ledger, from: Address) -> Result<Address> {
        let app_id = *ids::SCRIPT_HOST_APP_ID;
        let existing = self.get_app(ledger, Namespace::AppBases, app_id)?;
        let (base, first) = if existing.is_zero() {
            (ledger.deploy(from, ScriptHost, &[])?, true)
        } else {
            (existing, false)
        };
        let init = Encoder::call(interface::host::INITIALIZE).finish();
        self.new_app_instance(ledger, from, app_id, base, &init, first)
    }
}

/// Run `script` through the host at `host`; the value is the script output.
pub fn execute(
    ledger: &mut Ledger,
    from: Address,
    host: Address,
    script: &[u8],
) -> Result<Committed<Vec<u8>>> {
    let call = Encoder::call(interface::host::EXECUTE).bytes(script).finish();
    script_output(ledger.transact(from, host, &call)?)
}

/// Like [`execute`], refusing to run if any action targets a `banned` address.
pub fn execute_with_ban(
    ledger: &mut Ledger,
    from: Address,
    host: Address,
    script: &[u8],
    banned: &[Address],
) -> Result<Committed<Vec<u8>>> {
    let call = Encoder::call(interface::host::EXECUTE_WITH_BAN)
        .bytes(script)
        .addresses(banned)
        .finish();
    script_output(ledger.transact(from, host, &call)?)
}

fn script_output(receipt: Receipt) -> Result<Committed<Vec<u8>>> {
    let output = Decoder::new(&receipt.value).bytes()?;
    Ok(Committed {
        value: output,
        ..receipt
    })
}
