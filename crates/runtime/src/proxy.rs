//! Stable addresses in front of swappable implementations.
//!
//! A proxy owns the storage; the implementation only supplies code, which
//! the proxy runs through a delegate call.

use crate::abi::{Decoder, Encoder};
use crate::kernel::{self, Namespace};
use crate::ledger::slot;
use crate::{Component, Env, Error, Result, app, ids, interface};
use policy::{Address, Word};
use std::sync::LazyLock;

static NAMESPACE_SLOT: LazyLock<Word> = LazyLock::new(|| slot("proxy.namespace", &[]));
static IMPLEMENTATION_SLOT: LazyLock<Word> = LazyLock::new(|| slot("proxy.implementation", &[]));

/// Proxy resolving its implementation from the kernel on every call, so
/// changing the registry entry upgrades every instance at once.
pub struct AppProxy;

impl AppProxy {
    pub fn args(kernel: Address, namespace: Namespace, app_id: Word, init: &[u8]) -> Vec<u8> {
        Encoder::new()
            .address(kernel)
            .word(namespace.id())
            .word(app_id)
            .bytes(init)
            .finish()
    }

    fn implementation(env: &mut Env<'_>) -> Result<Address> {
        let kernel = app::kernel(env)?;
        let app_id = app::app_id(env)?;
        let namespace: Word = env.load(&NAMESPACE_SLOT)?.unwrap_or(Word::ZERO);
        let query = Encoder::call(interface::kernel::GET_APP)
            .word(namespace)
            .word(app_id)
            .finish();
        let implementation = Decoder::new(&env.static_call(kernel, &query)?).address()?;
        if implementation.is_zero() {
            return Err(Error::MissingEntry { namespace, app_id });
        }
        Ok(implementation)
    }
}

impl Component for AppProxy {
    fn name(&self) -> &'static str {
        "app-proxy"
    }

    fn construct(&self, env: &mut Env<'_>, args: &[u8]) -> Result<()> {
        let mut args = Decoder::new(args);
        let kernel = args.address()?;
        let namespace = args.word()?;
        let app_id = args.word()?;
        let init = args.bytes()?;

        app::bind(env, kernel, app_id)?;
        env.store(*NAMESPACE_SLOT, &namespace)?;
        if !init.is_empty() {
            let implementation = Self::implementation(env)?;
            env.delegate_call(implementation, &init)?;
        }
        Ok(())
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let implementation = Self::implementation(env)?;
        env.delegate_call(implementation, input)
    }
}

/// Proxy fixed to one implementation for its whole life.
pub struct PinnedAppProxy;

impl PinnedAppProxy {
    pub fn args(kernel: Address, app_id: Word, implementation: Address, init: &[u8]) -> Vec<u8> {
        Encoder::new()
            .address(kernel)
            .word(app_id)
            .address(implementation)
            .bytes(init)
            .finish()
    }

    fn implementation(env: &Env<'_>) -> Result<Address> {
        env.load(&IMPLEMENTATION_SLOT)?
            .ok_or_else(|| Error::Reverted("pinned proxy without implementation".into()))
    }
}

impl Component for PinnedAppProxy {
    fn name(&self) -> &'static str {
        "pinned-app-proxy"
    }

    fn construct(&self, env: &mut Env<'_>, args: &[u8]) -> Result<()> {
        let mut args = Decoder::new(args);
        let kernel = args.address()?;
        let app_id = args.word()?;
        let implementation = args.address()?;
        let init = args.bytes()?;

        if !env.has_code(implementation) {
            return Err(Error::NoCode(implementation));
        }
        app::bind(env, kernel, app_id)?;
        env.store(*IMPLEMENTATION_SLOT, &implementation)?;
        if !init.is_empty() {
            env.delegate_call(implementation, &init)?;
        }
        Ok(())
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let implementation = Self::implementation(env)?;
        env.delegate_call(implementation, input)
    }
}

/// The organization's stable address. Runs whatever kernel code its own
/// Core namespace entry names.
pub struct KernelProxy;

impl KernelProxy {
    pub fn args(implementation: Address) -> Vec<u8> {
        Encoder::new().address(implementation).finish()
    }
}

impl Component for KernelProxy {
    fn name(&self) -> &'static str {
        "kernel-proxy"
    }

    fn construct(&self, env: &mut Env<'_>, args: &[u8]) -> Result<()> {
        let implementation = Decoder::new(args).address()?;
        if !env.has_code(implementation) {
            return Err(Error::NoCode(implementation));
        }
        kernel::write_entry(env, Namespace::Core, *ids::KERNEL_APP_ID, implementation)
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let implementation = kernel::read_entry(env, Namespace::Core, *ids::KERNEL_APP_ID)?;
        if implementation.is_zero() {
            return Err(Error::MissingEntry {
                namespace: Namespace::Core.id(),
                app_id: *ids::KERNEL_APP_ID,
            });
        }
        env.delegate_call(implementation, input)
    }
}
