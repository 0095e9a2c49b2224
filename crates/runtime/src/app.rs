//! Shared behaviour of components installed in an organization.
//!
//! Every app keeps, in its own storage context, an initialization state and
//! the `(kernel, app_id)` binding its proxy wrote at construction. Privileged
//! methods call [`require_initialized`] and then [`auth`].

use crate::abi::{Decoder, Encoder};
use crate::interface;
use crate::ledger::slot;
use crate::{Env, Error, Result};
use policy::{Address, RoleId, Word};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static INIT_SLOT: LazyLock<Word> = LazyLock::new(|| slot("app.initialization", &[]));
static KERNEL_SLOT: LazyLock<Word> = LazyLock::new(|| slot("app.kernel", &[]));
static APP_ID_SLOT: LazyLock<Word> = LazyLock::new(|| slot("app.app-id", &[]));

/// One-time initialization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Uninitialized,
    Initialized { block: u64 },
    /// Locked forever without ever becoming usable. Used for code that only
    /// serves as an implementation behind proxies.
    Petrified,
}

pub fn init_state(env: &Env<'_>) -> Result<InitState> {
    Ok(env.load(&INIT_SLOT)?.unwrap_or(InitState::Uninitialized))
}

/// First call wins; every later call fails with `AlreadyInitialized`.
pub fn initialize(env: &mut Env<'_>) -> Result<()> {
    match init_state(env)? {
        InitState::Uninitialized => {
            let block = env.block().number;
            env.store(*INIT_SLOT, &InitState::Initialized { block })
        }
        _ => Err(Error::AlreadyInitialized),
    }
}

pub fn petrify(env: &mut Env<'_>) -> Result<()> {
    match init_state(env)? {
        InitState::Uninitialized => env.store(*INIT_SLOT, &InitState::Petrified),
        _ => Err(Error::AlreadyInitialized),
    }
}

pub fn require_initialized(env: &Env<'_>) -> Result<()> {
    match init_state(env)? {
        InitState::Initialized { .. } => Ok(()),
        InitState::Uninitialized | InitState::Petrified => Err(Error::NotInitialized),
    }
}

/// Record which kernel and app id this context belongs to.
pub fn bind(env: &mut Env<'_>, kernel: Address, app_id: Word) -> Result<()> {
    env.store(*KERNEL_SLOT, &kernel)?;
    env.store(*APP_ID_SLOT, &app_id)
}

/// The bound kernel, or the zero address for unbound code.
pub fn kernel(env: &Env<'_>) -> Result<Address> {
    Ok(env.load(&KERNEL_SLOT)?.unwrap_or(Address::ZERO))
}

pub fn app_id(env: &Env<'_>) -> Result<Word> {
    Ok(env.load(&APP_ID_SLOT)?.unwrap_or(Word::ZERO))
}

/// Whether `who` holds `role` on this app for `args`.
///
/// Asks the kernel every time; the answer is never cached.
pub fn can_perform(env: &mut Env<'_>, who: Address, role: RoleId, args: &[Word]) -> Result<bool> {
    if require_initialized(env).is_err() {
        return Ok(false);
    }
    let kernel = kernel(env)?;
    if kernel.is_zero() {
        return Ok(false);
    }
    let query = Encoder::call(interface::kernel::HAS_PERMISSION)
        .address(who)
        .address(env.this())
        .word(role.0)
        .words(args)
        .finish();
    let answer = env.static_call(kernel, &query)?;
    Decoder::new(&answer).bool()
}

/// Fail with `PermissionDenied` unless the caller holds `role` for `args`.
pub fn auth(env: &mut Env<'_>, role: RoleId, args: &[Word]) -> Result<()> {
    let caller = env.caller();
    if can_perform(env, caller, role, args)? {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!(
            "{caller} lacks role {role} at {}",
            env.this()
        )))
    }
}
