use super::spec_id;
use crate::abi::{self, Decoder, Encoder, Selector};
use crate::ledger::slot;
use crate::{Component, Env, Error, Result, app, ids, interface};
use policy::{Address, Word};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use storage::EventKind;
use tracing::info;

static COUNT_SLOT: LazyLock<Word> = LazyLock::new(|| slot("registry.count", &[]));

fn executor_slot(index: u32) -> Word {
    slot("registry.executor", &[Word::from_u64(index as u64)])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ExecutorSlot {
    executor: Address,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Initialize,
    AddExecutor,
    EnableExecutor,
    DisableExecutor,
    GetScriptExecutor,
    Executor,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::registry::*;
    abi::dispatch_table(&[
        (INITIALIZE, Method::Initialize),
        (ADD_EXECUTOR, Method::AddExecutor),
        (ENABLE_EXECUTOR, Method::EnableExecutor),
        (DISABLE_EXECUTOR, Method::DisableExecutor),
        (GET_SCRIPT_EXECUTOR, Method::GetScriptExecutor),
        (EXECUTOR, Method::Executor),
    ])
});

/// Append-only list of script executors, indexed by spec id from 1.
///
/// Index 0 is reserved and never resolves. Slots are never removed, only
/// enabled and disabled.
pub struct ScriptRegistry;

impl ScriptRegistry {
    fn count(env: &Env<'_>) -> Result<u32> {
        Ok(env.load(&COUNT_SLOT)?.unwrap_or(0))
    }

    fn slot(env: &Env<'_>, index: u32) -> Result<Option<ExecutorSlot>> {
        if index == 0 {
            return Ok(None);
        }
        env.load(&executor_slot(index))
    }

    fn add(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let executor = args.address()?;
        app::require_initialized(env)?;
        app::auth(env, *ids::REGISTRY_ADD_EXECUTOR_ROLE, &[])?;

        if !env.has_code(executor) {
            return Err(Error::NoCode(executor));
        }
        let index = Self::count(env)?
            .checked_add(1)
            .ok_or_else(|| Error::InvalidExecutor("executor index space exhausted".into()))?;
        env.store(
            executor_slot(index),
            &ExecutorSlot {
                executor,
                enabled: true,
            },
        )?;
        env.store(*COUNT_SLOT, &index)?;
        env.emit(EventKind::ExecutorRegistered { index, executor })?;
        info!(registry = %env.this(), index, %executor, "executor registered");
        Ok(Encoder::new().u64(index as u64).finish())
    }

    fn toggle(env: &mut Env<'_>, args: &mut Decoder<'_>, enable: bool) -> Result<Vec<u8>> {
        let index = args.u32()?;
        app::require_initialized(env)?;
        app::auth(
            env,
            *ids::REGISTRY_MANAGER_ROLE,
            &[Word::from_u64(index as u64)],
        )?;

        let mut entry = Self::slot(env, index)?
            .ok_or_else(|| Error::InvalidExecutor(format!("no executor at index {index}")))?;
        match (entry.enabled, enable) {
            (true, true) => return Err(Error::ExecutorAlreadyEnabled(index)),
            (false, false) => return Err(Error::ExecutorAlreadyDisabled(index)),
            _ => {}
        }
        entry.enabled = enable;
        env.store(executor_slot(index), &entry)?;

        let executor = entry.executor;
        env.emit(if enable {
            EventKind::ExecutorEnabled { index, executor }
        } else {
            EventKind::ExecutorDisabled { index, executor }
        })?;
        info!(registry = %env.this(), index, enable, "executor toggled");
        Ok(Vec::new())
    }

    /// The enabled executor for `script`'s spec id, or zero.
    fn resolve(env: &Env<'_>, script: &[u8]) -> Result<Address> {
        let Some(index) = spec_id(script) else {
            return Ok(Address::ZERO);
        };
        Ok(match Self::slot(env, index)? {
            Some(ExecutorSlot {
                executor,
                enabled: true,
            }) => executor,
            _ => Address::ZERO,
        })
    }
}

impl Component for ScriptRegistry {
    fn name(&self) -> &'static str {
        "script-registry"
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
            Method::Initialize => {
                app::initialize(env)?;
                Ok(Vec::new())
            }
            Method::AddExecutor => Self::add(env, &mut args),
            Method::EnableExecutor => Self::toggle(env, &mut args, true),
            Method::DisableExecutor => Self::toggle(env, &mut args, false),
            Method::GetScriptExecutor => {
                let script = args.bytes()?;
                Ok(Encoder::new().address(Self::resolve(env, &script)?).finish())
            }
            Method::Executor => {
                let index = args.u32()?;
                let entry = Self::slot(env, index)?.unwrap_or(ExecutorSlot {
                    executor: Address::ZERO,
                    enabled: false,
                });
                Ok(Encoder::new()
                    .address(entry.executor)
                    .bool(entry.enabled)
                    .finish())
            }
        }
    }
}
