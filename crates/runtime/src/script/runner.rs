//! Script execution for apps that opt in.

use crate::abi::{Decoder, Encoder};
use crate::kernel::Namespace;
use crate::{Component, Env, Error, Result, app, ids, interface};
use policy::Address;
use storage::EventKind;
use tracing::info;

/// The enabled executor for `script`, resolved through the organization's
/// script registry at the moment of the call.
pub fn script_executor(env: &mut Env<'_>, script: &[u8]) -> Result<Address> {
    let kernel = app::kernel(env)?;
    if kernel.is_zero() {
        return Err(Error::InvalidExecutor("app is not bound to a kernel".into()));
    }

    let query = Encoder::call(interface::kernel::GET_APP)
        .word(Namespace::AppAddresses.id())
        .word(*ids::SCRIPT_REGISTRY_APP_ID)
        .finish();
    let registry = Decoder::new(&env.static_call(kernel, &query)?).address()?;
    if registry.is_zero() {
        return Err(Error::InvalidExecutor("organization has no script registry".into()));
    }

    let query = Encoder::call(interface::registry::GET_SCRIPT_EXECUTOR)
        .bytes(script)
        .finish();
    let executor = Decoder::new(&env.static_call(registry, &query)?).address()?;
    if executor.is_zero() {
        let header = &script[..script.len().min(super::SPEC_ID_LEN)];
        return Err(Error::InvalidExecutor(format!(
            "no enabled executor for script header {header:02x?}"
        )));
    }
    Ok(executor)
}

/// Resolve the executor for `script` and delegate to it in this app's
/// context. Fails if the script rebound the app to another kernel or id.
pub fn run_script(
    env: &mut Env<'_>,
    script: &[u8],
    input: &[u8],
    blacklist: &[Address],
) -> Result<Vec<u8>> {
    let executor = script_executor(env, script)?;
    let binding = (app::kernel(env)?, app::app_id(env)?);

    let call = Encoder::call(interface::executor::EXEC_SCRIPT)
        .bytes(script)
        .bytes(input)
        .addresses(blacklist)
        .finish();
    let returned = env.delegate_call(executor, &call)?;
    let output = Decoder::new(&returned).bytes()?;

    if (app::kernel(env)?, app::app_id(env)?) != binding {
        return Err(Error::ProtectedStateModified(env.this()));
    }

    env.emit(EventKind::ScriptResult {
        executor,
        script: script.to_vec(),
        input: input.to_vec(),
        output: output.clone(),
    })?;
    info!(app = %env.this(), %executor, output_len = output.len(), "script executed");
    Ok(output)
}

/// Mixin for components that run scripts.
pub trait ScriptRunner: Component {
    fn run_script(
        &self,
        env: &mut Env<'_>,
        script: &[u8],
        input: &[u8],
        blacklist: &[Address],
    ) -> Result<Vec<u8>> {
        run_script(env, script, input, blacklist)
    }
}
