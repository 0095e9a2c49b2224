use crate::abi::{self, Decoder, Encoder, Selector};
use crate::script::ScriptRunner;
use crate::{Component, Env, Error, Result, app, ids, interface};
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy)]
enum Method {
    Initialize,
    Execute,
    ExecuteWithBan,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::host::*;
    abi::dispatch_table(&[
        (INITIALIZE, Method::Initialize),
        (EXECUTE, Method::Execute),
        (EXECUTE_WITH_BAN, Method::ExecuteWithBan),
    ])
});

/// App that runs scripts on behalf of holders of `EXECUTE_ROLE`.
///
/// Every action of a script is issued with the host as its caller, so
/// whatever the host is allowed to do, a script it runs may do too.
pub struct ScriptHost;

impl ScriptHost {
    fn execute(
        &self,
        env: &mut Env<'_>,
        args: &mut Decoder<'_>,
        with_ban: bool,
    ) -> Result<Vec<u8>> {
        let script = args.bytes()?;
        let banned = if with_ban { args.addresses()? } else { Vec::new() };
        app::require_initialized(env)?;
        app::auth(env, *ids::EXECUTE_ROLE, &[])?;

        let output = self.run_script(env, &script, &[], &banned)?;
        Ok(Encoder::new().bytes(&output).finish())
    }
}

impl ScriptRunner for ScriptHost {}

impl Component for ScriptHost {
    fn name(&self) -> &'static str {
        "script-host"
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
            Method::Execute => self.execute(env, &mut args, false),
            Method::ExecuteWithBan => self.execute(env, &mut args, true),
        }
    }
}
