use crate::abi::{self, Decoder, Encoder, Selector};
use crate::ledger::{Ledger, slot};
use crate::{Component, Env, Error, Result, interface};
use policy::{Address, Word};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static VALUE_SLOT: LazyLock<Word> = LazyLock::new(|| slot("counter.value", &[]));

#[derive(Debug, Clone, Copy)]
enum Method {
    Increment,
    IncrementBy,
    Value,
    Fail,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::counter::*;
    abi::dispatch_table(&[
        (INCREMENT, Method::Increment),
        (INCREMENT_BY, Method::IncrementBy),
        (VALUE, Method::Value),
        (FAIL, Method::Fail),
    ])
});

/// Unpermissioned counter; a convenient script target.
pub struct Counter;

impl Counter {
    /// Current value of the counter deployed at `at`.
    pub fn value_of(ledger: &mut Ledger, at: Address) -> Result<u64> {
        let call = Encoder::call(interface::counter::VALUE).finish();
        Decoder::new(&ledger.view(at, &call)?).u64()
    }

    /// Payload incrementing a counter by one.
    pub fn increment() -> Vec<u8> {
        Encoder::call(interface::counter::INCREMENT).finish()
    }

    pub fn increment_by(n: u64) -> Vec<u8> {
        Encoder::call(interface::counter::INCREMENT_BY).u64(n).finish()
    }

    fn current(env: &Env<'_>) -> Result<u64> {
        Ok(env.load(&VALUE_SLOT)?.unwrap_or(0))
    }

    fn add(env: &mut Env<'_>, by: u64) -> Result<Vec<u8>> {
        let value = Self::current(env)?
            .checked_add(by)
            .ok_or_else(|| Error::Reverted("counter overflow".into()))?;
        env.store(*VALUE_SLOT, &value)?;
        debug!(counter = %env.this(), caller = %env.caller(), value, "incremented");
        Ok(Encoder::new().u64(value).finish())
    }
}

impl Component for Counter {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>> {
        let (selector, mut args) = abi::split_call(input)?;
        let method = METHODS
            .get(&selector)
            .copied()
            .ok_or(Error::UnknownSelector(selector))?;

        match method {
            Method::Increment => Self::add(env, 1),
            Method::IncrementBy => {
                let by = args.u64()?;
                Self::add(env, by)
            }
            Method::Value => Ok(Encoder::new().u64(Self::current(env)?).finish()),
            Method::Fail => Err(Error::Reverted("counter refused the call".into())),
        }
    }
}
