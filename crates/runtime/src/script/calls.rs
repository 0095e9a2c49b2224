//! The "calls" script format (spec id 1) and its executor.
//!
//! ```text
//! [ spec id: 4 ] ( [ target: 20 ] [ len: 4, big-endian ] [ payload: len ] )*
//! ```
//!
//! Records are concatenated with no padding. The whole script is parsed
//! before any call is issued, so a malformed record or a banned target
//! aborts without side effects.

use super::{CALLS_SPEC_ID, SPEC_ID_LEN, spec_id};
use crate::abi::{self, Decoder, Encoder, Selector};
use crate::{Component, Env, Error, Result, app, interface};
use policy::Address;
use std::collections::HashMap;
use std::sync::LazyLock;
use storage::EventKind;
use tracing::debug;

const TARGET_LEN: usize = 20;
const LENGTH_LEN: usize = 4;

/// One call of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub target: Address,
    pub payload: Vec<u8>,
}

impl Action {
    pub fn new(target: Address, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            payload: payload.into(),
        }
    }
}

/// Build a calls script from `actions`.
pub fn encode(actions: &[Action]) -> Result<Vec<u8>> {
    let mut script = CALLS_SPEC_ID.to_be_bytes().to_vec();
    for action in actions {
        let len = u32::try_from(action.payload.len()).map_err(|_| {
            Error::MalformedScript(format!(
                "payload of {} bytes does not fit a record",
                action.payload.len()
            ))
        })?;
        script.extend_from_slice(&action.target.0);
        script.extend_from_slice(&len.to_be_bytes());
        script.extend_from_slice(&action.payload);
    }
    Ok(script)
}

/// Parse a calls script. Fails on a foreign spec id, a truncated record, or
/// a declared length running past the end of the script.
pub fn decode(script: &[u8]) -> Result<Vec<Action>> {
    match spec_id(script) {
        Some(CALLS_SPEC_ID) => {}
        Some(other) => {
            return Err(Error::MalformedScript(format!(
                "spec id {other} is not a calls script"
            )));
        }
        None => return Err(Error::MalformedScript("missing spec id".into())),
    }

    let mut rest = &script[SPEC_ID_LEN..];
    let mut actions = Vec::new();
    while !rest.is_empty() {
        let offset = script.len() - rest.len();
        if rest.len() < TARGET_LEN + LENGTH_LEN {
            return Err(Error::MalformedScript(format!(
                "truncated record header at offset {offset}"
            )));
        }
        let (target, tail) = rest.split_at(TARGET_LEN);
        let (len, tail) = tail.split_at(LENGTH_LEN);

        let mut target_bytes = [0u8; TARGET_LEN];
        target_bytes.copy_from_slice(target);
        let mut len_bytes = [0u8; LENGTH_LEN];
        len_bytes.copy_from_slice(len);
        let len = u32::from_be_bytes(len_bytes) as usize;

        if len > tail.len() {
            return Err(Error::MalformedScript(format!(
                "record at offset {offset} declares {len} bytes, {} remain",
                tail.len()
            )));
        }
        let (payload, tail) = tail.split_at(len);
        actions.push(Action {
            target: Address(target_bytes),
            payload: payload.to_vec(),
        });
        rest = tail;
    }
    Ok(actions)
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Initialize,
    ExecScript,
    ExecutorType,
}

static METHODS: LazyLock<HashMap<Selector, Method>> = LazyLock::new(|| {
    use interface::executor::*;
    abi::dispatch_table(&[
        (INITIALIZE, Method::Initialize),
        (EXEC_SCRIPT, Method::ExecScript),
        (EXECUTOR_TYPE, Method::ExecutorType),
    ])
});

/// Executor for calls scripts.
///
/// Runners delegate-call it, so every action is issued from the runner's
/// address and the initialization checked is the runner's.
pub struct CallsScript;

impl CallsScript {
    fn exec_script(env: &mut Env<'_>, args: &mut Decoder<'_>) -> Result<Vec<u8>> {
        let script = args.bytes()?;
        let _input = args.bytes()?;
        let blacklist = args.addresses()?;
        app::require_initialized(env)?;

        let actions = decode(&script)?;
        if let Some(banned) = actions.iter().find(|a| blacklist.contains(&a.target)) {
            return Err(Error::BannedAddress(banned.target));
        }

        let (sender, source) = (env.caller(), env.this());
        let mut output = Vec::new();
        for (i, action) in actions.iter().enumerate() {
            debug!(
                action = i,
                %source,
                target = %action.target,
                payload_len = action.payload.len(),
                "script call"
            );
            env.emit(EventKind::ScriptCall {
                sender,
                source,
                target: action.target,
            })?;
            output = env.call(action.target, &action.payload)?;
        }
        Ok(Encoder::new().bytes(&output).finish())
    }
}

impl Component for CallsScript {
    fn name(&self) -> &'static str {
        "calls-script"
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
            Method::ExecScript => Self::exec_script(env, &mut args),
            Method::ExecutorType => Ok(Encoder::new().u64(CALLS_SPEC_ID as u64).finish()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TARGET: Address = Address::from_low_u64(0x7a);

    #[test]
    fn decodes_what_it_encodes() {
        let actions = vec![
            Action::new(TARGET, vec![1, 2, 3, 4]),
            Action::new(Address::from_low_u64(0x7b), Vec::new()),
        ];
        let script = encode(&actions).unwrap();
        assert_eq!(script.len(), 4 + 24 + 4 + 24);
        assert_eq!(decode(&script).unwrap(), actions);
    }

    #[test]
    fn empty_body_has_no_actions() {
        assert_eq!(decode(&[0, 0, 0, 1]).unwrap(), Vec::new());
    }

    #[rstest]
    #[case::missing_header(vec![0, 0])]
    #[case::foreign_spec(vec![0, 0, 0, 2])]
    #[case::short_record_header(vec![0, 0, 0, 1, 0xaa, 0xbb])]
    fn rejects_structural_garbage(#[case] script: Vec<u8>) {
        assert!(matches!(decode(&script), Err(Error::MalformedScript(_))));
    }

    #[test]
    fn rejects_length_past_end() {
        let mut script = encode(&[Action::new(TARGET, vec![9; 8])]).unwrap();
        // declare one byte more than the record carries
        let len_at = 4 + TARGET_LEN;
        script[len_at..len_at + 4].copy_from_slice(&9u32.to_be_bytes());
        assert!(matches!(decode(&script), Err(Error::MalformedScript(_))));

        script[len_at..len_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode(&script), Err(Error::MalformedScript(_))));
    }

    #[test]
    fn malformed_tail_rejects_whole_script() {
        let mut script = encode(&[Action::new(TARGET, vec![1])]).unwrap();
        script.extend_from_slice(&TARGET.0);
        script.extend_from_slice(&100u32.to_be_bytes());
        assert!(decode(&script).is_err());
    }
}
