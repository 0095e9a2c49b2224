mod common;

use common::{ALICE, BOB, CREATOR, Fixture, increments};
use policy::{Address, Word};
use pretty_assertions::assert_eq;
use rstest::rstest;
use runtime::abi::{Decoder, Encoder};
use runtime::{
    Action, CALLS_SPEC_ID, CallsScript, Component, Counter, Env, Error, Ledger, Result, calls,
    execute, execute_with_ban, ids, interface,
};
use std::sync::Arc;
use storage::{EventKind, EventStore};

#[test]
fn executor_index_zero_never_resolves() {
    let mut fx = Fixture::new();
    assert_eq!(
        fx.org.executor(&mut fx.ledger, 0).unwrap(),
        (Address::ZERO, false)
    );
    assert_eq!(
        fx.org.script_executor(&mut fx.ledger, &[0, 0, 0, 0]).unwrap(),
        None
    );
    let err = fx.org.enable_executor(&mut fx.ledger, CREATOR, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidExecutor(_)));
}

#[test]
fn first_registration_lands_at_index_one() {
    let mut fx = Fixture::new();
    let calls_executor = fx.org.calls_executor;
    assert_eq!(
        fx.org.executor(&mut fx.ledger, 1).unwrap(),
        (calls_executor, true)
    );
    assert_eq!(
        fx.org.executor(&mut fx.ledger, 2).unwrap(),
        (Address::ZERO, false)
    );
    assert_eq!(
        fx.org
            .script_executor(&mut fx.ledger, &CALLS_SPEC_ID.to_be_bytes())
            .unwrap(),
        Some(calls_executor)
    );
    // too short to carry a spec id
    assert_eq!(fx.org.script_executor(&mut fx.ledger, &[0, 1]).unwrap(), None);

    let another = fx.ledger.deploy(CREATOR, CallsScript, &[]).unwrap();
    assert_eq!(
        fx.org.add_executor(&mut fx.ledger, CREATOR, another).unwrap(),
        2
    );
}

#[test]
fn registry_roles_gate_registration_and_toggling() {
    let mut fx = Fixture::new();
    let another = fx.ledger.deploy(CREATOR, CallsScript, &[]).unwrap();
    assert!(matches!(
        fx.org.add_executor(&mut fx.ledger, ALICE, another),
        Err(Error::PermissionDenied(_))
    ));
    assert!(matches!(
        fx.org.disable_executor(&mut fx.ledger, ALICE, 1),
        Err(Error::PermissionDenied(_))
    ));
}

#[test]
fn toggling_twice_is_an_error() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.org.enable_executor(&mut fx.ledger, CREATOR, 1),
        Err(Error::ExecutorAlreadyEnabled(1))
    ));
    let receipt = fx.org.disable_executor(&mut fx.ledger, CREATOR, 1).unwrap();
    assert_eq!(
        receipt.events[0].kind,
        EventKind::ExecutorDisabled {
            index: 1,
            executor: fx.org.calls_executor,
        }
    );
    assert!(matches!(
        fx.org.disable_executor(&mut fx.ledger, CREATOR, 1),
        Err(Error::ExecutorAlreadyDisabled(1))
    ));
    assert!(matches!(
        fx.org.disable_executor(&mut fx.ledger, CREATOR, 7),
        Err(Error::InvalidExecutor(_))
    ));
}

#[test]
fn four_increments_count_to_four() {
    let mut fx = Fixture::new();
    let t = fx.counter();

    let committed = execute(&mut fx.ledger, CREATOR, fx.host, &increments(&[t; 4])).unwrap();
    assert_eq!(fx.value(t), 4);
    // only the last call's return value comes back
    assert_eq!(Decoder::new(&committed.value).u64().unwrap(), 4);
}

#[rstest]
#[case::starting_with_a(&[0, 1, 0, 1, 0], 3, 2)]
#[case::starting_with_b(&[1, 0, 1, 0, 1], 2, 3)]
fn alternating_targets_each_count_their_actions(
    #[case] order: &[usize],
    #[case] expected_a: u64,
    #[case] expected_b: u64,
) {
    let mut fx = Fixture::new();
    let counters = [fx.counter(), fx.counter()];
    fx.ledger
        .transact(ALICE, counters[0], &Counter::increment_by(10))
        .unwrap();

    let targets: Vec<Address> = order.iter().map(|i| counters[*i]).collect();
    execute(&mut fx.ledger, CREATOR, fx.host, &increments(&targets)).unwrap();

    assert_eq!(fx.value(counters[0]), 10 + expected_a);
    assert_eq!(fx.value(counters[1]), expected_b);
}

#[test]
fn empty_script_succeeds_with_empty_output() {
    let mut fx = Fixture::new();
    let committed = execute(&mut fx.ledger, CREATOR, fx.host, &increments(&[])).unwrap();
    assert!(committed.value.is_empty());
}

#[test]
fn uninitialized_executor_rejects_execution() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let executor = fx.ledger.deploy(CREATOR, CallsScript, &[]).unwrap();
    let call = Encoder::call(interface::executor::EXEC_SCRIPT)
        .bytes(&increments(&[t]))
        .bytes(&[])
        .addresses(&[])
        .finish();

    for _ in 0..2 {
        let err = fx.ledger.transact(CREATOR, executor, &call).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }
    assert_eq!(fx.value(t), 0);

    let init = Encoder::call(interface::executor::INITIALIZE).finish();
    fx.ledger.transact(CREATOR, executor, &init).unwrap();
    fx.ledger.transact(CREATOR, executor, &call).unwrap();
    assert_eq!(fx.value(t), 1);
    assert!(matches!(
        fx.ledger.transact(CREATOR, executor, &init),
        Err(Error::AlreadyInitialized)
    ));
}

#[test]
fn uninitialized_host_rejects_execution() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let base = fx
        .org
        .get_app(&mut fx.ledger, runtime::Namespace::AppBases, *ids::SCRIPT_HOST_APP_ID)
        .unwrap();
    let bare = fx
        .org
        .new_app_instance(&mut fx.ledger, CREATOR, *ids::SCRIPT_HOST_APP_ID, base, &[], false)
        .unwrap();

    let err = execute(&mut fx.ledger, CREATOR, bare, &increments(&[t])).unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
}

#[test]
fn execution_needs_the_execute_role() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let err = execute(&mut fx.ledger, ALICE, fx.host, &increments(&[t])).unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert_eq!(fx.value(t), 0);
}

#[test]
fn disabled_executor_stops_valid_scripts() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let script = increments(&[t]);
    execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap();

    fx.org.disable_executor(&mut fx.ledger, CREATOR, 1).unwrap();
    let err = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap_err();
    assert!(matches!(err, Error::InvalidExecutor(_)));
    assert_eq!(fx.value(t), 1);

    fx.org.enable_executor(&mut fx.ledger, CREATOR, 1).unwrap();
    execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap();
    assert_eq!(fx.value(t), 2);
}

#[test]
fn unregistered_spec_id_is_an_invalid_executor() {
    let mut fx = Fixture::new();
    let mut script = increments(&[]);
    script[..4].copy_from_slice(&9u32.to_be_bytes());
    assert!(matches!(
        execute(&mut fx.ledger, CREATOR, fx.host, &script),
        Err(Error::InvalidExecutor(_))
    ));
}

#[test]
fn failing_action_rolls_back_earlier_ones() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let script = calls::encode(&[
        Action::new(t, Counter::increment()),
        Action::new(t, Encoder::call(interface::counter::FAIL).finish()),
    ])
    .unwrap();

    let err = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap_err();
    assert!(matches!(err, Error::Reverted(_)));
    assert_eq!(fx.value(t), 0);
}

#[test]
fn banned_target_stops_the_script_before_any_call() {
    let mut fx = Fixture::new();
    let (a, b) = (fx.counter(), fx.counter());
    let script = increments(&[a, b, a]);

    let err = execute_with_ban(&mut fx.ledger, CREATOR, fx.host, &script, &[b]).unwrap_err();
    assert!(matches!(err, Error::BannedAddress(banned) if banned == b));
    assert_eq!((fx.value(a), fx.value(b)), (0, 0));

    let unrelated = Address::from_low_u64(0x5afe);
    let banned = execute_with_ban(&mut fx.ledger, CREATOR, fx.host, &script, &[unrelated]).unwrap();
    let plain = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap();
    assert_eq!(banned.value, Encoder::new().u64(2).finish());
    assert_eq!(plain.value, Encoder::new().u64(4).finish());
    assert_eq!(banned.events.len(), plain.events.len());
    assert_eq!((fx.value(a), fx.value(b)), (4, 2));
}

#[test]
fn overlong_record_is_rejected_before_any_call() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let mut script = increments(&[t]);
    script.extend_from_slice(&t.0);
    script.extend_from_slice(&64u32.to_be_bytes());
    script.extend_from_slice(&Counter::increment());

    let err = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap_err();
    assert!(matches!(err, Error::MalformedScript(_)));
    assert_eq!(fx.value(t), 0);
}

#[test]
fn actions_are_issued_by_the_host() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let committed = execute(&mut fx.ledger, CREATOR, fx.host, &increments(&[t])).unwrap();

    let kinds: Vec<&EventKind> = committed.events.iter().map(|e| &e.kind).collect();
    assert_eq!(
        kinds[0],
        &EventKind::ScriptCall {
            sender: CREATOR,
            source: fx.host,
            target: t,
        }
    );
    assert!(matches!(
        kinds[1],
        EventKind::ScriptResult { executor, .. } if *executor == fx.org.calls_executor
    ));
}

/// Revokes `EXECUTE_ROLE` from the creator on the host when called, then
/// reports whether the creator still holds it.
struct Revoker {
    acl: Address,
    kernel: Address,
    host: Address,
}

impl Component for Revoker {
    fn name(&self) -> &'static str {
        "revoker"
    }

    fn call(&self, env: &mut Env<'_>, _input: &[u8]) -> Result<Vec<u8>> {
        let revoke = Encoder::call(interface::acl::REVOKE_PERMISSION)
            .address(CREATOR)
            .address(self.host)
            .word(ids::EXECUTE_ROLE.0)
            .finish();
        env.call(self.acl, &revoke)?;

        let check = Encoder::call(interface::kernel::HAS_PERMISSION)
            .address(CREATOR)
            .address(self.host)
            .word(ids::EXECUTE_ROLE.0)
            .words(&[])
            .finish();
        env.static_call(self.kernel, &check)
    }
}

#[test]
fn reentrant_calls_see_live_permissions() {
    let mut fx = Fixture::new();
    let revoker = Revoker {
        acl: fx.org.acl,
        kernel: fx.org.kernel,
        host: fx.host,
    };
    let revoker = fx.ledger.deploy(CREATOR, revoker, &[]).unwrap();
    // the revoker manages EXECUTE_ROLE on the host from now on
    fx.org
        .set_permission_manager(&mut fx.ledger, CREATOR, revoker, fx.host, *ids::EXECUTE_ROLE)
        .unwrap();

    let t = fx.counter();
    let script = calls::encode(&[Action::new(revoker, Vec::new())]).unwrap();
    let committed = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap();
    assert!(!Decoder::new(&committed.value).bool().unwrap());

    let err = execute(&mut fx.ledger, CREATOR, fx.host, &increments(&[t])).unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

/// Calls back into the host's script entry point.
struct Reenter {
    host: Address,
    script: Vec<u8>,
}

impl Component for Reenter {
    fn name(&self) -> &'static str {
        "reenter"
    }

    fn call(&self, env: &mut Env<'_>, _input: &[u8]) -> Result<Vec<u8>> {
        let call = Encoder::call(interface::host::EXECUTE)
            .bytes(&self.script)
            .finish();
        env.call(self.host, &call)
    }
}

#[test]
fn scripts_can_reenter_through_permitted_apps() {
    let mut fx = Fixture::new();
    let t = fx.counter();
    let reenter = fx
        .ledger
        .deploy(
            CREATOR,
            Reenter {
                host: fx.host,
                script: increments(&[t]),
            },
            &[],
        )
        .unwrap();

    let script = calls::encode(&[Action::new(reenter, Vec::new())]).unwrap();
    // the reentering component lacks EXECUTE_ROLE on the host
    assert!(matches!(
        execute(&mut fx.ledger, CREATOR, fx.host, &script),
        Err(Error::PermissionDenied(_))
    ));

    fx.org
        .grant_permission(&mut fx.ledger, CREATOR, reenter, fx.host, *ids::EXECUTE_ROLE, &[])
        .unwrap();
    execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap();
    assert_eq!(fx.value(t), 1);
}

/// Rebinds the app it runs in to another kernel.
struct Rebinder;

impl Component for Rebinder {
    fn name(&self) -> &'static str {
        "rebinder"
    }

    fn call(&self, env: &mut Env<'_>, _input: &[u8]) -> Result<Vec<u8>> {
        runtime::app::bind(env, Address::from_low_u64(0xbad), Word::ZERO)?;
        Ok(Encoder::new().bytes(&[]).finish())
    }
}

#[test]
fn executors_may_not_rebind_the_runner() {
    let mut fx = Fixture::new();
    let rebinder = fx.ledger.deploy(CREATOR, Rebinder, &[]).unwrap();
    let index = fx.org.add_executor(&mut fx.ledger, CREATOR, rebinder).unwrap();

    let script = index.to_be_bytes().to_vec();
    let err = execute(&mut fx.ledger, CREATOR, fx.host, &script).unwrap_err();
    assert!(matches!(err, Error::ProtectedStateModified(host) if host == fx.host));
}

#[test]
fn committed_scripts_reach_the_audit_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::open(dir.path().join("events.db")).unwrap();
    let mut fx = Fixture::with_ledger(Ledger::new().with_store(store));
    let t = fx.counter();

    let committed = execute(&mut fx.ledger, CREATOR, fx.host, &increments(&[t, t])).unwrap();
    let failed = execute(&mut fx.ledger, BOB, fx.host, &increments(&[t]));
    assert!(failed.is_err());

    let store = fx.ledger.store().unwrap();
    let logged = store.load_transaction(committed.tx_id).unwrap();
    assert_eq!(logged, committed.events);
    assert_eq!(
        store
            .load_events(committed.tx_id, Some("script_call"))
            .unwrap()
            .len(),
        2
    );
    let result = store.load_emitted(fx.host, Some("script_result")).unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn executors_can_also_be_used_directly() {
    let mut ledger = Ledger::new();
    let t = ledger.deploy(CREATOR, Counter, &[]).unwrap();
    let executor = ledger
        .atomically(CREATOR, |env| {
            let executor = env.deploy(Arc::new(CallsScript), &[])?;
            env.call(executor, &Encoder::call(interface::executor::INITIALIZE).finish())?;
            Ok(executor)
        })
        .unwrap()
        .value;

    let call = Encoder::call(interface::executor::EXEC_SCRIPT)
        .bytes(&increments(&[t, t, t]))
        .bytes(&[])
        .addresses(&[])
        .finish();
    let out = ledger.transact(ALICE, executor, &call).unwrap().value;
    let out = Decoder::new(&out).bytes().unwrap();
    assert_eq!(out, Encoder::new().u64(3).finish());

    let kind = Encoder::call(interface::executor::EXECUTOR_TYPE).finish();
    assert_eq!(
        ledger.view(executor, &kind).unwrap(),
        Encoder::new().u64(CALLS_SPEC_ID as u64).finish()
    );
}
