#![allow(dead_code)]

use policy::Address;
use runtime::{Action, Counter, Ledger, Organization, calls, ids};

pub const CREATOR: Address = Address::from_low_u64(0x100);
pub const ALICE: Address = Address::from_low_u64(0xa11ce);
pub const BOB: Address = Address::from_low_u64(0xb0b);

/// A bootstrapped organization with an initialized script host that the
/// creator may execute through.
pub struct Fixture {
    pub ledger: Ledger,
    pub org: Organization,
    pub host: Address,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_ledger(Ledger::new())
    }

    pub fn with_ledger(mut ledger: Ledger) -> Self {
        let org = Organization::bootstrap(&mut ledger, CREATOR).unwrap().value;
        let host = org.install_script_host(&mut ledger, CREATOR).unwrap();
        org.create_permission(&mut ledger, CREATOR, CREATOR, host, *ids::EXECUTE_ROLE, CREATOR)
            .unwrap();
        Self { ledger, org, host }
    }

    pub fn counter(&mut self) -> Address {
        self.ledger.deploy(CREATOR, Counter, &[]).unwrap()
    }

    pub fn value(&mut self, counter: Address) -> u64 {
        Counter::value_of(&mut self.ledger, counter).unwrap()
    }
}

pub fn increments(targets: &[Address]) -> Vec<u8> {
    let actions: Vec<Action> = targets
        .iter()
        .map(|t| Action::new(*t, Counter::increment()))
        .collect();
    calls::encode(&actions).unwrap()
}
