//! Parameter predicates narrowing a grant to specific invocation arguments.
//!
//! On the wire a predicate packs into one word:
//!
//! ```text
//! byte 0      byte 1   bytes 2..32
//! [ arg id ] [  op  ] [   value   ]
//! ```
//!
//! Arg ids `0..=199` select an argument position, `200` the block number,
//! `201` the block timestamp and `203` marks an oracle lookup whose value is
//! the oracle address.

use crate::{Address, Error, PermissionRequest, Result, Word};
use serde::{Deserialize, Serialize};

const MAX_PARAM_ID: u8 = 199;
const BLOCK_NUMBER_ID: u8 = 200;
const TIMESTAMP_ID: u8 = 201;
const ORACLE_ID: u8 = 203;
const ORACLE_OP: u8 = 7;

/// Comparison operator of a [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Op {
    /// `actual <op> expected`.
    pub fn compare(&self, actual: &Word, expected: &Word) -> bool {
        match self {
            Op::Eq => actual == expected,
            Op::Neq => actual != expected,
            Op::Gt => actual > expected,
            Op::Lt => actual < expected,
            Op::Gte => actual >= expected,
            Op::Lte => actual <= expected,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Op::Eq => 1,
            Op::Neq => 2,
            Op::Gt => 3,
            Op::Lt => 4,
            Op::Gte => 5,
            Op::Lte => 6,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Op::Eq,
            2 => Op::Neq,
            3 => Op::Gt,
            4 => Op::Lt,
            5 => Op::Gte,
            6 => Op::Lte,
            _ => return None,
        })
    }
}

/// The value a comparison reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    /// Argument at this position of the request.
    Param(u8),
    BlockNumber,
    Timestamp,
}

/// A single condition of a grant. A grant's predicates are AND-combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare { arg: Arg, op: Op, value: Word },
    /// Custom lookup: ask the oracle component at this address.
    Oracle { oracle: Address },
}

/// Host facilities a predicate may consult while being evaluated.
pub trait Environment {
    fn block_number(&self) -> u64;

    fn timestamp(&self) -> u64;

    /// Ask an oracle whether `request` may proceed. A failing oracle must
    /// answer `false`.
    fn can_perform(&mut self, oracle: Address, request: &PermissionRequest) -> bool;
}

impl Predicate {
    pub fn param(position: u8, op: Op, value: Word) -> Self {
        Predicate::Compare {
            arg: Arg::Param(position),
            op,
            value,
        }
    }

    pub fn evaluate<E: Environment + ?Sized>(
        &self,
        env: &mut E,
        request: &PermissionRequest,
    ) -> bool {
        match self {
            Predicate::Compare { arg, op, value } => {
                let actual = match arg {
                    Arg::Param(position) => match request.arg(*position as usize) {
                        Some(word) => word,
                        None => return false,
                    },
                    Arg::BlockNumber => Word::from_u64(env.block_number()),
                    Arg::Timestamp => Word::from_u64(env.timestamp()),
                };
                op.compare(&actual, value)
            }
            Predicate::Oracle { oracle } => env.can_perform(*oracle, request),
        }
    }

    /// Pack into the one-word wire format.
    pub fn encode(&self) -> Result<Word> {
        let mut word = [0u8; 32];
        match self {
            Predicate::Compare { arg, op, value } => {
                if value.0[..2] != [0, 0] {
                    return Err(Error::Invalid(format!(
                        "predicate value {value} does not fit in 30 bytes"
                    )));
                }
                word[0] = match arg {
                    Arg::Param(position) if *position <= MAX_PARAM_ID => *position,
                    Arg::Param(position) => {
                        return Err(Error::Invalid(format!(
                            "argument position {position} exceeds {MAX_PARAM_ID}"
                        )));
                    }
                    Arg::BlockNumber => BLOCK_NUMBER_ID,
                    Arg::Timestamp => TIMESTAMP_ID,
                };
                word[1] = op.code();
                word[2..].copy_from_slice(&value.0[2..]);
            }
            Predicate::Oracle { oracle } => {
                word[0] = ORACLE_ID;
                word[1] = ORACLE_OP;
                word[2..].copy_from_slice(&oracle.to_word().0[2..]);
            }
        }
        Ok(Word(word))
    }

    /// Unpack from the one-word wire format.
    pub fn decode(word: &Word) -> Result<Self> {
        let (id, op) = (word.0[0], word.0[1]);
        let mut value = [0u8; 32];
        value[2..].copy_from_slice(&word.0[2..]);
        let value = Word(value);

        if id == ORACLE_ID {
            if op != ORACLE_OP {
                return Err(Error::Invalid(format!("oracle predicate with op {op}")));
            }
            return Ok(Predicate::Oracle {
                oracle: Address::from_word(&value)?,
            });
        }

        let arg = match id {
            0..=MAX_PARAM_ID => Arg::Param(id),
            BLOCK_NUMBER_ID => Arg::BlockNumber,
            TIMESTAMP_ID => Arg::Timestamp,
            _ => return Err(Error::Invalid(format!("unknown predicate argument id {id}"))),
        };
        let op = Op::from_code(op)
            .ok_or_else(|| Error::Invalid(format!("unknown predicate op {op}")))?;
        Ok(Predicate::Compare { arg, op, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoleId;
    use rstest::rstest;

    struct Fixed {
        block: u64,
        oracle_says: bool,
    }

    impl Environment for Fixed {
        fn block_number(&self) -> u64 {
            self.block
        }

        fn timestamp(&self) -> u64 {
            1_700_000_000
        }

        fn can_perform(&mut self, _oracle: Address, _request: &PermissionRequest) -> bool {
            self.oracle_says
        }
    }

    fn request(args: &[u64]) -> PermissionRequest {
        PermissionRequest::new(
            Address::from_low_u64(1),
            Address::from_low_u64(2),
            RoleId::named("R"),
        )
        .with_args(args.iter().map(|a| Word::from_u64(*a)))
    }

    #[rstest]
    #[case(Op::Eq, 5, true)]
    #[case(Op::Eq, 6, false)]
    #[case(Op::Neq, 6, true)]
    #[case(Op::Gt, 4, true)]
    #[case(Op::Gt, 5, false)]
    #[case(Op::Lt, 6, true)]
    #[case(Op::Gte, 5, true)]
    #[case(Op::Lte, 4, false)]
    fn compares_first_argument(#[case] op: Op, #[case] expected: u64, #[case] allowed: bool) {
        let mut env = Fixed { block: 1, oracle_says: false };
        let predicate = Predicate::param(0, op, Word::from_u64(expected));
        assert_eq!(predicate.evaluate(&mut env, &request(&[5])), allowed);
    }

    #[test]
    fn missing_argument_fails() {
        let mut env = Fixed { block: 1, oracle_says: true };
        let predicate = Predicate::param(3, Op::Neq, Word::ZERO);
        assert!(!predicate.evaluate(&mut env, &request(&[1, 2])));
    }

    #[test]
    fn block_number_and_oracle() {
        let mut env = Fixed { block: 10, oracle_says: true };
        let before = Predicate::Compare {
            arg: Arg::BlockNumber,
            op: Op::Lt,
            value: Word::from_u64(11),
        };
        assert!(before.evaluate(&mut env, &request(&[])));

        let oracle = Predicate::Oracle {
            oracle: Address::from_low_u64(9),
        };
        assert!(oracle.evaluate(&mut env, &request(&[])));
        env.oracle_says = false;
        assert!(!oracle.evaluate(&mut env, &request(&[])));
    }

    #[test]
    fn wire_format() {
        let predicate = Predicate::param(2, Op::Gte, Word::from_u64(0x0102));
        let word = predicate.encode().unwrap();
        assert_eq!(word.0[0], 2);
        assert_eq!(word.0[1], 5);
        assert_eq!(&word.0[30..], &[0x01, 0x02]);
        assert_eq!(Predicate::decode(&word).unwrap(), predicate);

        let oracle = Predicate::Oracle {
            oracle: Address::from_low_u64(77),
        };
        assert_eq!(Predicate::decode(&oracle.encode().unwrap()).unwrap(), oracle);
    }

    #[test]
    fn oversized_value_does_not_encode() {
        let mut value = Word::ZERO;
        value.0[1] = 1;
        assert!(Predicate::param(0, Op::Eq, value).encode().is_err());
    }

    #[test]
    fn unknown_codes_do_not_decode() {
        let mut word = Word::ZERO;
        word.0[0] = 250;
        word.0[1] = 1;
        assert!(Predicate::decode(&word).is_err());
        word.0[0] = 0;
        word.0[1] = 9;
        assert!(Predicate::decode(&word).is_err());
    }
}
