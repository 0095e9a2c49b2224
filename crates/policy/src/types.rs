//! Fixed-width identifiers used throughout an organization.
//!
//! All three types print as `0x`-prefixed lowercase hex and serialize the
//! same way, so they read naturally in TOML manifests and audit logs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account or component address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0; 20]);

    /// Address whose last byte is `n`; handy for well-known test actors.
    pub const fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        let be = n.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Right-align the address in a word.
    pub fn to_word(&self) -> Word {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        Word(word)
    }

    /// Inverse of [`Address::to_word`]. Fails if the upper 12 bytes are not zero.
    pub fn from_word(word: &Word) -> Result<Self> {
        if word.0[..12].iter().any(|b| *b != 0) {
            return Err(Error::Invalid(format!("word {word} is not an address")));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word.0[12..]);
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Address(decode_fixed(s)?))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

/// A 32-byte big-endian word. Ordering is numeric.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Word(pub [u8; 32]);

impl Word {
    pub const ZERO: Word = Word([0; 32]);

    pub fn from_u64(n: u64) -> Self {
        Self::from_u128(n as u128)
    }

    pub fn from_u128(n: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&n.to_be_bytes());
        Word(word)
    }

    /// The value as `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(be))
    }

    /// SHA-256 of arbitrary bytes.
    pub fn hash(bytes: impl AsRef<[u8]>) -> Self {
        Word(Sha256::digest(bytes.as_ref()).into())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Accepts `0x`-prefixed hex of exactly 32 bytes, or a decimal integer.
impl FromStr for Word {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with("0x") {
            return Ok(Word(decode_fixed(s)?));
        }
        s.parse::<u128>()
            .map(Word::from_u128)
            .map_err(|e| Error::Invalid(format!("invalid word {s:?}: {e}")))
    }
}

impl TryFrom<String> for Word {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Word> for String {
    fn from(w: Word) -> Self {
        w.to_string()
    }
}

impl From<Address> for Word {
    fn from(a: Address) -> Self {
        a.to_word()
    }
}

/// Stable identifier naming a capability.
///
/// Role ids are derived from a role name once and compared directly after
/// that; see [`RoleId::named`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(pub Word);

impl RoleId {
    /// Derive the id for a role name such as `"APP_MANAGER_ROLE"`.
    pub fn named(name: &str) -> Self {
        RoleId(Word::hash(name.as_bytes()))
    }

    pub fn as_word(&self) -> &Word {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleId({})", self.0)
    }
}

impl TryFrom<String> for RoleId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Ok(RoleId(Word(decode_fixed(&s)?)))
    }
}

impl From<RoleId> for String {
    fn from(r: RoleId) -> Self {
        r.to_string()
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N]> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| Error::Invalid(format!("invalid hex {s:?}: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Invalid(format!("expected {N} bytes, got {}", b.len())))
}
