//! Call payload encoding.
//!
//! A payload is a 4-byte selector followed by arguments. Static arguments
//! take one 32-byte word each. `bytes` is a length word followed by the raw
//! bytes; arrays are a count word followed by one word per item. Return
//! values use the same encoding without a selector.

use crate::{Error, Result};
use policy::{Address, Word};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

const WORD: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// First four bytes of the SHA-256 of a signature like `"increment()"`.
    pub fn of(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        Selector([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

/// Build a selector → method table for a component's dispatch.
pub fn dispatch_table<M: Copy>(entries: &[(&str, M)]) -> HashMap<Selector, M> {
    entries
        .iter()
        .map(|(signature, method)| (Selector::of(signature), *method))
        .collect()
}

/// Split a payload into its selector and an argument decoder.
pub fn split_call(input: &[u8]) -> Result<(Selector, Decoder<'_>)> {
    if input.len() < 4 {
        return Err(Error::Decode(format!("payload of {} bytes has no selector", input.len())));
    }
    let selector = Selector([input[0], input[1], input[2], input[3]]);
    Ok((selector, Decoder::new(&input[4..])))
}

/// Payload builder.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Encoder for return values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder for a call to `signature`.
    pub fn call(signature: &str) -> Self {
        Self {
            buf: Selector::of(signature).0.to_vec(),
        }
    }

    pub fn word(mut self, word: Word) -> Self {
        self.buf.extend_from_slice(&word.0);
        self
    }

    pub fn address(self, address: Address) -> Self {
        self.word(address.to_word())
    }

    pub fn u64(self, n: u64) -> Self {
        self.word(Word::from_u64(n))
    }

    pub fn bool(self, b: bool) -> Self {
        self.u64(b as u64)
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self = self.u64(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn words(self, words: &[Word]) -> Self {
        words
            .iter()
            .fold(self.u64(words.len() as u64), |enc, w| enc.word(*w))
    }

    pub fn addresses(self, addresses: &[Address]) -> Self {
        addresses
            .iter()
            .fold(self.u64(addresses.len() as u64), |enc, a| enc.address(*a))
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential argument reader. Every read is bounds-checked.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::Decode(format!(
                    "need {len} bytes at offset {}, payload has {}",
                    self.pos,
                    self.data.len()
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn word(&mut self) -> Result<Word> {
        let mut word = [0u8; WORD];
        word.copy_from_slice(self.take(WORD)?);
        Ok(Word(word))
    }

    pub fn address(&mut self) -> Result<Address> {
        let word = self.word()?;
        Address::from_word(&word).map_err(|e| Error::Decode(e.to_string()))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let word = self.word()?;
        word.to_u64()
            .ok_or_else(|| Error::Decode(format!("{word} does not fit in 64 bits")))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let n = self.u64()?;
        u32::try_from(n).map_err(|_| Error::Decode(format!("{n} does not fit in 32 bits")))
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u64()? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(Error::Decode(format!("{n} is not a bool"))),
        }
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.len_prefix(1)?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn words(&mut self) -> Result<Vec<Word>> {
        let count = self.len_prefix(WORD)?;
        (0..count).map(|_| self.word()).collect()
    }

    pub fn addresses(&mut self) -> Result<Vec<Address>> {
        let count = self.len_prefix(WORD)?;
        (0..count).map(|_| self.address()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Length word, checked against what is left so huge counts fail early.
    fn len_prefix(&mut self, item_size: usize) -> Result<usize> {
        let len = self.u64()?;
        let needed = usize::try_from(len)
            .ok()
            .and_then(|n| n.checked_mul(item_size))
            .filter(|n| *n <= self.remaining())
            .ok_or_else(|| {
                Error::Decode(format!(
                    "length {len} exceeds the {} bytes left",
                    self.remaining()
                ))
            })?;
        Ok(needed / item_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes_mixed_arguments() {
        let payload = Encoder::call("f(address,bytes,uint256[],bool)")
            .address(Address::from_low_u64(7))
            .bytes(b"hello")
            .words(&[Word::from_u64(1), Word::from_u64(2)])
            .bool(true)
            .finish();

        let (selector, mut args) = split_call(&payload).unwrap();
        assert_eq!(selector, Selector::of("f(address,bytes,uint256[],bool)"));
        assert_eq!(args.address().unwrap(), Address::from_low_u64(7));
        assert_eq!(args.bytes().unwrap(), b"hello");
        assert_eq!(args.words().unwrap(), vec![Word::from_u64(1), Word::from_u64(2)]);
        assert!(args.bool().unwrap());
        assert_eq!(args.remaining(), 0);
    }

    #[test]
    fn truncated_payloads_fail() {
        assert!(split_call(&[1, 2, 3]).is_err());

        let mut short = Decoder::new(&[0u8; 31]);
        assert!(short.word().is_err());

        // claims 100 bytes, carries 3
        let payload = Encoder::new().u64(100).finish();
        let mut payload = payload;
        payload.extend_from_slice(&[1, 2, 3]);
        assert!(Decoder::new(&payload).bytes().is_err());

        let huge = Encoder::new().word(Word([0xff; 32])).finish();
        assert!(Decoder::new(&huge).words().is_err());
    }

    #[test]
    fn selectors_differ_per_signature() {
        assert_ne!(Selector::of("increment()"), Selector::of("value()"));
        assert_eq!(Selector::of("value()"), Selector::of("value()"));
    }
}
