//! Per-frame view of the ledger handed to components.

use super::{BlockContext, Ledger, MAX_CALL_DEPTH};
use crate::{Component, Error, Result};
use policy::{Address, Word};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use storage::EventKind;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Storage context; what the running code sees as "this".
    context: Address,
    caller: Address,
    depth: usize,
    read_only: bool,
}

/// The execution environment of one call frame.
///
/// Storage reads always go to the live ledger, so a value read after a
/// nested call reflects whatever that call changed.
pub struct Env<'a> {
    ledger: &'a mut Ledger,
    frame: Frame,
}

impl<'a> Env<'a> {
    pub(crate) fn top(ledger: &'a mut Ledger, origin: Address) -> Self {
        Self {
            ledger,
            frame: Frame {
                context: origin,
                caller: Address::ZERO,
                depth: 0,
                read_only: false,
            },
        }
    }

    /// Address whose storage this frame reads and writes.
    pub fn this(&self) -> Address {
        self.frame.context
    }

    pub fn caller(&self) -> Address {
        self.frame.caller
    }

    pub fn depth(&self) -> usize {
        self.frame.depth
    }

    pub fn is_static(&self) -> bool {
        self.frame.read_only
    }

    pub fn block(&self) -> BlockContext {
        self.ledger.block
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.ledger.has_code(address)
    }

    pub fn load_raw(&self, key: &Word) -> Option<&[u8]> {
        self.ledger.load(self.frame.context, key)
    }

    pub fn load<T: DeserializeOwned>(&self, key: &Word) -> Result<Option<T>> {
        self.load_raw(key)
            .map(|bytes| serde_json::from_slice::<T>(bytes))
            .transpose()
            .map_err(Error::from)
    }

    pub fn store<T: Serialize>(&mut self, key: Word, value: &T) -> Result<()> {
        self.writable()?;
        let bytes = serde_json::to_vec(value)?;
        self.ledger.set(self.frame.context, key, Some(bytes))
    }

    pub fn clear(&mut self, key: Word) -> Result<()> {
        self.writable()?;
        self.ledger.set(self.frame.context, key, None)
    }

    /// Emit an audit record; dropped if the transaction reverts.
    pub fn emit(&mut self, kind: EventKind) -> Result<()> {
        self.writable()?;
        self.ledger.emit(self.frame.context, kind);
        Ok(())
    }

    /// Call `target` in its own storage context.
    pub fn call(&mut self, target: Address, input: &[u8]) -> Result<Vec<u8>> {
        let frame = Frame {
            context: target,
            caller: self.frame.context,
            depth: self.frame.depth + 1,
            read_only: self.frame.read_only,
        };
        self.enter(target, frame, input)
    }

    /// Call `target` without allowing any state change.
    pub fn static_call(&mut self, target: Address, input: &[u8]) -> Result<Vec<u8>> {
        let frame = Frame {
            context: target,
            caller: self.frame.context,
            depth: self.frame.depth + 1,
            read_only: true,
        };
        self.enter(target, frame, input)
    }

    /// Run `implementation`'s code in this frame's storage context, keeping
    /// this frame's caller.
    pub fn delegate_call(&mut self, implementation: Address, input: &[u8]) -> Result<Vec<u8>> {
        let frame = Frame {
            depth: self.frame.depth + 1,
            ..self.frame
        };
        self.enter(implementation, frame, input)
    }

    /// Deploy a component and run its constructor with `args`.
    pub fn deploy(&mut self, code: Arc<dyn Component>, args: &[u8]) -> Result<Address> {
        self.writable()?;
        let depth = self.frame.depth + 1;
        if depth > MAX_CALL_DEPTH {
            return Err(Error::CallDepthExceeded(depth));
        }

        let checkpoint = self.ledger.checkpoint();
        let deployer = self.frame.context;
        let address = self.ledger.next_address(deployer);

        let result = self.ledger.create_account(address, Arc::clone(&code)).and_then(|()| {
            let mut child = Env {
                ledger: &mut *self.ledger,
                frame: Frame {
                    context: address,
                    caller: deployer,
                    depth,
                    read_only: false,
                },
            };
            code.construct(&mut child, args)
        });

        match result {
            Ok(()) => {
                debug!(%deployer, %address, component = code.name(), "deployed");
                Ok(address)
            }
            Err(e) => {
                self.ledger.revert_to(checkpoint);
                Err(e)
            }
        }
    }

    fn enter(&mut self, code_address: Address, frame: Frame, input: &[u8]) -> Result<Vec<u8>> {
        if frame.depth > MAX_CALL_DEPTH {
            return Err(Error::CallDepthExceeded(frame.depth));
        }
        let code = self.ledger.code(code_address).ok_or(Error::NoCode(code_address))?;

        debug!(
            depth = frame.depth,
            caller = %frame.caller,
            context = %frame.context,
            component = code.name(),
            "enter frame"
        );

        let checkpoint = self.ledger.checkpoint();
        let mut child = Env {
            ledger: &mut *self.ledger,
            frame,
        };
        match code.call(&mut child, input) {
            Ok(output) => Ok(output),
            Err(e) => {
                self.ledger.revert_to(checkpoint);
                debug!(depth = frame.depth, error = %e, "frame reverted");
                Err(e)
            }
        }
    }

    fn writable(&self) -> Result<()> {
        if self.frame.read_only {
            Err(Error::StaticCallViolation)
        } else {
            Ok(())
        }
    }
}
