//! The interface every deployable component implements.

use crate::{Env, Result};

/// Logic deployed at an address.
///
/// Components hold no state of their own: everything lives in the storage
/// context of the [`Env`] they run in. The same code can therefore serve
/// many addresses, and a proxy can run it on its own storage through a
/// delegate call.
pub trait Component: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Runs once, in the new address's context, right after deployment.
    fn construct(&self, env: &mut Env<'_>, args: &[u8]) -> Result<()> {
        let _ = (env, args);
        Ok(())
    }

    /// Handle a call payload and return the encoded result.
    fn call(&self, env: &mut Env<'_>, input: &[u8]) -> Result<Vec<u8>>;
}
