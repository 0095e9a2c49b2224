//! Apps shipped with the runtime.

mod counter;
mod host;

pub use counter::Counter;
pub use host::ScriptHost;
