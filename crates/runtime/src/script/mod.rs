//! Versioned action scripts.
//!
//! A script is `spec id (4 bytes, big-endian) ‖ body`. The spec id selects
//! the executor, registered in the [`ScriptRegistry`], that interprets the
//! body. Apps gain the ability to run scripts through [`ScriptRunner`].

pub mod calls;
mod registry;
mod runner;

pub use calls::{Action, CallsScript};
pub use registry::ScriptRegistry;
pub use runner::{ScriptRunner, run_script, script_executor};

/// Spec id of the "calls" format.
pub const CALLS_SPEC_ID: u32 = 1;

/// Length of the spec id header.
pub const SPEC_ID_LEN: usize = 4;

/// The spec id of `script`, or `None` if it is shorter than the header.
pub fn spec_id(script: &[u8]) -> Option<u32> {
    let header: [u8; SPEC_ID_LEN] = script.get(..SPEC_ID_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(header))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_header() {
        assert_eq!(spec_id(&[0, 0, 0, 1]), Some(1));
        assert_eq!(spec_id(&[0, 0, 1, 0, 0xaa, 0xbb]), Some(256));
        assert_eq!(spec_id(&[0, 0, 1]), None);
        assert_eq!(spec_id(&[]), None);
    }
}
