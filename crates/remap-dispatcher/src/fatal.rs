//! Abort path for dispatcher contract violations.

use std::process;

use tracing::error;

/// Log a contract violation and abort the process.
///
/// Reached only when queued work may already reference freed collaborator state,
/// so unwinding is not an option.
pub(crate) fn contract_violation(what: &'static str) -> ! {
    error!(violation = what, "dispatcher_contract_violation");
    eprintln!("remap-dispatcher: contract violation: {what}");
    process::abort()
}
