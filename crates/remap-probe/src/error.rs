//! Error handling for the remap-probe crate.

use std::result;

use thiserror::Error;

/// Convenient result type for remap-probe operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while running the probe.
#[derive(Debug, Error)]
pub enum Error {
    /// The shared dispatcher could not be started.
    #[error("Dispatcher error: {0}")]
    Dispatcher(#[from] remap_dispatcher::Error),
    /// A zero interval would reschedule without ever yielding.
    #[error("Heartbeat interval must be non-zero")]
    ZeroInterval,
}
