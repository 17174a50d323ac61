//! Error types and result alias for the remap-dispatcher crate.
use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Recoverable failures while bringing a dispatcher up.
///
/// Misuse of the dispatcher contract is not reported here; see the crate docs.
#[derive(Error, Debug)]
pub enum Error {
    /// The OS refused to spawn the worker thread.
    #[error("Failed to spawn dispatcher worker: {0}")]
    Spawn(#[from] io::Error),
    /// The worker thread exited before reporting that it was running.
    #[error("Dispatcher worker exited during startup")]
    WorkerStartup,
}
