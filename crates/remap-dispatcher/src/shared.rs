//! Process-wide default dispatcher.
//!
//! Daemons call [`initialize`] once at startup and [`terminate`] at shutdown.
//! [`DispatcherClient::new(None)`](crate::DispatcherClient::new) picks this dispatcher up;
//! tests pass their own dispatcher instead.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::info;

use crate::{Dispatcher, HardwareTimeSource, Result};

/// The shared clock and dispatcher, each present only between initialize and terminate.
#[derive(Default)]
struct Shared {
    /// Clock backing `dispatcher`.
    time_source: Option<Arc<HardwareTimeSource>>,
    /// The default dispatcher.
    dispatcher: Option<Arc<Dispatcher>>,
}

static SHARED: Lazy<Mutex<Shared>> = Lazy::new(|| Mutex::new(Shared::default()));

/// Create the shared hardware clock and dispatcher if they do not exist yet.
pub fn initialize() -> Result<()> {
    let mut shared = SHARED.lock();
    if shared.dispatcher.is_some() {
        return Ok(());
    }
    let time_source = Arc::new(HardwareTimeSource::new());
    let dispatcher = Dispatcher::new(&time_source)?;
    shared.time_source = Some(time_source);
    shared.dispatcher = Some(Arc::new(dispatcher));
    info!("shared_dispatcher_initialized");
    Ok(())
}

/// Terminate and release the shared dispatcher and its clock. Idempotent.
///
/// Must not be called from the shared dispatcher's worker thread.
pub fn terminate() {
    let (dispatcher, time_source) = {
        let mut shared = SHARED.lock();
        (shared.dispatcher.take(), shared.time_source.take())
    };
    let Some(dispatcher) = dispatcher else {
        return;
    };
    // Joined outside the lock so worker closures may still call `get_dispatcher`.
    dispatcher.terminate();
    drop(dispatcher);
    drop(time_source);
    info!("shared_dispatcher_terminated");
}

/// The shared dispatcher, or `None` outside initialize/terminate.
pub fn get_dispatcher() -> Option<Arc<Dispatcher>> {
    SHARED.lock().dispatcher.clone()
}

/// The clock behind the shared dispatcher, or `None` outside initialize/terminate.
pub fn get_time_source() -> Option<Arc<HardwareTimeSource>> {
    SHARED.lock().time_source.clone()
}
