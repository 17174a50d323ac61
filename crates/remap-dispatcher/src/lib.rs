//! Single-worker task dispatcher used by every monitor, timer, and socket client in remapd.
//!
//! The crate provides:
//! - [`ObjectId`]: process-unique tokens that tag queued work and make it cancellable
//! - [`TimeSource`]: the clock the dispatcher consults, with a hardware and a pseudo variant
//! - [`Dispatcher`]: one worker thread executing closures in due-time order
//! - [`DispatcherClient`]: the collaborator-side pairing of an id and a dispatcher handle
//! - [`Timer`]: repeating callbacks rescheduled through a dispatcher
//! - [`shared`]: the process-wide default dispatcher
//!
//! Collaborators attach an id before enqueueing and detach it before releasing any state
//! their queued closures reference. Work for a detached id is discarded, and a detach issued
//! from another thread waits for that id's in-flight closure to return.
#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

mod client;
mod dispatcher;
mod error;
mod fatal;
mod object_id;
pub mod shared;
mod time_source;
mod timer;

pub use client::DispatcherClient;
pub use dispatcher::{Dispatcher, DispatcherCfg};
pub use error::{Error, Result};
pub use object_id::{ObjectId, ObjectIdValue, active_object_id_count, make_new_object_id};
pub use time_source::{HardwareTimeSource, PseudoTimeSource, TimePoint, TimeSource};
pub use timer::Timer;
