//! Collaborator-side handle pairing an [`ObjectId`] with a dispatcher.

use std::sync::{Arc, Weak};

use tracing::warn;

use crate::{Dispatcher, ObjectId, TimePoint, fatal, shared};

/// Base for anything that schedules work on a dispatcher.
///
/// Construction allocates an id and attaches it. The owning type must call
/// [`detach_from_dispatcher`](Self::detach_from_dispatcher) (or the `_with` variant) in
/// its own `Drop` before its fields go away; dropping a client that is still attached
/// aborts the process.
///
/// The dispatcher is held weakly, so a client outliving the dispatcher degrades to a
/// no-op instead of keeping the worker alive.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use parking_lot::Mutex;
/// use remap_dispatcher::DispatcherClient;
///
/// struct DeviceMonitor {
///     client: DispatcherClient,
///     seen: Arc<Mutex<Vec<u32>>>,
/// }
///
/// impl DeviceMonitor {
///     fn on_device_matched(&self, registry_id: u32) {
///         // Called from an OS notification thread; marshal onto the worker.
///         let seen = self.seen.clone();
///         self.client
///             .enqueue_to_dispatcher(move || seen.lock().push(registry_id));
///     }
/// }
///
/// impl Drop for DeviceMonitor {
///     fn drop(&mut self) {
///         self.client.detach_from_dispatcher();
///     }
/// }
/// ```
pub struct DispatcherClient {
    /// Dispatcher this client schedules on.
    dispatcher: Weak<Dispatcher>,
    /// Identity attached to `dispatcher`.
    object_id: ObjectId,
}

impl DispatcherClient {
    /// Create a client on `dispatcher`, or on the shared dispatcher when `None`.
    pub fn new(dispatcher: Option<&Arc<Dispatcher>>) -> Self {
        let dispatcher = match dispatcher {
            Some(d) => Arc::downgrade(d),
            None => shared::get_dispatcher()
                .map(|d| Arc::downgrade(&d))
                .unwrap_or_default(),
        };
        let object_id = ObjectId::new();
        match dispatcher.upgrade() {
            Some(d) => d.attach(&object_id),
            None => warn!(owner = %object_id.value(), "dispatcher_client_without_dispatcher"),
        }
        Self {
            dispatcher,
            object_id,
        }
    }

    /// Identity this client's work is tagged with.
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// The dispatcher, if it is still alive.
    pub fn dispatcher(&self) -> Option<Arc<Dispatcher>> {
        self.dispatcher.upgrade()
    }

    /// Weak handle to the dispatcher, for closures that need to reschedule.
    pub fn weak_dispatcher(&self) -> Weak<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Whether this client is still attached.
    pub fn attached(&self) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|d| d.attached(&self.object_id))
    }

    /// Queue `f` on the dispatcher, due immediately.
    pub fn enqueue_to_dispatcher<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(d) = self.dispatcher.upgrade() {
            d.enqueue(&self.object_id, f);
        }
    }

    /// Queue `f` on the dispatcher, due at `when`.
    pub fn enqueue_to_dispatcher_at<F>(&self, f: F, when: TimePoint)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(d) = self.dispatcher.upgrade() {
            d.enqueue_at(&self.object_id, f, when);
        }
    }

    /// The dispatcher's current time, or [`TimePoint::ZERO`] once it is gone.
    pub fn when_now(&self) -> TimePoint {
        self.dispatcher
            .upgrade()
            .map_or(TimePoint::ZERO, |d| d.when_now())
    }

    /// Detach from the dispatcher, waiting out any in-flight work for this client.
    pub fn detach_from_dispatcher(&self) {
        if let Some(d) = self.dispatcher.upgrade() {
            d.detach(&self.object_id);
        }
    }

    /// Detach, then run `cleanup` on the dispatcher's worker thread.
    pub fn detach_from_dispatcher_with<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(d) = self.dispatcher.upgrade() {
            d.detach_with(&self.object_id, cleanup);
        }
    }
}

impl Drop for DispatcherClient {
    fn drop(&mut self) {
        if self.attached() {
            fatal::contract_violation(
                "DispatcherClient dropped while attached; call detach_from_dispatcher first",
            );
        }
    }
}
