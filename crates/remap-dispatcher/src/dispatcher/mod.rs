//! The single-worker dispatcher.
//!
//! Every closure runs on one dedicated thread in due-time order. Each closure is tagged
//! with the [`ObjectIdValue`] of its owner and only runs if that owner is still attached
//! when the worker reaches it.
//!
//! Three locks are involved and none is held while a closure executes:
//! - the queue lock (entries plus the exit flag), paired with the wake-up condvar
//! - the attached-set lock
//! - the running-slot lock, paired with the condvar `detach` waits on
//!
//! The running slot is written before the attachment check and cleared after the
//! closure returns, so a `detach` from another thread either prevents the closure
//! from running or waits for it to finish.

mod queue;

use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    thread::{self, JoinHandle, ThreadId},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

pub(crate) use queue::{Job, When};
use queue::{Entry, Queue, Wait};

use crate::{Error, ObjectId, ObjectIdValue, Result, TimePoint, TimeSource, fatal};

/// Default name given to the worker thread.
const DEFAULT_THREAD_NAME: &str = "remap-dispatcher";

/// Construction options for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherCfg {
    /// Name of the worker thread, as shown by debuggers and crash reports.
    pub thread_name: String,
}

impl Default for DispatcherCfg {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// State shared between the dispatcher handle and its worker thread.
struct Inner {
    /// Clock consulted for timed entries; owned by whoever created the dispatcher.
    time_source: Weak<dyn TimeSource>,
    /// Pending entries and the exit flag.
    queue: Mutex<Queue>,
    /// Wakes the worker on enqueue, invoke, and terminate.
    queue_cv: Condvar,
    /// Owners whose entries may run.
    attached: Mutex<HashSet<ObjectIdValue>>,
    /// Owner of the entry currently executing on the worker.
    running: Mutex<Option<ObjectIdValue>>,
    /// Signalled whenever `running` changes.
    running_cv: Condvar,
}

impl Inner {
    /// Current clock reading, or `None` once the time source is gone.
    fn now(&self) -> Option<TimePoint> {
        self.time_source.upgrade().map(|s| s.now())
    }

    /// Whether `owner` is in the attached set.
    fn is_attached(&self, owner: ObjectIdValue) -> bool {
        self.attached.lock().contains(&owner)
    }

    /// Block until the worker has an entry ready or has been asked to exit.
    ///
    /// Returns `None` on exit, after discarding whatever is still queued.
    fn next_entry(&self) -> Option<Entry> {
        let mut queue = self.queue.lock();
        loop {
            if queue.exit {
                let discarded = queue.take_all();
                drop(queue);
                if !discarded.is_empty() {
                    debug!(count = discarded.len(), "dispatcher_discard_on_exit");
                }
                return None;
            }
            match queue::wait_for(queue.next_due(), self.now()) {
                Wait::Ready => {
                    if let Some(entry) = queue.pop_front() {
                        return Some(entry);
                    }
                }
                Wait::Idle => self.queue_cv.wait(&mut queue),
                Wait::For(delay) => {
                    self.queue_cv.wait_for(&mut queue, delay);
                }
            }
        }
    }

    /// Run one entry on the worker thread, publishing its owner in the running slot.
    fn execute(&self, entry: Entry) {
        let Entry { owner, job } = entry;

        *self.running.lock() = Some(owner);
        self.running_cv.notify_all();

        if self.is_attached(owner) {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(owner = %owner, "dispatcher_entry_panicked");
            }
        } else {
            trace!(owner = %owner, "dispatcher_skip_detached");
            drop(job);
        }

        *self.running.lock() = None;
        self.running_cv.notify_all();
    }

    /// Worker thread body.
    fn run_worker(&self) {
        while let Some(entry) = self.next_entry() {
            self.execute(entry);
        }
        trace!("dispatcher_worker_exit");
    }
}

/// Executes closures on one dedicated worker thread, ordered by due time.
///
/// Owners must [`attach`](Self::attach) before enqueueing and [`detach`](Self::detach)
/// before releasing state their closures reference. Call [`terminate`](Self::terminate)
/// before dropping the last handle.
pub struct Dispatcher {
    /// State shared with the worker.
    inner: Arc<Inner>,
    /// Join handle; `None` once terminated.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Identity of the worker thread.
    worker_thread: ThreadId,
    /// The dispatcher's own id, used to run detach cleanups.
    object_id: ObjectId,
}

impl Dispatcher {
    /// Start a dispatcher over `time_source` with default options.
    ///
    /// Only a weak reference to the clock is kept; the caller keeps it alive.
    pub fn new<T: TimeSource + 'static>(time_source: &Arc<T>) -> Result<Self> {
        let weak: Weak<T> = Arc::downgrade(time_source);
        let weak: Weak<dyn TimeSource> = weak;
        Self::with_cfg(weak, DispatcherCfg::default())
    }

    /// Start a dispatcher over a weakly held clock with explicit options.
    ///
    /// Blocks until the worker thread is running.
    pub fn with_cfg(time_source: Weak<dyn TimeSource>, cfg: DispatcherCfg) -> Result<Self> {
        let inner = Arc::new(Inner {
            time_source,
            queue: Mutex::new(Queue::default()),
            queue_cv: Condvar::new(),
            attached: Mutex::new(HashSet::new()),
            running: Mutex::new(None),
            running_cv: Condvar::new(),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<ThreadId>(1);
        let worker_inner = inner.clone();
        let handle = thread::Builder::new()
            .name(cfg.thread_name.clone())
            .spawn(move || {
                if ready_tx.send(thread::current().id()).is_err() {
                    return;
                }
                drop(ready_tx);
                worker_inner.run_worker();
            })?;

        let Ok(worker_thread) = ready_rx.recv() else {
            handle.join().ok();
            return Err(Error::WorkerStartup);
        };

        let dispatcher = Self {
            inner,
            worker: Mutex::new(Some(handle)),
            worker_thread,
            object_id: ObjectId::new(),
        };
        dispatcher.attach(&dispatcher.object_id);
        debug!(thread = %cfg.thread_name, "dispatcher_started");
        Ok(dispatcher)
    }

    /// Allow entries tagged with `id` to run. Idempotent.
    pub fn attach(&self, id: &ObjectId) {
        self.inner.attached.lock().insert(id.value());
        trace!(owner = %id.value(), "dispatcher_attach");
    }

    /// Whether `id` is currently attached.
    pub fn attached(&self, id: &ObjectId) -> bool {
        self.inner.is_attached(id.value())
    }

    /// Whether the value of an id is currently attached.
    pub(crate) fn attached_value(&self, owner: ObjectIdValue) -> bool {
        self.inner.is_attached(owner)
    }

    /// Stop running entries for `id` and drop the ones still queued.
    ///
    /// Returns `false` if `id` was not attached. When called from any thread other than
    /// the worker, this blocks until an in-flight entry owned by `id` has returned.
    pub fn detach(&self, id: &ObjectId) -> bool {
        let owner = id.value();
        if !self.inner.attached.lock().remove(&owner) {
            return false;
        }

        let dropped = self.inner.queue.lock().remove_owner(owner);
        trace!(owner = %owner, dropped = dropped.len(), "dispatcher_detach");
        drop(dropped);

        if !self.is_worker_thread() {
            let mut running = self.inner.running.lock();
            while *running == Some(owner) {
                self.inner.running_cv.wait(&mut running);
            }
        }
        true
    }

    /// Detach `id`, then run `cleanup` on the worker thread.
    ///
    /// From the worker, `cleanup` runs inline. From any other thread it is queued ahead
    /// of all pending work and this call blocks until it has run. Nothing happens if
    /// `id` was not attached, and `cleanup` is skipped once the dispatcher is
    /// terminating. `cleanup` must not wait on the worker thread.
    pub fn detach_with<F>(&self, id: &ObjectId, cleanup: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.detach(id) {
            return false;
        }

        if self.inner.queue.lock().exit {
            trace!(owner = %id.value(), "dispatcher_detach_cleanup_skipped");
            return true;
        }

        if self.is_worker_thread() {
            cleanup();
            return true;
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        self.push(
            self.object_id.value(),
            When::Detached,
            Box::new(move || {
                cleanup();
                done_tx.send(()).ok();
            }),
        );
        // A disconnect means the worker exited and dropped the cleanup unexecuted.
        if done_rx.recv().is_err() {
            debug!(owner = %id.value(), "dispatcher_detach_cleanup_discarded");
        }
        true
    }

    /// Whether the calling thread is this dispatcher's worker.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_thread
    }

    /// Queue `f` for `id`, due immediately.
    ///
    /// Never blocks. If `id` is detached by the time the worker reaches the entry, the
    /// entry is dropped without running.
    pub fn enqueue<F>(&self, id: &ObjectId, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(id.value(), When::Immediately, Box::new(f));
    }

    /// Queue `f` for `id`, due once the time source reads at least `when`.
    pub fn enqueue_at<F>(&self, id: &ObjectId, f: F, when: TimePoint)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(id.value(), When::At(when), Box::new(f));
    }

    /// Insert a prepared job and wake the worker.
    pub(crate) fn push(&self, owner: ObjectIdValue, when: When, job: Job) {
        {
            let mut queue = self.inner.queue.lock();
            if !queue.exit {
                queue.push(owner, when, job);
                trace!(owner = %owner, ?when, pending = queue.len(), "dispatcher_enqueue");
                drop(queue);
                self.inner.queue_cv.notify_one();
                return;
            }
        }
        trace!(owner = %owner, "dispatcher_enqueue_after_terminate");
    }

    /// Wake the worker so it re-reads the time source.
    ///
    /// Needed after moving a [`PseudoTimeSource`](crate::PseudoTimeSource) when nothing
    /// else is enqueued.
    pub fn invoke(&self) {
        // Taking the lock orders this wake-up after any in-progress due-time check.
        drop(self.inner.queue.lock());
        self.inner.queue_cv.notify_all();
    }

    /// Current reading of the time source, or [`TimePoint::ZERO`] once it is gone.
    pub fn when_now(&self) -> TimePoint {
        self.inner.now().unwrap_or(TimePoint::ZERO)
    }

    /// Stop the worker and join it. Queued entries are dropped without running.
    ///
    /// Idempotent. Calling this from the worker thread would deadlock and aborts the
    /// process instead.
    pub fn terminate(&self) {
        if self.is_worker_thread() {
            fatal::contract_violation("Dispatcher::terminate called on its worker thread");
        }

        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };
        self.signal_exit();
        if handle.join().is_err() {
            error!("dispatcher_worker_panicked");
        }
        debug!("dispatcher_terminated");
    }

    /// Set the exit flag and wake the worker.
    fn signal_exit(&self) {
        self.inner.queue.lock().exit = true;
        self.inner.queue_cv.notify_all();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let Some(handle) = self.worker.get_mut().take() else {
            return;
        };
        error!("dispatcher_dropped_without_terminate");
        self.signal_exit();
        if self.is_worker_thread() {
            // The worker finishes the current entry and exits on its own.
            drop(handle);
        } else if handle.join().is_err() {
            error!("dispatcher_worker_panicked");
        }
    }
}
