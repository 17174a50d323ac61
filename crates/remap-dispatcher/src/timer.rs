//! Repeating callbacks driven by a dispatcher.
//!
//! A timer never sleeps. Each firing re-enqueues the next one at `now + interval`
//! under the owner's id, so detaching the owner cancels it like any other work. A
//! generation counter, bumped on every start and stop, makes reschedules left over
//! from an earlier period fall through without firing.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    Dispatcher, DispatcherClient, ObjectIdValue,
    dispatcher::{Job, When},
    fatal,
};

/// Callback shared between the timer state and in-flight firings.
type Callback = Arc<Mutex<Box<dyn FnMut() + Send>>>;

/// Mutable timer state; only written on the worker thread.
#[derive(Default)]
struct TimerState {
    /// Bumped on every start and stop.
    generation: u64,
    /// Installed callback, if running.
    callback: Option<Callback>,
    /// Delay between firings.
    interval: Duration,
}

/// Repeating callback scheduled on its owner's dispatcher.
///
/// The timer borrows its owner's [`DispatcherClient`] identity. The owner must detach
/// before the timer is dropped; dropping a timer whose owner is still attached aborts.
pub struct Timer {
    /// Dispatcher of the owning client.
    dispatcher: Weak<Dispatcher>,
    /// Id value of the owning client.
    owner: ObjectIdValue,
    /// Shared with scheduled firings.
    state: Arc<Mutex<TimerState>>,
}

impl Timer {
    /// Create an idle timer that schedules through `owner`.
    pub fn new(owner: &DispatcherClient) -> Self {
        Self {
            dispatcher: owner.weak_dispatcher(),
            owner: owner.object_id().value(),
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    /// Fire `callback` now and then every `interval`, replacing any previous schedule.
    pub fn start<F>(&self, callback: F, interval: Duration)
    where
        F: FnMut() + Send + 'static,
    {
        let callback: Callback = Arc::new(Mutex::new(Box::new(callback)));
        let state = self.state.clone();
        let dispatcher = self.dispatcher.clone();
        let owner = self.owner;
        self.push(Box::new(move || {
            let generation = {
                let mut s = state.lock();
                s.generation += 1;
                s.callback = Some(callback);
                s.interval = interval;
                s.generation
            };
            trace!(owner = %owner, generation, interval_ms = interval.as_millis(), "timer_start");
            fire(&dispatcher, owner, &state, generation);
        }));
    }

    /// Cancel the schedule.
    ///
    /// On the worker thread this takes effect immediately; elsewhere it is queued ahead
    /// of pending firings.
    pub fn stop(&self) {
        let stop = stop_job(self.state.clone(), self.owner);
        match self.dispatcher.upgrade() {
            Some(d) if d.is_worker_thread() => stop(),
            Some(d) => d.push(self.owner, When::Immediately, stop),
            None => {}
        }
    }

    /// Whether a callback is currently installed.
    ///
    /// Reflects the worker's view: a `start` or `stop` issued off the worker shows up
    /// here only once the worker has run it.
    pub fn enabled(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// Queue `job` under the owner's id, due immediately.
    fn push(&self, job: Job) {
        if let Some(d) = self.dispatcher.upgrade() {
            d.push(self.owner, When::Immediately, job);
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(d) = self.dispatcher.upgrade()
            && d.attached_value(self.owner)
        {
            fatal::contract_violation("Timer dropped while its owner is attached");
        }
    }
}

/// Build the job that clears the schedule.
fn stop_job(state: Arc<Mutex<TimerState>>, owner: ObjectIdValue) -> Job {
    Box::new(move || {
        let mut s = state.lock();
        s.generation += 1;
        s.callback = None;
        s.interval = Duration::ZERO;
        trace!(owner = %owner, generation = s.generation, "timer_stop");
    })
}

/// Run one firing of `generation` and schedule the next.
fn fire(
    dispatcher: &Weak<Dispatcher>,
    owner: ObjectIdValue,
    state: &Arc<Mutex<TimerState>>,
    generation: u64,
) {
    let (callback, interval) = {
        let s = state.lock();
        if s.generation != generation {
            trace!(owner = %owner, generation, current = s.generation, "timer_stale_fire");
            return;
        }
        match &s.callback {
            Some(cb) => (cb.clone(), s.interval),
            None => return,
        }
    };

    {
        let mut f = callback.lock();
        (*f)();
    }

    let Some(d) = dispatcher.upgrade() else {
        return;
    };
    let next = d.when_now() + interval;
    let weak = dispatcher.clone();
    let state = state.clone();
    d.push(
        owner,
        When::At(next),
        Box::new(move || fire(&weak, owner, &state, generation)),
    );
}
