//! A minimal dispatcher collaborator: a timer that counts its own firings.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use remap_dispatcher::{Dispatcher, DispatcherClient, Timer};
use tracing::{debug, info};

/// Periodic heartbeat scheduled on a dispatcher.
pub struct Heartbeat {
    /// Dispatcher identity for this collaborator.
    client: DispatcherClient,
    /// Drives the beats; stopped during teardown.
    timer: Arc<Timer>,
    /// Number of beats so far.
    beats: Arc<AtomicU64>,
}

impl Heartbeat {
    /// Create a heartbeat on `dispatcher`, or on the shared dispatcher when `None`.
    pub fn new(dispatcher: Option<&Arc<Dispatcher>>) -> Self {
        let client = DispatcherClient::new(dispatcher);
        let timer = Arc::new(Timer::new(&client));
        Self {
            client,
            timer,
            beats: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start beating every `interval`.
    pub fn start(&self, interval: Duration) {
        let beats = self.beats.clone();
        self.timer.start(
            move || {
                let n = beats.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(beat = n, "heartbeat");
            },
            interval,
        );
        info!(interval_ms = interval.as_millis(), "heartbeat_started");
    }

    /// Number of beats so far.
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        let timer = self.timer.clone();
        self.client
            .detach_from_dispatcher_with(move || timer.stop());
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use remap_dispatcher::PseudoTimeSource;

    use super::*;

    /// Block until every entry due at the clock's current reading has run.
    fn flush(hb: &Heartbeat) {
        let (tx, rx) = bounded(1);
        hb.client.enqueue_to_dispatcher_at(
            move || {
                tx.send(()).ok();
            },
            hb.client.when_now(),
        );
        rx.recv_timeout(Duration::from_secs(5)).expect("flush");
    }

    #[test]
    fn beats_follow_the_clock() {
        let clock = Arc::new(PseudoTimeSource::new());
        let d = Arc::new(Dispatcher::new(&clock).expect("dispatcher"));
        let hb = Heartbeat::new(Some(&d));
        hb.start(Duration::from_millis(10));
        flush(&hb);
        assert_eq!(hb.beats(), 1);

        for n in 2..=4 {
            clock.advance(Duration::from_millis(10));
            flush(&hb);
            assert_eq!(hb.beats(), n);
        }

        // Half an interval is not enough for another beat.
        clock.advance(Duration::from_millis(5));
        flush(&hb);
        assert_eq!(hb.beats(), 4);

        drop(hb);
        d.terminate();
    }
}
