//! Lifecycle of the process-wide dispatcher; a single test because the state is global.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::bounded;
use remap_dispatcher::{DispatcherClient, Timer, shared};

#[test]
fn initialize_use_and_terminate() {
    assert!(shared::get_dispatcher().is_none());
    assert!(shared::get_time_source().is_none());

    shared::initialize().expect("initialize");
    let first = shared::get_dispatcher().expect("dispatcher after initialize");
    shared::initialize().expect("second initialize");
    let second = shared::get_dispatcher().expect("dispatcher after second initialize");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(shared::get_time_source().is_some());
    drop(second);

    // Clients default to the shared dispatcher.
    let client = DispatcherClient::new(None);
    assert!(client.attached());
    let timer = Timer::new(&client);
    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded(4);
    let f = fired.clone();
    timer.start(
        move || {
            f.fetch_add(1, Ordering::SeqCst);
            tx.try_send(()).ok();
        },
        Duration::from_millis(5),
    );
    rx.recv_timeout(Duration::from_secs(5)).expect("first heartbeat");
    rx.recv_timeout(Duration::from_secs(5)).expect("second heartbeat");

    let (stopped_tx, stopped_rx) = bounded(1);
    let t = Arc::new(timer);
    let tt = t.clone();
    let dd = first.clone();
    client.detach_from_dispatcher_with(move || {
        tt.stop();
        stopped_tx.send(dd.is_worker_thread()).ok();
    });
    assert!(stopped_rx.recv().expect("cleanup ran"));
    assert!(!t.enabled());
    assert!(fired.load(Ordering::SeqCst) >= 2);
    drop(t);
    drop(first);

    shared::terminate();
    shared::terminate();
    assert!(shared::get_dispatcher().is_none());
    assert!(shared::get_time_source().is_none());

    // With nothing initialized a client is inert.
    let orphan = DispatcherClient::new(None);
    assert!(!orphan.attached());
    orphan.enqueue_to_dispatcher(|| unreachable!("no dispatcher"));
}
