//! Timer firing count: `run_every(100ms, 5, fn)` fires `fn` exactly 5 times
//! and `on_finish` exactly once.

mod util;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use revio::reactor::{Reactor, ReactorConfig};

#[test]
fn timer_fires_exact_repetition_count_then_on_finish() {
    util::init();

    let reactor = assert_ok!(Reactor::new(ReactorConfig::new()));
    let run_reactor = Arc::clone(&reactor);
    let handle = std::thread::spawn(move || {
        let _ = run_reactor.start(|| Ok(()));
    });

    // Let the cycle thread start polling before scheduling the timer so its
    // first due-tick sample reflects a running loop.
    std::thread::sleep(Duration::from_millis(20));

    let fires = Arc::new(AtomicUsize::new(0));
    let finishes = Arc::new(AtomicUsize::new(0));

    {
        let fires = Arc::clone(&fires);
        let finishes = Arc::clone(&finishes);
        reactor.run_every(
            Duration::from_millis(100),
            5,
            move || {
                fires.fetch_add(1, Ordering::SeqCst);
            },
            Some(move || {
                finishes.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    // 5 repetitions at 100ms plus slack for scheduling jitter across real
    // threads (unlike the unit-level TimerWheel tests, this scenario drives
    // an actual cycle thread against the wall clock).
    std::thread::sleep(Duration::from_millis(900));

    assert_eq!(fires.load(Ordering::SeqCst), 5);
    assert_eq!(finishes.load(Ordering::SeqCst), 1);

    reactor.stop();
    handle.join().unwrap();
}
