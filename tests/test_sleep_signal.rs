#![cfg(unix)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lumoport::{now_monotonic, sleep_us, time_diff};

static ALARMS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn on_alarm(_: libc::c_int) {
    ALARMS.fetch_add(1, Ordering::SeqCst);
}

// Installs a process-wide handler, so this binary holds one test
#[test]
fn test_sleep_outlasts_repeated_signals() {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = on_alarm as extern "C" fn(libc::c_int) as usize;
    // No SA_RESTART, so every delivery interrupts the sleep
    action.sa_flags = 0;
    let mut previous: libc::sigaction = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(libc::sigaction(libc::SIGALRM, &action, &mut previous), 0);
    }

    let sleeper = unsafe { libc::pthread_self() } as usize;
    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                unsafe { libc::pthread_kill(sleeper as libc::pthread_t, libc::SIGALRM) };
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let start = now_monotonic();
    sleep_us(200_000);
    let elapsed = time_diff(now_monotonic(), start);

    stop.store(true, Ordering::SeqCst);
    ticker.join().unwrap();
    unsafe { libc::sigaction(libc::SIGALRM, &previous, std::ptr::null_mut()) };

    assert!(elapsed.as_micros() >= 200_000, "slept only {:?}", elapsed);
    assert!(ALARMS.load(Ordering::SeqCst) > 0);
}
