#![cfg(all(unix, target_pointer_width = "64"))]

use lumoport::max_process_data_size;

// Changes a process-wide limit, so this binary holds one test
#[test]
fn test_low_soft_data_limit_keeps_64bit_bound() {
    let mut saved: libc::rlimit = unsafe { std::mem::zeroed() };
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_DATA, &mut saved) }, 0);

    let lowered = libc::rlimit {
        rlim_cur: 1 << 30,
        rlim_max: saved.rlim_max,
    };
    if saved.rlim_max != libc::RLIM_INFINITY && saved.rlim_max < lowered.rlim_cur {
        return;
    }
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_DATA, &lowered) }, 0);

    let size = max_process_data_size();
    unsafe { libc::setrlimit(libc::RLIMIT_DATA, &saved) };

    assert!(size > 1 << 32, "64-bit host reported {}", size);
}
