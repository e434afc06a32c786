use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;

use lumoport::sysinfo::{page_size, physical_memory_size};
use lumoport::{active_cpu_count, is_absolute_path, max_process_data_size, process_id, thread_id};

#[test]
fn test_process_id_is_stable() {
    assert_eq!(process_id(), process_id());
    assert_eq!(process_id(), std::process::id());
}

#[test]
fn test_thread_ids_are_distinct() {
    let main_id = thread_id();
    assert_eq!(main_id, thread_id());

    let (tx, rx) = mpsc::channel();
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let tx = tx.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let id = thread_id();
                // Keep every worker alive until all have reported
                barrier.wait();
                tx.send((id, process_id())).unwrap();
            })
        })
        .collect();
    drop(tx);
    for w in workers {
        w.join().unwrap();
    }

    let mut ids = HashSet::new();
    for (id, pid) in rx {
        assert_eq!(pid, process_id());
        assert_ne!(id, main_id);
        ids.insert(id);
    }
    assert_eq!(ids.len(), 4);
}

#[test]
fn test_host_limits() {
    assert!(active_cpu_count() >= 1);

    let page = page_size();
    assert!(page >= 4096);
    assert!(page.is_power_of_two());

    assert!(physical_memory_size().unwrap() > 0);

    let data = max_process_data_size();
    assert!(data > 0);
    #[cfg(target_pointer_width = "64")]
    assert!(data > 1 << 32);
}

#[test]
fn test_absolute_paths() {
    if cfg!(windows) {
        assert!(is_absolute_path("C:\\data\\x.db"));
        assert!(is_absolute_path("\\\\server\\share"));
        assert!(!is_absolute_path("data\\x.db"));
    } else {
        assert!(is_absolute_path("/var/lib/x.db"));
        assert!(!is_absolute_path("var/lib/x.db"));
    }
    assert!(is_absolute_path(std::env::temp_dir()));
}
