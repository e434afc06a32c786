#![cfg(unix)]

use lumoport::{ErrorKind, FileHandle, OpenFlags};
use tempfile::TempDir;

const CHILD_SAW_WOULD_BLOCK: i32 = 0;
const CHILD_GOT_LOCK: i32 = 1;
const CHILD_FAILED: i32 = 2;

/// Try byte `offset` from a forked child and return its verdict
///
/// The child only issues the lock call on a descriptor opened by the
/// parent, then leaves with `_exit`.
fn probe_in_child(probe: &FileHandle, offset: u64) -> i32 {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed");
        if pid == 0 {
            let code = match probe.lock_byte_range(offset, true, true) {
                Ok(()) => CHILD_GOT_LOCK,
                Err(e) if e.kind() == ErrorKind::WouldBlock => CHILD_SAW_WOULD_BLOCK,
                Err(_) => CHILD_FAILED,
            };
            libc::_exit(code);
        }

        let mut status = 0;
        let rc = libc::waitpid(pid, &mut status, 0);
        assert_eq!(rc, pid);
        assert!(libc::WIFEXITED(status));
        libc::WEXITSTATUS(status)
    }
}

// One test per binary: fork is only safe while no other test thread runs
#[test]
fn test_lock_conflicts_across_processes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lock.mdb");

    let mut h = FileHandle::open(&path, OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644).unwrap();
    let mut probe = FileHandle::open(&path, OpenFlags::READ_WRITE, 0).unwrap();

    h.lock_byte_range(0, true, false).unwrap();
    assert_eq!(probe_in_child(&probe, 0), CHILD_SAW_WOULD_BLOCK);

    // Other bytes stay free
    assert_eq!(probe_in_child(&probe, 1), CHILD_GOT_LOCK);

    // Once released the other process can take it
    h.lock_byte_range(0, false, false).unwrap();
    assert_eq!(probe_in_child(&probe, 0), CHILD_GOT_LOCK);

    probe.close().unwrap();
    h.close().unwrap();
}
