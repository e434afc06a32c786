use lumoport::memory::alloc_stats;
use lumoport::{allocate, free, mem_lock_all, mem_unlock_all, reallocate, ErrorKind, PinnedBuffer};

#[test]
fn test_allocate_and_fill() {
    let before = alloc_stats().total_allocations;

    let mut block = allocate(4096).unwrap();
    assert_eq!(block.len(), 4096);
    assert_eq!(block.as_ptr() as usize % 16, 0);

    let bytes = block.fill(0xab);
    assert!(bytes.iter().all(|&b| b == 0xab));
    assert!(alloc_stats().total_allocations > before);

    free(Some(block));
    free(None);
}

#[test]
fn test_zero_length_allocation() {
    let a = allocate(0).unwrap();
    let b = allocate(0).unwrap();
    assert!(a.is_empty());
    assert_ne!(a.as_ptr(), b.as_ptr());
}

#[test]
fn test_reallocate_preserves_prefix() {
    let mut block = allocate(64).unwrap();
    for (i, b) in block.fill(0).iter_mut().enumerate() {
        *b = i as u8;
    }

    reallocate(&mut block, 1 << 16).unwrap();
    assert_eq!(block.len(), 1 << 16);
    let prefix = unsafe { std::slice::from_raw_parts(block.as_ptr(), 64) };
    assert!(prefix.iter().enumerate().all(|(i, &b)| b == i as u8));

    reallocate(&mut block, 16).unwrap();
    let prefix = unsafe { std::slice::from_raw_parts(block.as_ptr(), 16) };
    assert!(prefix.iter().enumerate().all(|(i, &b)| b == i as u8));
}

#[test]
fn test_oversized_request_keeps_block() {
    let mut block = allocate(32).unwrap();
    block.fill(7);

    let err = reallocate(&mut block, usize::MAX).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    assert_eq!(block.len(), 32);
    let kept = unsafe { std::slice::from_raw_parts(block.as_ptr(), 32) };
    assert!(kept.iter().all(|&b| b == 7));

    assert_eq!(allocate(usize::MAX).unwrap_err().kind(), ErrorKind::OutOfMemory);
}

#[test]
fn test_mem_lock_all_is_advisory() {
    // Unprivileged hosts may refuse; refusal must come back as an error
    match mem_lock_all() {
        Ok(()) => mem_unlock_all().unwrap(),
        Err(e) => assert!(matches!(
            e.kind(),
            ErrorKind::PermissionDenied
                | ErrorKind::OutOfMemory
                | ErrorKind::WouldBlock
                | ErrorKind::Unsupported
        )),
    }
}

#[test]
fn test_pinned_buffer() {
    assert_eq!(PinnedBuffer::new(0).unwrap_err().kind(), ErrorKind::InvalidArgument);

    match PinnedBuffer::new(8192) {
        Ok(mut buf) => {
            assert_eq!(buf.len(), 8192);
            assert!(buf.iter().all(|&b| b == 0));
            buf[100] = 1;
            assert_eq!(buf[100], 1);
        }
        // RLIMIT_MEMLOCK may be tiny
        Err(e) => assert!(matches!(
            e.kind(),
            ErrorKind::PermissionDenied | ErrorKind::OutOfMemory | ErrorKind::WouldBlock
        )),
    }
}
