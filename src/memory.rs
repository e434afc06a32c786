use std::alloc::{self, Layout};
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use memmap2::MmapMut;

use crate::constants::ALLOC_ALIGN;
use crate::error::{Error, ErrorKind, Result};
use crate::sys;

static LIVE_BLOCKS: AtomicUsize = AtomicUsize::new(0);
static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static TOTAL_ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Allocator statistics for the whole process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub total_allocations: u64,
}

pub fn alloc_stats() -> AllocStats {
    AllocStats {
        live_blocks: LIVE_BLOCKS.load(Ordering::Relaxed),
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        total_allocations: TOTAL_ALLOCATIONS.load(Ordering::Relaxed),
    }
}

fn layout_for(len: usize) -> Result<Layout> {
    // Zero-byte requests still get a distinct block
    Layout::from_size_align(len.max(1), ALLOC_ALIGN)
        .map_err(|_| Error::new(ErrorKind::OutOfMemory, "allocation size overflows"))
}

/// Uninitialized heap storage owned by the caller
#[derive(Debug)]
pub struct RawBlock {
    ptr: NonNull<u8>,
    len: usize,
}

// The block is plain bytes with a unique owner
unsafe impl Send for RawBlock {}
unsafe impl Sync for RawBlock {}

impl RawBlock {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// View the storage; contents are uninitialized until written
    pub fn as_uninit_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut MaybeUninit<u8>, self.len) }
    }

    /// Fill with `byte` and return the now-initialized bytes
    pub fn fill(&mut self, byte: u8) -> &mut [u8] {
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr(), byte, self.len);
            std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
        }
    }

    /// Resize to `len` bytes, keeping the common prefix
    ///
    /// On failure the block is left exactly as it was.
    pub fn reallocate(&mut self, len: usize) -> Result<()> {
        let old = layout_for(self.len)?;
        let new = layout_for(len)?;

        let ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), old, new.size()) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            Error::new(ErrorKind::OutOfMemory, format!("reallocate to {} bytes", len))
        })?;

        LIVE_BYTES.fetch_add(len, Ordering::Relaxed);
        LIVE_BYTES.fetch_sub(self.len, Ordering::Relaxed);
        self.ptr = ptr;
        self.len = len;
        Ok(())
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        if let Ok(layout) = layout_for(self.len) {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
        LIVE_BLOCKS.fetch_sub(1, Ordering::Relaxed);
        LIVE_BYTES.fetch_sub(self.len, Ordering::Relaxed);
    }
}

/// Allocate at least `len` bytes of uninitialized storage
pub fn allocate(len: usize) -> Result<RawBlock> {
    let layout = layout_for(len)?;
    let ptr = unsafe { alloc::alloc(layout) };
    let ptr = NonNull::new(ptr)
        .ok_or_else(|| Error::new(ErrorKind::OutOfMemory, format!("allocate {} bytes", len)))?;

    LIVE_BLOCKS.fetch_add(1, Ordering::Relaxed);
    LIVE_BYTES.fetch_add(len, Ordering::Relaxed);
    TOTAL_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    Ok(RawBlock { ptr, len })
}

/// Resize `block`; on failure the block is untouched and still owned
pub fn reallocate(block: &mut RawBlock, len: usize) -> Result<()> {
    block.reallocate(len)
}

/// Release a block; `None` is a no-op
pub fn free(block: Option<RawBlock>) {
    drop(block)
}

/// Ask the host to keep all current and future pages resident
///
/// Returns `Unsupported` where the host cannot pin pages; callers should
/// treat any failure as advisory.
pub fn mem_lock_all() -> Result<()> {
    sys::mem_lock_all().map_err(|err| Error::from_io(err, "mem_lock_all"))
}

/// Drop a previous `mem_lock_all` request
pub fn mem_unlock_all() -> Result<()> {
    sys::mem_unlock_all().map_err(|err| Error::from_io(err, "mem_unlock_all"))
}

/// Anonymous zeroed mapping pinned in RAM for its whole lifetime
#[derive(Debug)]
pub struct PinnedBuffer {
    map: MmapMut,
}

impl PinnedBuffer {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::invalid("pinned buffer must not be empty"));
        }

        let map = MmapMut::map_anon(len).map_err(|err| Error::from_io(err, "map pinned buffer"))?;
        sys::lock_region(map.as_ptr(), map.len())
            .map_err(|err| Error::from_io(err, "lock pinned buffer"))?;
        Ok(PinnedBuffer { map })
    }
}

impl Deref for PinnedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

impl DerefMut for PinnedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl Drop for PinnedBuffer {
    fn drop(&mut self) {
        // Unmapping releases the lock anyway
        let _ = sys::unlock_region(self.map.as_ptr(), self.map.len());
    }
}
