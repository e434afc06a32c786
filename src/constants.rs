use bitflags::bitflags;
use lazy_static::lazy_static;

// File open flags
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const READ = 0x01;
        const WRITE = 0x02;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        const CREATE = 0x04;
        const CREATE_EXCLUSIVE = 0x08;
        const TRUNCATE = 0x10;
        const APPEND = 0x20;
        /// Only meaningful on hosts that distinguish text and binary streams
        const BINARY = 0x40;
    }
}

lazy_static! {
    /// Flags that select the access mode of a handle
    pub(crate) static ref ACCESS_MODES: OpenFlags = OpenFlags::READ | OpenFlags::WRITE;
    /// Flags that require write access; creation does not
    pub(crate) static ref WRITE_ONLY_MODES: OpenFlags = OpenFlags::TRUNCATE | OpenFlags::APPEND;
}

/// Permission bits accepted by `open` and `create_dir`
pub const PERMISSION_MASK: u32 = 0o7777;
/// Owner read permission
pub const OWNER_READ: u32 = 0o400;
/// Owner write permission
pub const OWNER_WRITE: u32 = 0o200;

/// Offset between 1601-01-01 and 1970-01-01 in 100ns units
pub const FILETIME_EPOCH_OFFSET: u64 = 116_444_736_000_000_000;
/// 100ns ticks per second
pub const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;
pub const NANOS_PER_SEC: u32 = 1_000_000_000;
pub const NANOS_PER_MICRO: u32 = 1_000;
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// LCG multiplier
pub const RAND_MULTIPLIER: u32 = 1_103_515_245;
/// LCG increment
pub const RAND_INCREMENT: u32 = 12_345;
/// Exclusive upper bound of a single draw
pub const RAND_MAX_EXCLUSIVE: u32 = 32_768;
/// State used when `seed` was never called
pub const RAND_DEFAULT_SEED: u32 = 1;

/// Environment variable that overrides `active_cpu_count`
pub const NCPUS_OVERRIDE_VAR: &str = "NCPUS_OVERRIDE";

/// Alignment of blocks handed out by `allocate`
pub const ALLOC_ALIGN: usize = 16;

/// Conservative data-size bound when the host reports no limit
#[cfg(target_pointer_width = "64")]
pub const DEFAULT_MAX_DATA_SIZE: u64 = 1 << 46;
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_MAX_DATA_SIZE: u64 = 1 << 31;

/// Capacity of a `MemFs` built with `Default`
pub const DEFAULT_MEMFS_CAPACITY: u64 = 1 << 30;
