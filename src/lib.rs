//! Portable OS layer for page-oriented storage engines.
//!
//! File I/O, clocks, identity, memory, random numbers, directory listing
//! and host queries with the same semantics on POSIX and Windows hosts.

pub mod constants;
pub mod diag;
pub mod dir;
pub mod endian;
pub mod error;
pub mod file;
pub mod ident;
pub mod memfs;
pub mod memory;
pub mod random;
pub mod sysinfo;
pub mod time;
pub mod types;

mod sys;

pub use constants::OpenFlags;
pub use diag::{set_diagnostic_sink, DiagnosticSink};
pub use dir::{open_directory, DirectoryCursor};
pub use error::{Error, ErrorKind, Result};
pub use file::{create_dir, exists, filesystem_sizes, rename, unlink, BackendKind, FileHandle};
pub use ident::{process_id, thread_id};
pub use memfs::{FaultOp, MemFs};
pub use memory::{allocate, free, mem_lock_all, mem_unlock_all, reallocate, PinnedBuffer, RawBlock};
pub use random::{rand, rand_r, seed};
pub use sysinfo::{active_cpu_count, is_absolute_path, max_process_data_size};
pub use time::{now_monotonic, now_wall, sleep_us, time_diff};
pub use types::{FileId, FsSizes, HandleState, TimeSpec};
