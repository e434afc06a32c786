//! Process and thread identity.

use crate::sys;

/// Host process id truncated to 32 bits
///
/// Not unique across hosts and not meant for signalling.
pub fn process_id() -> u32 {
    std::process::id()
}

/// Id of the calling kernel thread
///
/// Stable for the thread's lifetime and distinct from every other live
/// thread of this process. Uses the native thread id where the host has
/// one and falls back to the pthread handle.
pub fn thread_id() -> u32 {
    sys::thread_id()
}
