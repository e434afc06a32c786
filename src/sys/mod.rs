//! Host primitives. Exactly one backend is compiled in; the rest of the
//! crate only sees the `pub(crate)` surface re-exported here.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use self::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::*;
