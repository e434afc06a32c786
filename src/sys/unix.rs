use std::ffi::CString;
use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileExt, MetadataExt, OpenOptionsExt};
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::Path;

use crate::constants::{OpenFlags, DEFAULT_MAX_DATA_SIZE};
use crate::error::{retry_interrupted, ErrorKind};
use crate::types::{FileId, FsSizes, TimeSpec};

/// Map an errno value to its portable kind
pub(crate) fn kind_from_code(code: i32) -> Option<ErrorKind> {
    let kind = match code {
        libc::ENOENT | libc::ENOTDIR => ErrorKind::NotFound,
        libc::EEXIST | libc::ENOTEMPTY => ErrorKind::Exists,
        libc::EACCES | libc::EPERM | libc::EROFS => ErrorKind::PermissionDenied,
        libc::EINVAL | libc::ENAMETOOLONG | libc::EISDIR | libc::ELOOP | libc::EFBIG => {
            ErrorKind::InvalidArgument
        }
        libc::EIO | libc::ENXIO => ErrorKind::IoError,
        libc::ENOSPC | libc::EDQUOT => ErrorKind::NoSpace,
        libc::EBUSY | libc::ETXTBSY | libc::EDEADLK => ErrorKind::Busy,
        libc::EINTR => ErrorKind::Interrupted,
        libc::EAGAIN => ErrorKind::WouldBlock,
        c if c == libc::EWOULDBLOCK => ErrorKind::WouldBlock,
        libc::ENOSYS | libc::ENOTSUP | libc::EXDEV => ErrorKind::Unsupported,
        c if c == libc::EOPNOTSUPP => ErrorKind::Unsupported,
        libc::EMFILE | libc::ENFILE => ErrorKind::TooManyOpenFiles,
        libc::EBADF => ErrorKind::BadHandle,
        libc::ENOMEM => ErrorKind::OutOfMemory,
        libc::EFAULT => ErrorKind::Fatal,
        _ => return None,
    };
    Some(kind)
}

/// EINTR is the only interruption a POSIX host reports
pub(crate) fn is_interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

fn cvt(rc: libc::c_int) -> io::Result<()> {
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))
}

/// Native descriptor backing a `FileHandle`
#[derive(Debug)]
pub(crate) struct HostFile {
    file: File,
}

impl HostFile {
    pub(crate) fn open(path: &Path, flags: OpenFlags, perms: u32) -> io::Result<HostFile> {
        let writable = flags.contains(OpenFlags::WRITE);
        let mut options = OpenOptions::new();
        options
            .read(flags.contains(OpenFlags::READ))
            .write(writable)
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNCATE))
            .mode(perms);
        if writable {
            options
                .create(flags.contains(OpenFlags::CREATE))
                .create_new(flags.contains(OpenFlags::CREATE_EXCLUSIVE));
        } else {
            // std refuses to create through a read-only request; O_RDONLY|O_CREAT is legal
            let mut create = 0;
            if flags.contains(OpenFlags::CREATE) {
                create |= libc::O_CREAT;
            }
            if flags.contains(OpenFlags::CREATE_EXCLUSIVE) {
                create |= libc::O_CREAT | libc::O_EXCL;
            }
            options.custom_flags(create);
        }

        let file = retry_interrupted(|| options.open(path))?;
        Ok(HostFile { file })
    }

    pub(crate) fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        retry_interrupted(|| self.file.read_at(buf, offset))
    }

    pub(crate) fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        retry_interrupted(|| self.file.write_at(buf, offset))
    }

    pub(crate) fn sync(&self) -> io::Result<()> {
        retry_interrupted(|| self.file.sync_all())
    }

    /// ftruncate zero-fills any extension on every supported kernel
    pub(crate) fn set_len(&self, len: u64) -> io::Result<()> {
        retry_interrupted(|| self.file.set_len(len))
    }

    pub(crate) fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub(crate) fn file_id(&self) -> io::Result<FileId> {
        let meta = self.file.metadata()?;
        Ok(FileId::new(meta.dev(), meta.ino()))
    }

    /// Exclusive fcntl record lock on one byte
    pub(crate) fn lock_byte(&self, offset: u64, acquire: bool, nowait: bool) -> io::Result<()> {
        let mut lock: libc::flock = unsafe { mem::zeroed() };
        lock.l_type = (if acquire { libc::F_WRLCK } else { libc::F_UNLCK }) as libc::c_short;
        lock.l_whence = libc::SEEK_SET as libc::c_short;
        lock.l_start = offset as libc::off_t;
        lock.l_len = 1;

        let cmd = if acquire && !nowait {
            libc::F_SETLKW
        } else {
            libc::F_SETLK
        };
        let fd = self.file.as_raw_fd();

        retry_interrupted(|| cvt(unsafe { libc::fcntl(fd, cmd, &lock as *const libc::flock) }))
            .map_err(|err| match err.raw_os_error() {
                // POSIX allows either code for a conflicting F_SETLK
                Some(libc::EAGAIN) | Some(libc::EACCES) => {
                    io::Error::new(io::ErrorKind::WouldBlock, "byte range held by another process")
                }
                _ => err,
            })
    }

    /// Release the descriptor, reporting what the kernel says
    ///
    /// The descriptor is gone even when close reports EINTR, so that
    /// case is not retried.
    pub(crate) fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        match cvt(unsafe { libc::close(fd) }) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(()),
            other => other,
        }
    }
}

pub(crate) fn create_dir(path: &Path, perms: u32) -> io::Result<()> {
    retry_interrupted(|| DirBuilder::new().mode(perms).create(path))
}

pub(crate) fn fs_sizes(path: &Path) -> io::Result<FsSizes> {
    let cpath = c_path(path)?;
    let mut st: libc::statvfs = unsafe { mem::zeroed() };
    retry_interrupted(|| cvt(unsafe { libc::statvfs(cpath.as_ptr(), &mut st) }))?;

    let unit = if st.f_frsize != 0 {
        st.f_frsize as u64
    } else {
        st.f_bsize as u64
    };
    Ok(FsSizes::from_host(
        st.f_bavail as u64 * unit,
        st.f_bfree as u64 * unit,
        st.f_blocks as u64 * unit,
    ))
}

fn clock(id: libc::clockid_t) -> TimeSpec {
    let mut ts: libc::timespec = unsafe { mem::zeroed() };
    let rc = unsafe { libc::clock_gettime(id, &mut ts) };
    debug_assert_eq!(rc, 0, "clock_gettime rejected a standard clock");
    TimeSpec::new(ts.tv_sec as i64, ts.tv_nsec as u32)
}

pub(crate) fn now_wall() -> TimeSpec {
    clock(libc::CLOCK_REALTIME)
}

pub(crate) fn now_monotonic() -> TimeSpec {
    clock(libc::CLOCK_MONOTONIC)
}

pub(crate) fn sleep_us(micros: u64) {
    let mut req: libc::timespec = unsafe { mem::zeroed() };
    req.tv_sec = (micros / 1_000_000) as libc::time_t;
    req.tv_nsec = ((micros % 1_000_000) * 1_000) as libc::c_long;

    loop {
        let mut rem: libc::timespec = unsafe { mem::zeroed() };
        if unsafe { libc::nanosleep(&req, &mut rem) } == 0 {
            return;
        }
        if io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
            return;
        }
        // Sleep off whatever the signal left over
        req = rem;
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn thread_id() -> u32 {
    unsafe { libc::syscall(libc::SYS_gettid) as u32 }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) fn thread_id() -> u32 {
    let mut tid: u64 = 0;
    unsafe {
        libc::pthread_threadid_np(0, &mut tid);
    }
    tid as u32
}

#[cfg(target_os = "freebsd")]
pub(crate) fn thread_id() -> u32 {
    unsafe { libc::pthread_getthreadid_np() as u32 }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
pub(crate) fn thread_id() -> u32 {
    unsafe { libc::pthread_self() as usize as u32 }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub(crate) fn mem_lock_all() -> io::Result<()> {
    cvt(unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) })
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub(crate) fn mem_unlock_all() -> io::Result<()> {
    cvt(unsafe { libc::munlockall() })
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
pub(crate) fn mem_lock_all() -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
pub(crate) fn mem_unlock_all() -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

pub(crate) fn lock_region(ptr: *const u8, len: usize) -> io::Result<()> {
    cvt(unsafe { libc::mlock(ptr as *const libc::c_void, len) })
}

pub(crate) fn unlock_region(ptr: *const u8, len: usize) -> io::Result<()> {
    cvt(unsafe { libc::munlock(ptr as *const libc::c_void, len) })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn active_cpu_count() -> usize {
    let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
    let rc = unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut set) };
    if rc == 0 {
        let count = unsafe { libc::CPU_COUNT(&set) };
        if count > 0 {
            return count as usize;
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn active_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Hard `RLIMIT_DATA`, since the soft limit can be raised up to it
///
/// On 64-bit hosts a hard limit at or below 4 GiB is ignored in favour of
/// the default bound.
pub(crate) fn max_data_size() -> u64 {
    let mut rl: libc::rlimit = unsafe { mem::zeroed() };
    if unsafe { libc::getrlimit(libc::RLIMIT_DATA, &mut rl) } != 0 {
        return DEFAULT_MAX_DATA_SIZE;
    }
    if rl.rlim_max == libc::RLIM_INFINITY {
        return DEFAULT_MAX_DATA_SIZE;
    }
    let limit = rl.rlim_max as u64;
    if cfg!(target_pointer_width = "64") {
        if limit > 1 << 32 {
            limit
        } else {
            DEFAULT_MAX_DATA_SIZE
        }
    } else {
        limit.min(DEFAULT_MAX_DATA_SIZE)
    }
}

pub(crate) fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

pub(crate) fn physical_memory() -> io::Result<u64> {
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    if pages < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(pages as u64 * page_size() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_table() {
        assert_eq!(kind_from_code(libc::ENOENT), Some(ErrorKind::NotFound));
        assert_eq!(kind_from_code(libc::EEXIST), Some(ErrorKind::Exists));
        assert_eq!(kind_from_code(libc::ENOSPC), Some(ErrorKind::NoSpace));
        assert_eq!(kind_from_code(libc::EINTR), Some(ErrorKind::Interrupted));
        assert_eq!(kind_from_code(libc::EWOULDBLOCK), Some(ErrorKind::WouldBlock));
        assert_eq!(kind_from_code(libc::EXDEV), Some(ErrorKind::Unsupported));
        assert_eq!(kind_from_code(libc::EMFILE), Some(ErrorKind::TooManyOpenFiles));
        assert_eq!(kind_from_code(libc::EBADF), Some(ErrorKind::BadHandle));
        assert_eq!(kind_from_code(0), None);
    }
}
