//! File handles and path-level file operations.
//!
//! A `FileHandle` owns exactly one backend resource: a host descriptor or a
//! file on an in-process `MemFs`. Every operation dispatches once on that
//! tag. Handles move from `Open` to `Closed` on `close`, or to `Poisoned`
//! when an I/O failure leaves their durability unknown.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::{debug, trace, warn};

use crate::constants::{OpenFlags, ACCESS_MODES, PERMISSION_MASK, WRITE_ONLY_MODES};
use crate::diag::diag;
use crate::error::{retry_interrupted, Error, ErrorKind, Result};
use crate::memfs::MemFile;
use crate::sys::{self, HostFile};
use crate::types::{FileId, FsSizes, HandleState};

/// Which backend a handle dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// The host filesystem (POSIX or Windows)
    Host,
    /// An in-process `MemFs` volume
    Memory,
}

#[derive(Debug)]
pub(crate) enum Backend {
    Host(HostFile),
    Memory(MemFile),
}

impl Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Host(_) => BackendKind::Host,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        match self {
            Backend::Host(f) => f.read_at(buf, offset).map_err(|e| Error::from_io(e, "pread")),
            Backend::Memory(f) => f.read_at(buf, offset),
        }
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        match self {
            Backend::Host(f) => f.write_at(buf, offset).map_err(|e| Error::from_io(e, "pwrite")),
            Backend::Memory(f) => f.write_at(buf, offset),
        }
    }

    fn sync(&self) -> Result<()> {
        match self {
            Backend::Host(f) => f.sync().map_err(|e| Error::from_io(e, "sync")),
            Backend::Memory(f) => f.sync(),
        }
    }

    fn set_len(&self, len: u64) -> Result<()> {
        match self {
            Backend::Host(f) => f.set_len(len).map_err(|e| Error::from_io(e, "truncate")),
            Backend::Memory(f) => f.set_len(len),
        }
    }

    fn size(&self) -> Result<u64> {
        match self {
            Backend::Host(f) => f.size().map_err(|e| Error::from_io(e, "file_size")),
            Backend::Memory(f) => Ok(f.size()),
        }
    }

    fn file_id(&self) -> Result<FileId> {
        match self {
            Backend::Host(f) => f.file_id().map_err(|e| Error::from_io(e, "file_id")),
            Backend::Memory(f) => Ok(f.file_id()),
        }
    }

    fn lock_byte(&self, offset: u64, acquire: bool, nowait: bool) -> Result<()> {
        match self {
            Backend::Host(f) => f
                .lock_byte(offset, acquire, nowait)
                .map_err(|e| Error::from_io(e, "lock_byte_range")),
            Backend::Memory(f) => f.lock_byte(offset, acquire, nowait),
        }
    }

    fn close(self) -> Result<()> {
        match self {
            Backend::Host(f) => f.close().map_err(|e| Error::from_io(e, "close")),
            Backend::Memory(f) => f.close(),
        }
    }
}

/// Check open flags and permission bits before touching any backend
pub(crate) fn validate_open(flags: OpenFlags, perms: u32) -> Result<()> {
    if !flags.intersects(*ACCESS_MODES) {
        return Err(Error::invalid("open mode needs read or write access"));
    }
    if flags.intersects(*WRITE_ONLY_MODES) && !flags.contains(OpenFlags::WRITE) {
        return Err(Error::invalid(format!(
            "open mode {:?} requires write access",
            flags & *WRITE_ONLY_MODES
        )));
    }
    if flags.contains(OpenFlags::APPEND) && flags.contains(OpenFlags::TRUNCATE) {
        return Err(Error::invalid("append and truncate are exclusive"));
    }
    if perms & !PERMISSION_MASK != 0 {
        return Err(Error::invalid(format!("permission bits {:o} out of range", perms)));
    }
    Ok(())
}

fn check_offset(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| Error::invalid(format!("negative offset {}", offset)))
}

/// Open file owned by the caller
pub struct FileHandle {
    backend: Option<Backend>,
    path: PathBuf,
    no_sync: AtomicBool,
    state: AtomicU8,
}

impl FileHandle {
    /// Open `path` on the host filesystem
    ///
    /// `perms` is a POSIX permission set applied when the call creates the
    /// file. `CREATE_EXCLUSIVE` fails with `Exists` if the path is present;
    /// without `CREATE` a missing path fails with `NotFound`.
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags, perms: u32) -> Result<FileHandle> {
        let path = path.as_ref();
        validate_open(flags, perms)?;

        let file = HostFile::open(path, flags, perms)
            .map_err(|e| Error::from_io(e, &format!("open {}", path.display())))?;
        debug!("opened {} with {:?}", path.display(), flags);
        Ok(FileHandle::from_backend(Backend::Host(file), path.to_path_buf()))
    }

    pub(crate) fn from_backend(backend: Backend, path: PathBuf) -> FileHandle {
        FileHandle {
            backend: Some(backend),
            path,
            no_sync: AtomicBool::new(false),
            state: AtomicU8::new(HandleState::Open as u8),
        }
    }

    /// Path the handle was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Status query, valid in every state
    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_valid(&self) -> bool {
        self.state() == HandleState::Open
    }

    /// Backend of an open handle
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(Backend::kind)
    }

    pub fn no_sync(&self) -> bool {
        self.no_sync.load(Ordering::Relaxed)
    }

    /// Mark the file as not needing durability; `sync` becomes a no-op
    pub fn set_no_sync(&self, no_sync: bool) {
        self.no_sync.store(no_sync, Ordering::Relaxed)
    }

    fn backend(&self, op: &str) -> Result<&Backend> {
        match self.state() {
            HandleState::Open => self
                .backend
                .as_ref()
                .ok_or_else(|| Error::bad_handle(format!("{} on released handle", op))),
            HandleState::Poisoned => {
                diag!("{} on poisoned handle for {}", op, self.path.display());
                Err(Error::bad_handle(format!("{} on poisoned handle", op)))
            }
            HandleState::Closed => Err(Error::bad_handle(format!("{} on closed handle", op))),
        }
    }

    fn poison(&self, op: &str, err: &Error) {
        let swapped = self.state.compare_exchange(
            HandleState::Open as u8,
            HandleState::Poisoned as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_ok() {
            warn!("poisoned {} after failed {}: {}", self.path.display(), op, err);
        }
    }

    /// Poison on errors that leave the file contents unknown
    fn check_io<T>(&self, op: &str, res: Result<T>) -> Result<T> {
        if let Err(err) = &res {
            if err.kind() == ErrorKind::IoError {
                self.poison(op, err);
            }
        }
        res
    }

    /// Read up to `buf.len()` bytes at `offset` without moving any cursor
    ///
    /// Short reads are reported as-is; zero means end of file.
    pub fn pread(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let backend = self.backend("pread")?;
        let offset = check_offset(offset)?;
        self.check_io("pread", backend.read_at(buf, offset))
    }

    /// Write up to `buf.len()` bytes at `offset` without moving any cursor
    pub fn pwrite(&self, buf: &[u8], offset: i64) -> Result<usize> {
        let backend = self.backend("pwrite")?;
        let offset = check_offset(offset)?;
        self.check_io("pwrite", backend.write_at(buf, offset))
    }

    /// Read until `buf` is full or end of file; returns the bytes read
    pub fn read_full_at(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.pread(&mut buf[done..], offset + done as i64)?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok(done)
    }

    /// Write all of `buf` at `offset`, looping over short writes
    pub fn write_all_at(&self, buf: &[u8], offset: i64) -> Result<()> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.pwrite(&buf[done..], offset + done as i64)?;
            if n == 0 {
                return Err(Error::new(
                    ErrorKind::IoError,
                    format!("pwrite made no progress at offset {}", offset + done as i64),
                ));
            }
            done += n;
        }
        Ok(())
    }

    /// Force written bytes to stable storage
    ///
    /// Returns at once when `no_sync` is set. Any failure poisons the
    /// handle, since the durability of earlier writes is then unknown.
    pub fn sync(&self) -> Result<()> {
        let backend = self.backend("sync")?;
        if self.no_sync() {
            return Ok(());
        }

        backend.sync().map_err(|err| {
            diag!("sync of {} failed: {}", self.path.display(), err);
            self.poison("sync", &err);
            err
        })
    }

    /// Set the file length to exactly `len`; any extension reads as zeroes
    pub fn truncate(&self, len: u64) -> Result<()> {
        let backend = self.backend("truncate")?;
        let res = backend.set_len(len).map_err(|err| {
            diag!("truncate of {} to {} failed: {}", self.path.display(), len, err);
            err
        });
        self.check_io("truncate", res)
    }

    pub fn file_size(&self) -> Result<u64> {
        self.backend("file_size")?.size()
    }

    /// Identity of the underlying file; no data I/O is performed
    pub fn file_id(&self) -> Result<FileId> {
        self.backend("file_id")?.file_id()
    }

    /// Acquire or release an advisory exclusive lock on the byte at `offset`
    ///
    /// With `nowait`, a lock held elsewhere fails with `WouldBlock`.
    /// Host locks are owned by the process, not the handle.
    pub fn lock_byte_range(&self, offset: u64, acquire: bool, nowait: bool) -> Result<()> {
        let backend = self.backend("lock_byte_range")?;
        trace!(
            "{} byte {} of {} (nowait={})",
            if acquire { "lock" } else { "unlock" },
            offset,
            self.path.display(),
            nowait
        );
        backend.lock_byte(offset, acquire, nowait)
    }

    /// Release the handle
    ///
    /// A second close returns `BadHandle`. Closing a poisoned handle still
    /// releases the descriptor but reports `BadHandle`.
    pub fn close(&mut self) -> Result<()> {
        match self.state() {
            HandleState::Closed => {
                diag!("assertion failed: close of already closed handle for {}", self.path.display());
                return Err(Error::bad_handle("close of closed handle"));
            }
            HandleState::Poisoned => {
                self.state.store(HandleState::Closed as u8, Ordering::Release);
                if let Some(backend) = self.backend.take() {
                    let _ = backend.close();
                }
                diag!("close of poisoned handle for {}", self.path.display());
                return Err(Error::bad_handle("close of poisoned handle"));
            }
            HandleState::Open => {}
        }

        self.state.store(HandleState::Closed as u8, Ordering::Release);
        let backend = self
            .backend
            .take()
            .ok_or_else(|| Error::bad_handle("close of released handle"))?;
        debug!("closing {}", self.path.display());
        backend.close().map_err(|err| {
            diag!("close of {} failed: {}", self.path.display(), err);
            err
        })
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("backend", &self.backend_kind())
            .field("no_sync", &self.no_sync())
            .finish()
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            let _ = backend.close();
        }
    }
}

/// Rename within one filesystem, replacing any existing file at `to`
///
/// Cross-device renames fail with `Unsupported`. `silent` only suppresses
/// the diagnostic message.
pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q, silent: bool) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    retry_interrupted(|| std::fs::rename(from, to)).map_err(|e| {
        let err = Error::from_io(e, &format!("rename {} to {}", from.display(), to.display()));
        if !silent {
            diag!("{}", err);
        }
        err
    })?;
    debug!("renamed {} to {}", from.display(), to.display());
    Ok(())
}

/// Remove a directory entry; open handles keep the storage alive
pub fn unlink<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    retry_interrupted(|| std::fs::remove_file(path))
        .map_err(|e| Error::from_io(e, &format!("unlink {}", path.display())))
}

pub fn exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = Error::from_io(e, &format!("stat {}", path.display()));
            if err.kind() == ErrorKind::NotFound {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

/// Create one directory with the given permission bits
pub fn create_dir<P: AsRef<Path>>(path: P, perms: u32) -> Result<()> {
    let path = path.as_ref();
    if perms & !PERMISSION_MASK != 0 {
        return Err(Error::invalid(format!("permission bits {:o} out of range", perms)));
    }
    sys::create_dir(path, perms).map_err(|e| Error::from_io(e, &format!("mkdir {}", path.display())))
}

/// Available, free and total bytes of the filesystem holding `path`
pub fn filesystem_sizes<P: AsRef<Path>>(path: P) -> Result<FsSizes> {
    let path = path.as_ref();
    sys::fs_sizes(path).map_err(|e| Error::from_io(e, &format!("statvfs {}", path.display())))
}
