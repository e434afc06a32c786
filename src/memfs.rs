//! In-process fake filesystem.
//!
//! A `MemFs` is a flat map from normalized paths to files and directories,
//! with a byte capacity and one-shot fault injection. Handles opened on it
//! are ordinary `FileHandle`s tagged with the memory backend. Byte-range
//! locks are owned per handle, so two handles in one process conflict.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::constants::{OpenFlags, DEFAULT_MEMFS_CAPACITY, OWNER_READ, OWNER_WRITE, PERMISSION_MASK};
use crate::diag::diag;
use crate::dir::DirectoryCursor;
use crate::error::{Error, ErrorKind, Result};
use crate::file::{validate_open, Backend, FileHandle};
use crate::types::{FileId, FsSizes};

static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// Operations that can be made to fail with `MemFs::inject_fault`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Open,
    Read,
    Write,
    Sync,
    Truncate,
    Lock,
    Close,
    Rename,
    Unlink,
}

#[derive(Debug)]
struct Volume {
    id: u64,
    capacity: u64,
    used: Arc<AtomicU64>,
    next_owner: AtomicU64,
    tree: Mutex<Tree>,
    faults: Mutex<Vec<(FaultOp, ErrorKind)>>,
}

impl Volume {
    /// Consume a pending fault for `op`, if any
    fn take_fault(&self, op: FaultOp) -> Result<()> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|(o, _)| *o == op) {
            Some(pos) => {
                let (_, kind) = faults.remove(pos);
                Err(Error::new(kind, format!("injected {:?} fault", op)))
            }
            None => Ok(()),
        }
    }

    /// Reserve up to `want` bytes; returns the amount granted
    fn reserve(&self, want: u64) -> Result<u64> {
        let mut used = self.used.load(Ordering::Acquire);
        loop {
            let room = self.capacity.saturating_sub(used);
            if room == 0 {
                return Err(Error::new(ErrorKind::NoSpace, "volume is full"));
            }
            let grant = want.min(room);
            match self.used.compare_exchange_weak(
                used,
                used + grant,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(grant),
                Err(actual) => used = actual,
            }
        }
    }

    fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
enum Entry {
    File(Arc<MemNode>),
    Dir,
}

#[derive(Debug, Default)]
struct Tree {
    entries: HashMap<PathBuf, Entry>,
    next_index: u64,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        is_root(path) || matches!(self.entries.get(path), Some(Entry::Dir))
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            None => true,
            Some(parent) => self.is_dir(parent),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        is_root(path) || self.entries.contains_key(path)
    }
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("/")
}

/// Drop `.` components and repeated separators
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// File contents shared by every handle and directory entry naming it
#[derive(Debug)]
pub(crate) struct MemNode {
    index: u64,
    perms: u32,
    data: RwLock<Vec<u8>>,
    /// Locked byte offset -> owning handle
    locks: Mutex<HashMap<u64, u64>>,
    unlocked: Condvar,
    used: Arc<AtomicU64>,
}

impl MemNode {
    fn check_access(&self, flags: OpenFlags) -> Result<()> {
        if flags.contains(OpenFlags::READ) && self.perms & OWNER_READ == 0 {
            return Err(Error::new(ErrorKind::PermissionDenied, "file is not readable"));
        }
        if flags.contains(OpenFlags::WRITE) && self.perms & OWNER_WRITE == 0 {
            return Err(Error::new(ErrorKind::PermissionDenied, "file is not writable"));
        }
        Ok(())
    }
}

impl Drop for MemNode {
    fn drop(&mut self) {
        // Space of an unlinked file is returned once the last handle goes
        self.used
            .fetch_sub(self.data.get_mut().len() as u64, Ordering::AcqRel);
    }
}

/// Handle-side state of a `MemFs` file
#[derive(Debug)]
pub(crate) struct MemFile {
    volume: Arc<Volume>,
    node: Arc<MemNode>,
    owner: u64,
    readable: bool,
    writable: bool,
    append: bool,
}

impl MemFile {
    pub(crate) fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if !self.readable {
            return Err(Error::bad_handle("handle not open for reading"));
        }
        self.volume.take_fault(FaultOp::Read)?;

        let data = self.node.data.read();
        let start = match usize::try_from(offset) {
            Ok(start) if start < data.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    pub(crate) fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        if !self.writable {
            return Err(Error::bad_handle("handle not open for writing"));
        }
        self.volume.take_fault(FaultOp::Write)?;

        let mut data = self.node.data.write();
        let offset = if self.append {
            data.len() as u64
        } else {
            offset
        };
        let cur = data.len() as u64;
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| Error::invalid("write end overflows"))?;

        let mut len = buf.len();
        if end > cur {
            let growth = end - cur;
            let granted = self.volume.reserve(growth)?;
            let new_end = cur + granted;
            if granted < growth {
                // Short write: only what fits before the volume fills up
                len = new_end.saturating_sub(offset) as usize;
                if len == 0 {
                    self.volume.release(granted);
                    return Err(Error::new(ErrorKind::NoSpace, "volume is full"));
                }
            }
            let new_end = usize::try_from(new_end).map_err(|_| {
                self.volume.release(granted);
                Error::invalid("offset exceeds address space")
            })?;
            data.resize(new_end, 0);
        }

        let start = offset as usize;
        data[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    pub(crate) fn sync(&self) -> Result<()> {
        self.volume.take_fault(FaultOp::Sync)
    }

    pub(crate) fn set_len(&self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::invalid("truncate needs write access"));
        }
        self.volume.take_fault(FaultOp::Truncate)?;

        let new_len = usize::try_from(len).map_err(|_| Error::invalid("length exceeds address space"))?;
        let mut data = self.node.data.write();
        let cur = data.len() as u64;
        if len > cur {
            let granted = self.volume.reserve(len - cur)?;
            if granted < len - cur {
                self.volume.release(granted);
                return Err(Error::new(ErrorKind::NoSpace, "volume is full"));
            }
        } else {
            self.volume.release(cur - len);
        }
        data.resize(new_len, 0);
        Ok(())
    }

    pub(crate) fn size(&self) -> u64 {
        self.node.data.read().len() as u64
    }

    pub(crate) fn file_id(&self) -> FileId {
        FileId::new(self.volume.id, self.node.index)
    }

    pub(crate) fn lock_byte(&self, offset: u64, acquire: bool, nowait: bool) -> Result<()> {
        self.volume.take_fault(FaultOp::Lock)?;

        let mut locks = self.node.locks.lock();
        if !acquire {
            if locks.get(&offset) == Some(&self.owner) {
                locks.remove(&offset);
                self.node.unlocked.notify_all();
            }
            return Ok(());
        }

        loop {
            match locks.get(&offset) {
                None => {
                    locks.insert(offset, self.owner);
                    return Ok(());
                }
                Some(&owner) if owner == self.owner => return Ok(()),
                Some(_) if nowait => {
                    return Err(Error::new(
                        ErrorKind::WouldBlock,
                        format!("byte {} held by another handle", offset),
                    ))
                }
                Some(_) => self.node.unlocked.wait(&mut locks),
            }
        }
    }

    pub(crate) fn close(self) -> Result<()> {
        self.volume.take_fault(FaultOp::Close)
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        let mut locks = self.node.locks.lock();
        let held = locks.len();
        locks.retain(|_, owner| *owner != self.owner);
        if locks.len() != held {
            self.node.unlocked.notify_all();
        }
    }
}

/// In-process volume with the same operation set as the host filesystem
#[derive(Debug, Clone)]
pub struct MemFs {
    volume: Arc<Volume>,
}

impl Default for MemFs {
    fn default() -> Self {
        MemFs::new(DEFAULT_MEMFS_CAPACITY)
    }
}

impl MemFs {
    /// Create an empty volume holding at most `capacity` bytes of file data
    pub fn new(capacity: u64) -> Self {
        MemFs {
            volume: Arc::new(Volume {
                id: NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed),
                capacity,
                used: Arc::new(AtomicU64::new(0)),
                next_owner: AtomicU64::new(1),
                tree: Mutex::new(Tree::default()),
                faults: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Volume id, used as the `volume` half of every `FileId`
    pub fn id(&self) -> u64 {
        self.volume.id
    }

    pub fn capacity(&self) -> u64 {
        self.volume.capacity
    }

    /// Bytes held by files, including unlinked files still open
    pub fn used(&self) -> u64 {
        self.volume.used.load(Ordering::Acquire)
    }

    /// Make the next `op` on this volume fail with `kind`
    pub fn inject_fault(&self, op: FaultOp, kind: ErrorKind) {
        debug!("memfs {}: arming {:?} fault ({})", self.volume.id, op, kind);
        self.volume.faults.lock().push((op, kind));
    }

    /// Open or create a file; same flag and permission rules as the host
    pub fn open<P: AsRef<Path>>(&self, path: P, flags: OpenFlags, perms: u32) -> Result<FileHandle> {
        validate_open(flags, perms)?;
        let path = normalize(path.as_ref());
        self.volume.take_fault(FaultOp::Open)?;

        let node = {
            let mut tree = self.volume.tree.lock();
            match tree.entries.get(&path).cloned() {
                Some(Entry::Dir) => {
                    return Err(Error::invalid(format!("{} is a directory", path.display())))
                }
                Some(Entry::File(node)) => {
                    if flags.contains(OpenFlags::CREATE_EXCLUSIVE) {
                        return Err(Error::new(
                            ErrorKind::Exists,
                            format!("{} already exists", path.display()),
                        ));
                    }
                    node.check_access(flags)?;
                    node
                }
                None => {
                    if !flags.intersects(OpenFlags::CREATE | OpenFlags::CREATE_EXCLUSIVE)
                        || !tree.parent_exists(&path)
                    {
                        return Err(Error::new(
                            ErrorKind::NotFound,
                            format!("{} not found", path.display()),
                        ));
                    }
                    if is_root(&path) {
                        return Err(Error::invalid("cannot create the root"));
                    }
                    let node = Arc::new(MemNode {
                        index: tree.next_index,
                        perms,
                        data: RwLock::new(Vec::new()),
                        locks: Mutex::new(HashMap::new()),
                        unlocked: Condvar::new(),
                        used: self.volume.used.clone(),
                    });
                    tree.next_index += 1;
                    tree.entries.insert(path.clone(), Entry::File(node.clone()));
                    node
                }
            }
        };

        if flags.contains(OpenFlags::TRUNCATE) {
            let mut data = node.data.write();
            self.volume.release(data.len() as u64);
            data.clear();
        }

        let file = MemFile {
            volume: self.volume.clone(),
            node,
            owner: self.volume.next_owner.fetch_add(1, Ordering::Relaxed),
            readable: flags.contains(OpenFlags::READ),
            writable: flags.contains(OpenFlags::WRITE),
            append: flags.contains(OpenFlags::APPEND),
        };
        Ok(FileHandle::from_backend(Backend::Memory(file), path))
    }

    pub fn create_dir<P: AsRef<Path>>(&self, path: P, perms: u32) -> Result<()> {
        if perms & !PERMISSION_MASK != 0 {
            return Err(Error::invalid(format!("permission bits {:o} out of range", perms)));
        }
        let path = normalize(path.as_ref());
        let mut tree = self.volume.tree.lock();
        if tree.exists(&path) {
            return Err(Error::new(
                ErrorKind::Exists,
                format!("{} already exists", path.display()),
            ));
        }
        if !tree.parent_exists(&path) {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("parent of {} not found", path.display()),
            ));
        }
        tree.entries.insert(path, Entry::Dir);
        Ok(())
    }

    /// Rename a file, replacing any file at `to`
    pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q, silent: bool) -> Result<()> {
        let (from, to) = (normalize(from.as_ref()), normalize(to.as_ref()));
        let res = self.rename_entry(&from, &to);
        if let Err(err) = &res {
            if !silent {
                diag!("rename {} to {}: {}", from.display(), to.display(), err);
            }
        }
        res
    }

    fn rename_entry(&self, from: &Path, to: &Path) -> Result<()> {
        self.volume.take_fault(FaultOp::Rename)?;

        let mut tree = self.volume.tree.lock();
        match tree.entries.get(from) {
            None => {
                return Err(Error::new(
                    ErrorKind::NotFound,
                    format!("{} not found", from.display()),
                ))
            }
            Some(Entry::Dir) => return Err(Error::unsupported("directory rename")),
            Some(Entry::File(_)) => {}
        }
        if !tree.parent_exists(to) {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("parent of {} not found", to.display()),
            ));
        }
        if tree.is_dir(to) {
            return Err(Error::invalid(format!("{} is a directory", to.display())));
        }

        if let Some(entry) = tree.entries.remove(from) {
            tree.entries.insert(to.to_path_buf(), entry);
        }
        Ok(())
    }

    /// Remove a file name; open handles keep the contents alive
    pub fn unlink<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = normalize(path.as_ref());
        self.volume.take_fault(FaultOp::Unlink)?;

        let mut tree = self.volume.tree.lock();
        match tree.entries.get(&path) {
            Some(Entry::File(_)) => {
                tree.entries.remove(&path);
                Ok(())
            }
            Some(Entry::Dir) => Err(Error::invalid(format!("{} is a directory", path.display()))),
            None => Err(Error::new(
                ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )),
        }
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.volume.tree.lock().exists(&normalize(path.as_ref()))
    }

    pub fn filesystem_sizes<P: AsRef<Path>>(&self, path: P) -> Result<FsSizes> {
        let path = normalize(path.as_ref());
        if !self.volume.tree.lock().exists(&path) {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ));
        }
        let free = self.volume.capacity.saturating_sub(self.used());
        Ok(FsSizes::from_host(free, free, self.volume.capacity))
    }

    /// List a directory; the names are captured when the cursor opens
    pub fn open_directory<P: AsRef<Path>>(&self, path: P) -> Result<DirectoryCursor> {
        let path = normalize(path.as_ref());
        let tree = self.volume.tree.lock();
        if !tree.is_dir(&path) {
            let kind = if tree.exists(&path) {
                ErrorKind::InvalidArgument
            } else {
                ErrorKind::NotFound
            };
            return Err(Error::new(kind, format!("{} is not a directory", path.display())));
        }

        let names: Vec<OsString> = tree
            .entries
            .keys()
            .filter(|p| p.parent() == Some(path.as_path()))
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();
        Ok(DirectoryCursor::from_names(path, names))
    }
}
