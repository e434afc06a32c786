use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::fs::{FileExt, OpenOptionsExt};
use std::os::windows::io::{AsRawHandle, IntoRawHandle};
use std::path::Path;

use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS, ERROR_BAD_PATHNAME, ERROR_BUSY,
    ERROR_CALL_NOT_IMPLEMENTED, ERROR_DIR_NOT_EMPTY, ERROR_DISK_FULL, ERROR_FILE_EXISTS,
    ERROR_FILE_NOT_FOUND, ERROR_HANDLE_DISK_FULL, ERROR_INVALID_HANDLE, ERROR_INVALID_NAME,
    ERROR_INVALID_PARAMETER, ERROR_IO_DEVICE, ERROR_IO_PENDING, ERROR_LOCK_VIOLATION,
    ERROR_NOT_ENOUGH_MEMORY, ERROR_NOT_SAME_DEVICE, ERROR_NOT_SUPPORTED, ERROR_OPERATION_ABORTED,
    ERROR_OUTOFMEMORY, ERROR_PATH_NOT_FOUND, ERROR_SHARING_VIOLATION, ERROR_TOO_MANY_OPEN_FILES,
    ERROR_WRITE_PROTECT, FILETIME, GENERIC_READ, HANDLE,
};
use windows_sys::Win32::Storage::FileSystem::{
    GetDiskFreeSpaceExW, GetFileInformationByHandle, LockFileEx, UnlockFileEx,
    BY_HANDLE_FILE_INFORMATION, FILE_ATTRIBUTE_READONLY, FILE_SHARE_DELETE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
};
use windows_sys::Win32::System::Memory::{VirtualLock, VirtualUnlock};
use windows_sys::Win32::System::SystemInformation::{
    GetSystemInfo, GetSystemTimeAsFileTime, GetTickCount64, GlobalMemoryStatusEx, MEMORYSTATUSEX,
    SYSTEM_INFO,
};
use windows_sys::Win32::System::Threading::{GetCurrentThreadId, Sleep};
use windows_sys::Win32::System::IO::OVERLAPPED;

use crate::constants::{OpenFlags, DEFAULT_MAX_DATA_SIZE, OWNER_READ, OWNER_WRITE};
use crate::error::{retry_interrupted, ErrorKind};
use crate::time::filetime_to_timespec;
use crate::types::{FileId, FsSizes, TimeSpec};

/// Map a Win32 error code to its portable kind
pub(crate) fn kind_from_code(code: i32) -> Option<ErrorKind> {
    let kind = match code as u32 {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => ErrorKind::NotFound,
        ERROR_FILE_EXISTS | ERROR_ALREADY_EXISTS | ERROR_DIR_NOT_EMPTY => ErrorKind::Exists,
        ERROR_ACCESS_DENIED | ERROR_WRITE_PROTECT => ErrorKind::PermissionDenied,
        ERROR_INVALID_PARAMETER | ERROR_INVALID_NAME | ERROR_BAD_PATHNAME => {
            ErrorKind::InvalidArgument
        }
        // Aborted I/O is retried; one that still escapes is a plain failure
        ERROR_IO_DEVICE | ERROR_OPERATION_ABORTED => ErrorKind::IoError,
        ERROR_DISK_FULL | ERROR_HANDLE_DISK_FULL => ErrorKind::NoSpace,
        ERROR_BUSY | ERROR_SHARING_VIOLATION => ErrorKind::Busy,
        ERROR_LOCK_VIOLATION | ERROR_IO_PENDING => ErrorKind::WouldBlock,
        ERROR_NOT_SUPPORTED | ERROR_CALL_NOT_IMPLEMENTED | ERROR_NOT_SAME_DEVICE => {
            ErrorKind::Unsupported
        }
        ERROR_TOO_MANY_OPEN_FILES => ErrorKind::TooManyOpenFiles,
        ERROR_INVALID_HANDLE => ErrorKind::BadHandle,
        ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY => ErrorKind::OutOfMemory,
        _ => return None,
    };
    Some(kind)
}

/// std reports `ERROR_OPERATION_ABORTED` as `TimedOut`, so match the raw code
pub(crate) fn is_interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
        || err.raw_os_error() == Some(ERROR_OPERATION_ABORTED as i32)
}

fn cvt(ok: i32) -> io::Result<()> {
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

/// Windows cannot express group/other bits; owner read is the floor and
/// a missing owner write becomes the read-only attribute.
fn check_perms(perms: u32) -> io::Result<()> {
    if perms & OWNER_READ == 0 {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "host cannot create a file its owner cannot read",
        ));
    }
    Ok(())
}

/// Native handle backing a `FileHandle`
#[derive(Debug)]
pub(crate) struct HostFile {
    file: File,
}

impl HostFile {
    pub(crate) fn open(path: &Path, flags: OpenFlags, perms: u32) -> io::Result<HostFile> {
        let creating = flags.intersects(OpenFlags::CREATE | OpenFlags::CREATE_EXCLUSIVE);
        if creating {
            check_perms(perms)?;
        }

        let mut options = OpenOptions::new();
        options
            .read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNCATE))
            .create(flags.contains(OpenFlags::CREATE))
            .create_new(flags.contains(OpenFlags::CREATE_EXCLUSIVE))
            // Share-delete lets unlink of an open file behave as on POSIX
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE);
        if creating && !flags.contains(OpenFlags::WRITE) {
            // std only creates through a writable request; keep the handle read-only
            options.write(true).access_mode(GENERIC_READ);
        }
        if creating && perms & OWNER_WRITE == 0 {
            options.attributes(FILE_ATTRIBUTE_READONLY);
        }

        let file = retry_interrupted(|| options.open(path))?;
        Ok(HostFile { file })
    }

    fn raw(&self) -> *mut c_void {
        self.file.as_raw_handle() as *mut c_void
    }

    pub(crate) fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        retry_interrupted(|| self.file.seek_read(buf, offset))
    }

    pub(crate) fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        retry_interrupted(|| self.file.seek_write(buf, offset))
    }

    pub(crate) fn sync(&self) -> io::Result<()> {
        retry_interrupted(|| self.file.sync_all())
    }

    /// NTFS and ReFS zero-fill the extension of SetEndOfFile
    pub(crate) fn set_len(&self, len: u64) -> io::Result<()> {
        retry_interrupted(|| self.file.set_len(len))
    }

    /// Always asks the host; other handles may have resized the file
    pub(crate) fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub(crate) fn file_id(&self) -> io::Result<FileId> {
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { mem::zeroed() };
        cvt(unsafe { GetFileInformationByHandle(self.raw(), &mut info) })?;
        Ok(FileId::from_windows_parts(
            info.dwVolumeSerialNumber,
            info.nFileIndexHigh,
            info.nFileIndexLow,
        ))
    }

    pub(crate) fn lock_byte(&self, offset: u64, acquire: bool, nowait: bool) -> io::Result<()> {
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.Anonymous.Anonymous.Offset = offset as u32;
        overlapped.Anonymous.Anonymous.OffsetHigh = (offset >> 32) as u32;

        let mut flags = LOCKFILE_EXCLUSIVE_LOCK;
        if nowait {
            flags |= LOCKFILE_FAIL_IMMEDIATELY;
        }
        let res = retry_interrupted(|| {
            let rc = if acquire {
                unsafe { LockFileEx(self.raw(), flags, 0, 1, 0, &mut overlapped) }
            } else {
                unsafe { UnlockFileEx(self.raw(), 0, 1, 0, &mut overlapped) }
            };
            cvt(rc)
        });

        res.map_err(|err| match err.raw_os_error().map(|c| c as u32) {
            Some(ERROR_LOCK_VIOLATION) | Some(ERROR_IO_PENDING) => {
                io::Error::new(io::ErrorKind::WouldBlock, "byte range held by another holder")
            }
            _ => err,
        })
    }

    /// Release the handle, reporting what CloseHandle says
    pub(crate) fn close(self) -> io::Result<()> {
        let handle = self.file.into_raw_handle();
        cvt(unsafe { CloseHandle(handle as HANDLE) })
    }
}

pub(crate) fn create_dir(path: &Path, perms: u32) -> io::Result<()> {
    check_perms(perms)?;
    std::fs::create_dir(path)
}

pub(crate) fn fs_sizes(path: &Path) -> io::Result<FsSizes> {
    // GetDiskFreeSpaceEx wants a directory
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let name = wide(dir);

    let mut available = 0u64;
    let mut total = 0u64;
    let mut free = 0u64;
    cvt(unsafe { GetDiskFreeSpaceExW(name.as_ptr(), &mut available, &mut total, &mut free) })?;
    Ok(FsSizes::from_host(available, free, total))
}

pub(crate) fn now_wall() -> TimeSpec {
    let mut ft: FILETIME = unsafe { mem::zeroed() };
    unsafe { GetSystemTimeAsFileTime(&mut ft) };
    filetime_to_timespec(((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64)
}

pub(crate) fn now_monotonic() -> TimeSpec {
    let ms = unsafe { GetTickCount64() };
    TimeSpec::new((ms / 1_000) as i64, ((ms % 1_000) * 1_000_000) as u32)
}

pub(crate) fn sleep_us(micros: u64) {
    let deadline = now_monotonic().as_micros() as u64 + micros;
    loop {
        let now = now_monotonic().as_micros() as u64;
        if now >= deadline {
            return;
        }
        // Round up so a sub-millisecond remainder still sleeps
        let ms = ((deadline - now) + 999) / 1_000;
        unsafe { Sleep(ms.min(u32::MAX as u64 - 1) as u32) };
    }
}

pub(crate) fn thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}

pub(crate) fn mem_lock_all() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process-wide page locking is not available",
    ))
}

pub(crate) fn mem_unlock_all() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process-wide page locking is not available",
    ))
}

pub(crate) fn lock_region(ptr: *const u8, len: usize) -> io::Result<()> {
    cvt(unsafe { VirtualLock(ptr as *const c_void, len) })
}

pub(crate) fn unlock_region(ptr: *const u8, len: usize) -> io::Result<()> {
    cvt(unsafe { VirtualUnlock(ptr as *const c_void, len) })
}

pub(crate) fn active_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub(crate) fn max_data_size() -> u64 {
    DEFAULT_MAX_DATA_SIZE
}

pub(crate) fn page_size() -> usize {
    let mut info: SYSTEM_INFO = unsafe { mem::zeroed() };
    unsafe { GetSystemInfo(&mut info) };
    info.dwPageSize as usize
}

pub(crate) fn physical_memory() -> io::Result<u64> {
    let mut status: MEMORYSTATUSEX = unsafe { mem::zeroed() };
    status.dwLength = mem::size_of::<MEMORYSTATUSEX>() as u32;
    cvt(unsafe { GlobalMemoryStatusEx(&mut status) })?;
    Ok(status.ullTotalPhys)
}
