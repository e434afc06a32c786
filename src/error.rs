use std::io;
use std::result;

use thiserror::Error as ThisError;

/// Custom result type for layer operations
pub type Result<T> = result::Result<T, Error>;

/// Portable error kinds
///
/// Every host-specific code is translated into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ThisError)]
pub enum ErrorKind {
    /// No such file or directory
    #[error("not found")]
    NotFound,
    /// Path already exists
    #[error("already exists")]
    Exists,
    /// Access denied by the host
    #[error("permission denied")]
    PermissionDenied,
    /// Caller passed an argument the host rejects
    #[error("invalid argument")]
    InvalidArgument,
    /// Generic I/O failure, also used for unrecognized host codes
    #[error("I/O error")]
    IoError,
    /// Filesystem or quota is full
    #[error("no space left")]
    NoSpace,
    /// Resource is busy
    #[error("resource busy")]
    Busy,
    /// Host call interrupted by a signal; retried inside the layer
    #[error("interrupted")]
    Interrupted,
    /// Non-blocking request could not be satisfied
    #[error("operation would block")]
    WouldBlock,
    /// Host lacks the requested facility
    #[error("unsupported")]
    Unsupported,
    /// Descriptor table exhausted
    #[error("too many open files")]
    TooManyOpenFiles,
    /// Handle is closed, poisoned or otherwise unusable
    #[error("bad handle")]
    BadHandle,
    /// Allocation failed
    #[error("out of memory")]
    OutOfMemory,
    /// Unrecoverable host failure
    #[error("fatal error")]
    Fatal,
}

/// Layer error: a portable kind, the raw host code if any, and a short message
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    code: Option<i32>,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Translate a raw host code (errno or Win32 error)
    pub fn from_raw_os_error(code: i32, context: &str) -> Self {
        match crate::sys::kind_from_code(code) {
            Some(kind) => Error {
                kind,
                code: Some(code),
                message: context.to_string(),
            },
            None => Error {
                kind: ErrorKind::IoError,
                code: Some(code),
                message: format!("{}: unrecognized host error {}", context, code),
            },
        }
    }

    /// Translate an `io::Error`, attaching `context` to the message
    pub fn from_io(err: io::Error, context: &str) -> Self {
        if let Some(code) = err.raw_os_error() {
            return Error::from_raw_os_error(code, context);
        }

        Error {
            kind: kind_from_io(err.kind()),
            code: None,
            message: format!("{}: {}", context, err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Raw host code, when the error came from the host
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn bad_handle(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadHandle, context)
    }

    pub(crate) fn invalid(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context)
    }

    pub(crate) fn unsupported(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unsupported, context)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind, kind.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::from_io(err, "host call failed")
    }
}

impl PartialEq<ErrorKind> for Error {
    fn eq(&self, other: &ErrorKind) -> bool {
        self.kind == *other
    }
}

fn kind_from_io(kind: io::ErrorKind) -> ErrorKind {
    match kind {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => ErrorKind::Exists,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidArgument,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
        io::ErrorKind::Unsupported => ErrorKind::Unsupported,
        io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
        _ => ErrorKind::IoError,
    }
}

/// Re-issue a host call until the host stops reporting an interruption
///
/// What counts as an interruption is host specific, see `sys::is_interrupted`.
pub(crate) fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(err) if crate::sys::is_interrupted(&err) => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_fallback() {
        let err = Error::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"), "open");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), None);
        assert!(err.message().starts_with("open"));
    }

    #[test]
    fn test_unknown_code_is_io_error() {
        let err = Error::from_raw_os_error(0x7fff_fff0, "pread");
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(err.code(), Some(0x7fff_fff0));
        assert!(err.message().contains("unrecognized host error"));
    }

    #[test]
    fn test_retry_interrupted_reissues() {
        let mut calls = 0;
        let res = retry_interrupted(|| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(res.unwrap(), 3);
    }

    #[test]
    fn test_retry_stops_on_other_errors() {
        let mut calls = 0;
        let res: io::Result<()> = retry_interrupted(|| {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::NotFound))
        });
        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(calls, 1);
    }

    #[cfg(windows)]
    #[test]
    fn test_aborted_io_is_retried_not_surfaced() {
        use windows_sys::Win32::Foundation::ERROR_OPERATION_ABORTED;

        let aborted = ERROR_OPERATION_ABORTED as i32;
        let mut calls = 0;
        let res = retry_interrupted(|| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from_raw_os_error(aborted))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(res.unwrap(), 3);

        // Seen outside a retry loop it is a plain I/O failure
        let err = Error::from_raw_os_error(aborted, "pread");
        assert_eq!(err.kind(), ErrorKind::IoError);
    }
}
