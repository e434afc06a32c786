use std::ffi::OsString;
use std::fs::ReadDir;
use std::path::{Path, PathBuf};
use std::vec;

use crate::error::{retry_interrupted, Error, Result};

#[derive(Debug)]
enum Source {
    Host(ReadDir),
    /// Snapshot of names taken when the cursor was opened
    Memory(vec::IntoIter<OsString>),
}

/// Single-threaded iterator over the names in one directory
///
/// Order is unspecified; `.` and `..` are never yielded.
#[derive(Debug)]
pub struct DirectoryCursor {
    path: PathBuf,
    source: Option<Source>,
}

impl DirectoryCursor {
    pub(crate) fn from_names(path: PathBuf, names: Vec<OsString>) -> Self {
        DirectoryCursor {
            path,
            source: Some(Source::Memory(names.into_iter())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next entry name, or `None` at end of stream
    pub fn next_name(&mut self) -> Result<Option<OsString>> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::bad_handle("directory cursor is closed"))?;

        match source {
            Source::Host(read_dir) => loop {
                let entry = match read_dir.next() {
                    None => return Ok(None),
                    Some(entry) => entry.map_err(|e| {
                        Error::from_io(e, &format!("readdir {}", self.path.display()))
                    })?,
                };
                let name = entry.file_name();
                if name != "." && name != ".." {
                    return Ok(Some(name));
                }
            },
            Source::Memory(names) => Ok(names.next()),
        }
    }

    /// Release the cursor; later calls to `next_name` fail with `BadHandle`
    pub fn close(&mut self) {
        self.source = None;
    }
}

impl Iterator for DirectoryCursor {
    type Item = Result<OsString>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_name().transpose()
    }
}

/// Open a host directory for iteration
pub fn open_directory<P: AsRef<Path>>(path: P) -> Result<DirectoryCursor> {
    let path = path.as_ref();
    let read_dir = retry_interrupted(|| std::fs::read_dir(path))
        .map_err(|e| Error::from_io(e, &format!("opendir {}", path.display())))?;
    Ok(DirectoryCursor {
        path: path.to_path_buf(),
        source: Some(Source::Host(read_dir)),
    })
}
