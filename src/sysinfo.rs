use std::path::Path;

use log::debug;
use once_cell::sync::OnceCell;

use crate::constants::NCPUS_OVERRIDE_VAR;
use crate::error::{Error, Result};
use crate::sys;

static CPU_OVERRIDE: OnceCell<Option<usize>> = OnceCell::new();

/// POSIX rule: absolute iff the path starts with `/`
pub fn is_absolute_posix(path: &str) -> bool {
    path.starts_with('/')
}

/// Windows rule: `X:\`, `X:/`, or a `\\` UNC prefix
pub fn is_absolute_windows(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'\\' && bytes[1] == b'\\' {
        return true;
    }
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// True iff `path` resolves without reference to the working directory
pub fn is_absolute_path<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref().to_string_lossy();
    if cfg!(windows) {
        is_absolute_windows(&path)
    } else {
        is_absolute_posix(&path)
    }
}

/// Parse an `NCPUS_OVERRIDE` value; only positive integers count
pub fn parse_cpu_override(value: &str) -> Option<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// Processors the calling process may currently run on
///
/// A positive integer in `NCPUS_OVERRIDE` wins. The variable is read once
/// per process.
pub fn active_cpu_count() -> usize {
    let forced = CPU_OVERRIDE.get_or_init(|| {
        let forced = std::env::var(NCPUS_OVERRIDE_VAR)
            .ok()
            .and_then(|v| parse_cpu_override(&v));
        if let Some(n) = forced {
            debug!("{} forces {} active cpus", NCPUS_OVERRIDE_VAR, n);
        }
        forced
    });

    match forced {
        Some(n) => *n,
        None => sys::active_cpu_count(),
    }
}

/// Conservative lower bound on the data the process may populate
pub fn max_process_data_size() -> u64 {
    sys::max_data_size()
}

/// Host virtual memory page size in bytes
pub fn page_size() -> usize {
    sys::page_size()
}

/// Installed physical memory in bytes
pub fn physical_memory_size() -> Result<u64> {
    sys::physical_memory().map_err(|err| Error::from_io(err, "physical memory size"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_absolute() {
        assert!(is_absolute_posix("/var/lib/db"));
        assert!(!is_absolute_posix("var/lib"));
        assert!(!is_absolute_posix("./x"));
        assert!(!is_absolute_posix(""));
    }

    #[test]
    fn test_windows_absolute() {
        assert!(is_absolute_windows("C:\\data"));
        assert!(is_absolute_windows("d:/data"));
        assert!(is_absolute_windows("\\\\server\\share\\f"));
        assert!(!is_absolute_windows("C:data"));
        assert!(!is_absolute_windows("\\data"));
        assert!(!is_absolute_windows("1:\\data"));
    }

    #[test]
    fn test_parse_cpu_override() {
        assert_eq!(parse_cpu_override("4"), Some(4));
        assert_eq!(parse_cpu_override(" 12\n"), Some(12));
        assert_eq!(parse_cpu_override("0"), None);
        assert_eq!(parse_cpu_override("-3"), None);
        assert_eq!(parse_cpu_override("many"), None);
    }
}
