//! Diagnostic channel for failures the layer reports on the caller's behalf.
//!
//! A sink may be installed once per process. Without one, messages go to
//! the `log` facade when a logger is accepting errors, else to stderr.

use std::fmt;

use once_cell::sync::OnceCell;

use crate::error::{Error, ErrorKind, Result};

/// Receiver of layer diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn log_error(&self, args: fmt::Arguments<'_>);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log_error(&self, args: fmt::Arguments<'_>) {
        self(&args.to_string())
    }
}

static SINK: OnceCell<Box<dyn DiagnosticSink>> = OnceCell::new();

/// Install the process-wide sink; fails with `Busy` if one is already set
pub fn set_diagnostic_sink(sink: Box<dyn DiagnosticSink>) -> Result<()> {
    SINK.set(sink)
        .map_err(|_| Error::new(ErrorKind::Busy, "diagnostic sink already installed"))
}

pub fn has_diagnostic_sink() -> bool {
    SINK.get().is_some()
}

pub(crate) fn report(args: fmt::Arguments<'_>) {
    match SINK.get() {
        Some(sink) => sink.log_error(args),
        None if log::log_enabled!(log::Level::Error) => log::error!("{}", args),
        None => eprintln!("lumoport: {}", args),
    }
}

macro_rules! diag {
    ($($arg:tt)*) => {
        $crate::diag::report(format_args!($($arg)*))
    };
}

pub(crate) use diag;
