//! Logging sink used by the loader and the migrator

use std::fmt;

/// Log target used by [`LogLogger`]
pub const LOG_TARGET: &str = "updown";

/// Receives progress and diagnostic messages.
///
/// Call sites pass `format_args!`, so one method covers plain, formatted and
/// line-oriented printing.
pub trait Logger: Send + Sync {
    /// Report progress or a diagnostic
    fn print(&self, message: fmt::Arguments<'_>);

    /// Report a condition the migrator cannot recover from.
    ///
    /// Only called when the metadata table cannot be created. The error is
    /// still returned to the caller afterwards; implementations may abort.
    fn fatal(&self, message: fmt::Arguments<'_>);
}

/// Forwards messages to the [`log`] facade under the `updown` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn print(&self, message: fmt::Arguments<'_>) {
        log::info!(target: LOG_TARGET, "{}", message);
    }

    fn fatal(&self, message: fmt::Arguments<'_>) {
        log::error!(target: LOG_TARGET, "{}", message);
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn print(&self, _message: fmt::Arguments<'_>) {}

    fn fatal(&self, _message: fmt::Arguments<'_>) {}
}
