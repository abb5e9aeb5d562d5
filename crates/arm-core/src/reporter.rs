//! Reporter trait for dependency injection
//!
//! Core logic reports progress through this trait so it stays decoupled
//! from how the CLI renders output.

pub trait Reporter: Send + Sync {
    /// A new phase has started (e.g. "Installing").
    fn section(&self, title: &str);

    /// Resolution of `coordinate` against `constraint` has begun.
    fn resolving(&self, coordinate: &str, constraint: &str);

    /// Content for `coordinate` is available; `cached` when no fetch happened.
    fn fetched(&self, coordinate: &str, cached: bool);

    /// `files` compiled files were written to `sink`.
    fn installed(&self, coordinate: &str, sink: &str, files: usize);

    /// A package was removed from `sink`.
    fn removed(&self, coordinate: &str, sink: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title)
    }
    fn resolving(&self, coordinate: &str, constraint: &str) {
        (**self).resolving(coordinate, constraint)
    }
    fn fetched(&self, coordinate: &str, cached: bool) {
        (**self).fetched(coordinate, cached)
    }
    fn installed(&self, coordinate: &str, sink: &str, files: usize) {
        (**self).installed(coordinate, sink, files)
    }
    fn removed(&self, coordinate: &str, sink: &str) {
        (**self).removed(coordinate, sink)
    }
    fn info(&self, msg: &str) {
        (**self).info(msg)
    }
    fn success(&self, msg: &str) {
        (**self).success(msg)
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg)
    }
    fn error(&self, msg: &str) {
        (**self).error(msg)
    }
}

/// Discards everything. Used by tests and `--quiet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _title: &str) {}
    fn resolving(&self, _coordinate: &str, _constraint: &str) {}
    fn fetched(&self, _coordinate: &str, _cached: bool) {}
    fn installed(&self, _coordinate: &str, _sink: &str, _files: usize) {}
    fn removed(&self, _coordinate: &str, _sink: &str) {}
    fn info(&self, _msg: &str) {}
    fn success(&self, _msg: &str) {}
    fn warning(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}
