//! Driver options.

use cxy_common::{limits, WarningFlags};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Options {
    /// Keep `test` declarations and gather `allTestCases`.
    pub test_mode: bool,
    /// Wrap raised values with source-location pushes.
    pub trace_exceptions: bool,
    /// Warning mask (see `WarningFlags::parse`).
    pub warnings: WarningFlags,
    /// Stop emitting diagnostics after this many errors.
    pub max_errors: usize,
    /// Print the S-expression dump of each compiled module.
    pub dump_ast: bool,
    /// Directory searched for plugin shared objects.
    pub plugins_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            test_mode: false,
            trace_exceptions: false,
            warnings: WarningFlags::default_mask(),
            max_errors: limits::DEFAULT_MAX_ERRORS,
            dump_ast: false,
            plugins_dir: None,
        }
    }
}
