//! The diagnostic log.
//!
//! Every pass reports problems through a shared `Log`. The log accumulates
//! diagnostics, counts errors and warnings, filters warnings against a
//! per-compilation mask, and stops emitting once the error limit is hit.
//! Rendering is delegated to an injected handler so the core never commits
//! to an output style.

use crate::limits;
use crate::loc::FileLoc;
use bitflags::bitflags;
use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Error,
    Warning,
    Note,
}

/// Identified warnings that can be toggled individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WarningId {
    MissingStage,
    UnusedVariable,
    RedundantStmt,
    CMacroRedefine,
    CUnsupportedField,
    MaybeUninitialized,
}

impl WarningId {
    pub const ALL: [WarningId; 6] = [
        WarningId::MissingStage,
        WarningId::UnusedVariable,
        WarningId::RedundantStmt,
        WarningId::CMacroRedefine,
        WarningId::CUnsupportedField,
        WarningId::MaybeUninitialized,
    ];

    /// The flag bit controlling this warning.
    pub const fn flag(self) -> WarningFlags {
        match self {
            WarningId::MissingStage => WarningFlags::MISSING_STAGE,
            WarningId::UnusedVariable => WarningFlags::UNUSED_VARIABLE,
            WarningId::RedundantStmt => WarningFlags::REDUNDANT_STMT,
            WarningId::CMacroRedefine => WarningFlags::C_MACRO_REDEFINE,
            WarningId::CUnsupportedField => WarningFlags::C_UNSUPPORTED_FIELD,
            WarningId::MaybeUninitialized => WarningFlags::MAYBE_UNINITIALIZED,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            WarningId::MissingStage => "MissingStage",
            WarningId::UnusedVariable => "UnusedVariable",
            WarningId::RedundantStmt => "RedundantStmt",
            WarningId::CMacroRedefine => "CMacroRedefine",
            WarningId::CUnsupportedField => "CUnsupportedField",
            WarningId::MaybeUninitialized => "MaybeUninitialized",
        }
    }

    pub fn from_name(name: &str) -> Option<WarningId> {
        WarningId::ALL.iter().copied().find(|id| id.name() == name)
    }
}

bitflags! {
    /// Per-compilation warning mask.
    ///
    /// Bit 63 (`PROMOTE_ERROR`) upgrades enabled warnings to errors.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct WarningFlags: u64 {
        const MISSING_STAGE       = 1 << 0;
        const UNUSED_VARIABLE     = 1 << 1;
        const REDUNDANT_STMT      = 1 << 2;
        const C_MACRO_REDEFINE    = 1 << 3;
        const C_UNSUPPORTED_FIELD = 1 << 4;
        const MAYBE_UNINITIALIZED = 1 << 5;
        const PROMOTE_ERROR       = 1 << 63;
    }
}

impl WarningFlags {
    /// The default mask: everything except `MissingStage`, `CMacroRedefine`
    /// and `MaybeUninitialized`.
    pub fn default_mask() -> WarningFlags {
        let mut flags = WarningFlags::all();
        flags.remove(WarningFlags::PROMOTE_ERROR);
        flags.remove(WarningFlags::MISSING_STAGE);
        flags.remove(WarningFlags::C_MACRO_REDEFINE);
        flags.remove(WarningFlags::MAYBE_UNINITIALIZED);
        flags
    }

    /// Parse a warning-flag string as accepted on the command line.
    ///
    /// Tokens are separated by `,`, `|` or whitespace. `all` and `none`
    /// reset the mask, `error` sets the promote bit, a warning name enables
    /// that warning and a `no-` prefixed name disables it. Unknown tokens
    /// are returned as errors.
    pub fn parse(spec: &str) -> Result<WarningFlags, String> {
        let mut flags = WarningFlags::default_mask();
        for token in spec.split(|c: char| c == ',' || c == '|' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            match token {
                "all" => {
                    let promote = flags.contains(WarningFlags::PROMOTE_ERROR);
                    flags = WarningFlags::all();
                    flags.set(WarningFlags::PROMOTE_ERROR, promote);
                }
                "none" => {
                    let promote = flags.contains(WarningFlags::PROMOTE_ERROR);
                    flags = WarningFlags::empty();
                    flags.set(WarningFlags::PROMOTE_ERROR, promote);
                }
                "error" => flags.insert(WarningFlags::PROMOTE_ERROR),
                _ => {
                    let (name, enable) = match token.strip_prefix("no-") {
                        Some(rest) => (rest, false),
                        None => (token, true),
                    };
                    let id = WarningId::from_name(name)
                        .ok_or_else(|| format!("unknown warning '{name}'"))?;
                    flags.set(id.flag(), enable);
                }
            }
        }
        Ok(flags)
    }
}

/// A single diagnostic record.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub loc: FileLoc,
    pub message: String,
    /// Set when the diagnostic originated from an identified warning.
    pub warning: Option<WarningId>,
}

/// Callback invoked for every emitted diagnostic.
pub type DiagnosticHandler = Box<dyn FnMut(&Diagnostic)>;

/// Append-only diagnostic sink shared by all passes.
pub struct Log {
    diagnostics: Vec<Diagnostic>,
    handler: Option<DiagnosticHandler>,
    error_count: usize,
    warning_count: usize,
    max_errors: usize,
    enabled_warnings: WarningFlags,
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("error_count", &self.error_count)
            .field("warning_count", &self.warning_count)
            .field("max_errors", &self.max_errors)
            .field("enabled_warnings", &self.enabled_warnings)
            .finish_non_exhaustive()
    }
}

impl Default for Log {
    fn default() -> Self {
        Log::new()
    }
}

impl Log {
    pub fn new() -> Self {
        Log {
            diagnostics: Vec::new(),
            handler: None,
            error_count: 0,
            warning_count: 0,
            max_errors: limits::DEFAULT_MAX_ERRORS,
            enabled_warnings: WarningFlags::default_mask(),
        }
    }

    pub fn with_handler(handler: DiagnosticHandler) -> Self {
        let mut log = Log::new();
        log.handler = Some(handler);
        log
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.max_errors = max;
    }

    pub fn set_enabled_warnings(&mut self, flags: WarningFlags) {
        self.enabled_warnings = flags;
    }

    #[inline]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    #[inline]
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// All diagnostics emitted so far, in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Report an error at `loc`.
    pub fn error(&mut self, loc: FileLoc, message: impl Into<String>) {
        self.error_count += 1;
        if self.error_count > self.max_errors {
            return;
        }
        self.emit(Diagnostic {
            kind: DiagnosticKind::Error,
            loc,
            message: message.into(),
            warning: None,
        });
    }

    /// Report a warning that has no toggleable ID.
    pub fn warning(&mut self, loc: FileLoc, message: impl Into<String>) {
        self.warning_count += 1;
        self.emit(Diagnostic {
            kind: DiagnosticKind::Warning,
            loc,
            message: message.into(),
            warning: None,
        });
    }

    /// Report an identified warning, honoring the warning mask and the
    /// promote-to-error bit.
    pub fn warning_with_id(&mut self, id: WarningId, loc: FileLoc, message: impl Into<String>) {
        if !self.enabled_warnings.contains(id.flag()) {
            return;
        }
        if self.enabled_warnings.contains(WarningFlags::PROMOTE_ERROR) {
            self.error(loc, message);
            return;
        }
        self.warning_count += 1;
        self.emit(Diagnostic {
            kind: DiagnosticKind::Warning,
            loc,
            message: message.into(),
            warning: Some(id),
        });
    }

    /// Attach an informational note to the previous diagnostic.
    pub fn note(&mut self, loc: FileLoc, message: impl Into<String>) {
        if self.error_count > self.max_errors {
            return;
        }
        self.emit(Diagnostic {
            kind: DiagnosticKind::Note,
            loc,
            message: message.into(),
            warning: None,
        });
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        if let Some(handler) = &mut self.handler {
            handler(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }
}
