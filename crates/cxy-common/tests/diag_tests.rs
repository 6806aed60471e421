//! Tests for the diagnostic log and warning masks.

use cxy_common::{
    Atom, DiagnosticKind, FileLoc, FilePos, Log, WarningFlags, WarningId,
};

fn loc() -> FileLoc {
    FileLoc::new(Atom(0), FilePos::new(1, 1, 0), FilePos::new(1, 2, 1))
}

#[test]
fn log_counts_errors_and_warnings() {
    let mut log = Log::new();
    log.error(loc(), "bad thing");
    log.warning(loc(), "odd thing");
    log.note(loc(), "context");
    assert_eq!(log.error_count(), 1);
    assert_eq!(log.warning_count(), 1);
    assert_eq!(log.diagnostics().len(), 3);
    assert!(log.has_errors());
}

#[test]
fn log_suppresses_beyond_error_limit() {
    let mut log = Log::new();
    log.set_max_errors(2);
    for i in 0..5 {
        log.error(loc(), format!("error {i}"));
    }
    // All five are counted, only the first two are emitted.
    assert_eq!(log.error_count(), 5);
    assert_eq!(log.diagnostics().len(), 2);
}

#[test]
fn default_mask_disables_noisy_warnings() {
    let mut log = Log::new();
    log.warning_with_id(WarningId::MissingStage, loc(), "suppressed");
    log.warning_with_id(WarningId::UnusedVariable, loc(), "emitted");
    assert_eq!(log.warning_count(), 1);
    assert_eq!(log.diagnostics().len(), 1);
    assert_eq!(log.diagnostics()[0].warning, Some(WarningId::UnusedVariable));
}

#[test]
fn promote_error_bit_upgrades_warnings() {
    let mut log = Log::new();
    let flags = WarningFlags::parse("all error").expect("valid spec");
    log.set_enabled_warnings(flags);
    log.warning_with_id(WarningId::RedundantStmt, loc(), "now an error");
    assert_eq!(log.error_count(), 1);
    assert_eq!(log.warning_count(), 0);
    assert_eq!(log.diagnostics()[0].kind, DiagnosticKind::Error);
}

#[test]
fn warning_spec_parsing() {
    let none = WarningFlags::parse("none").expect("valid spec");
    assert!(!none.contains(WarningFlags::UNUSED_VARIABLE));

    let enabled = WarningFlags::parse("none MaybeUninitialized").expect("valid spec");
    assert!(enabled.contains(WarningFlags::MAYBE_UNINITIALIZED));

    let disabled = WarningFlags::parse("all,no-UnusedVariable").expect("valid spec");
    assert!(!disabled.contains(WarningFlags::UNUSED_VARIABLE));
    assert!(disabled.contains(WarningFlags::MISSING_STAGE));

    assert!(WarningFlags::parse("NotAWarning").is_err());
}

#[test]
fn handler_sees_every_emitted_diagnostic() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut log = Log::with_handler(Box::new(move |d| {
        sink.borrow_mut().push(d.message.clone());
    }));
    log.error(loc(), "first");
    log.note(loc(), "second");
    assert_eq!(&*seen.borrow(), &["first".to_string(), "second".to_string()]);
}
