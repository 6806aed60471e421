//! Type checker and comptime evaluator for the cxy compiler.
//!
//! This crate provides:
//! - `CheckerContext` / `CheckerState` - two-phase declaration checking,
//!   bottom-up expression typing, overload resolution, generic
//!   instantiation, operator-overload dispatch, inheritance and vtables,
//!   result/exception flow
//! - the comptime evaluator (`#if`/`#for`/`#while`/`#const`, substitutions,
//!   macro expansion, type introspection builtins)
//! - `check_unit` - the driver entry point running evaluation then checking

pub mod assign;
pub mod call;
pub mod context;
pub mod eval;
pub mod expr;
pub mod generics;
pub mod inherit;
pub mod operators;
pub mod resolve;
pub mod state;
pub mod stmt;

pub use context::{CheckedModule, CheckerContext, CheckerOptions, VTable};
pub use eval::{const_int, EvalValue};
pub use inherit::MemberRef;
pub use state::CheckerState;

use cxy_binder::BindResult;
use cxy_common::{Interner, Log};
use cxy_parser::{NodeArena, NodeIndex};
use cxy_types::TypeTable;

/// Run only the comptime evaluator, against a scratch type table. The
/// driver calls this between binding and shaking so selected branches are
/// lowered like hand-written code; the pass is idempotent.
pub fn evaluate_unit(
    strings: &mut Interner,
    log: &mut Log,
    arena: &mut NodeArena,
    bindings: &BindResult,
    root: NodeIndex,
) {
    let mut types = TypeTable::new();
    let mut ctx = CheckerContext::new(
        strings,
        log,
        arena,
        &mut types,
        bindings,
        CheckerOptions::default(),
    );
    let mut state = CheckerState::new(&mut ctx);
    state.evaluate_comptime(root);
}

/// Evaluate comptime constructs, then type-check the unit.
pub fn check_unit(
    strings: &mut Interner,
    log: &mut Log,
    arena: &mut NodeArena,
    types: &mut TypeTable,
    bindings: &BindResult,
    options: CheckerOptions,
    root: NodeIndex,
) -> CheckedModule {
    let mut ctx = CheckerContext::new(strings, log, arena, types, bindings, options);
    let mut state = CheckerState::new(&mut ctx);
    state.evaluate_comptime(root);
    state.check_program(root)
}
