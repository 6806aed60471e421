//! Compiler driver for cxy.
//!
//! This crate provides:
//! - `CompilerDriver` - module cache, import resolution, pass
//!   orchestration, native-source collection
//! - `Preprocessor` - `@define` symbols and `@cBuild` directives
//! - `PluginRegistry` - dlopen-based AST-transform extensions
//! - `Options` - the driver configuration surface

pub mod builtins;
pub mod driver;
pub mod options;
pub mod plugin;
pub mod preprocessor;

pub use driver::{CompileState, CompiledUnit, CompilerDriver};
pub use options::Options;
pub use plugin::{CxyPluginAction, CxyPluginApi, PluginRegistry};
pub use preprocessor::Preprocessor;
