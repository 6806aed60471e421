//! Plugin registry.
//!
//! `import plugin "./p.so" as hooks` loads a shared object and registers
//! its named actions; `hooks.action!(...)` later dispatches through the
//! registry. Actions run with a C-layout API handle exposing arena and
//! string-pool callbacks so plugins can construct nodes in the shared
//! arena. The core depends on no specific plugin.

#![allow(unsafe_code)]

use cxy_common::{Atom, FileLoc, Interner, Log};
use cxy_parser::{AstKind, NodeArena, NodeFlags, NodeIndex};
use libloading::Library;
use rustc_hash::FxHashMap;
use std::ffi::{c_char, c_void, CStr};
use std::path::Path;
use tracing::debug;

/// One registered action, exported by the plugin.
#[repr(C)]
pub struct CxyPluginAction {
    /// NUL-terminated action name.
    pub name: *const c_char,
    pub func: Option<PluginActionFn>,
}

/// C-layout API handle passed to every action call. The callbacks build
/// nodes in the host arena and intern into the host string pool; `state`
/// is opaque to the plugin.
#[repr(C)]
pub struct CxyPluginApi {
    state: *mut c_void,
    pub intern: unsafe extern "C" fn(state: *mut c_void, text: *const c_char) -> u32,
    pub mk_ident: unsafe extern "C" fn(state: *mut c_void, atom: u32) -> u32,
    pub mk_integer: unsafe extern "C" fn(state: *mut c_void, value: u64) -> u32,
    pub mk_string: unsafe extern "C" fn(state: *mut c_void, text: *const c_char) -> u32,
}

/// `cxyPluginInit() -> bool`
pub type PluginInitFn = unsafe extern "C" fn() -> bool;
/// `cxyPluginActions(count: *mut usize) -> *const CxyPluginAction`
pub type PluginActionsFn = unsafe extern "C" fn(count: *mut usize) -> *const CxyPluginAction;
/// `action(api, args, nargs) -> node index (u32::MAX on failure)`
pub type PluginActionFn =
    unsafe extern "C" fn(api: *mut CxyPluginApi, args: *const u32, nargs: usize) -> u32;

struct LoadedPlugin {
    /// Keeps the shared object mapped for the compilation's lifetime.
    _library: Library,
    actions: FxHashMap<Atom, PluginActionFn>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: FxHashMap<Atom, LoadedPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn is_loaded(&self, alias: Atom) -> bool {
        self.plugins.contains_key(&alias)
    }

    /// Load a plugin shared object and register its actions under `alias`.
    pub fn load(
        &mut self,
        strings: &mut Interner,
        log: &mut Log,
        loc: FileLoc,
        alias: Atom,
        path: &Path,
    ) -> bool {
        debug!(path = %path.display(), "loading plugin");
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(error) => {
                log.error(
                    loc,
                    format!("cannot load plugin '{}': {error}", path.display()),
                );
                return false;
            }
        };
        let init: libloading::Symbol<'_, PluginInitFn> =
            match unsafe { library.get(b"cxyPluginInit") } {
                Ok(symbol) => symbol,
                Err(error) => {
                    log.error(loc, format!("plugin has no init entry point: {error}"));
                    return false;
                }
            };
        if !unsafe { init() } {
            log.error(loc, "plugin initialization failed");
            return false;
        }
        let list: libloading::Symbol<'_, PluginActionsFn> =
            match unsafe { library.get(b"cxyPluginActions") } {
                Ok(symbol) => symbol,
                Err(error) => {
                    log.error(loc, format!("plugin exports no actions: {error}"));
                    return false;
                }
            };
        let mut count = 0usize;
        let table = unsafe { list(&mut count) };
        let mut actions = FxHashMap::default();
        for offset in 0..count {
            let entry = unsafe { &*table.add(offset) };
            let Some(func) = entry.func else { continue };
            let name = unsafe { CStr::from_ptr(entry.name) };
            match name.to_str() {
                Ok(name) => {
                    actions.insert(strings.intern(name), func);
                }
                Err(_) => {
                    log.error(loc, "plugin action name is not valid UTF-8");
                }
            }
        }
        drop(init);
        drop(list);
        self.plugins.insert(
            alias,
            LoadedPlugin {
                _library: library,
                actions,
            },
        );
        true
    }

    /// Dispatch `alias.action!(args)`; the action returns a fresh node or
    /// `u32::MAX` to signal failure.
    pub fn dispatch(
        &self,
        strings: &mut Interner,
        log: &mut Log,
        arena: &mut NodeArena,
        loc: FileLoc,
        alias: Atom,
        action: Atom,
        args: &[NodeIndex],
    ) -> Option<NodeIndex> {
        let plugin = match self.plugins.get(&alias) {
            Some(plugin) => plugin,
            None => {
                log.error(
                    loc,
                    format!("plugin '{}' is not loaded", strings.resolve(alias)),
                );
                return None;
            }
        };
        let Some(&func) = plugin.actions.get(&action) else {
            log.error(
                loc,
                format!(
                    "plugin '{}' has no action named '{}'",
                    strings.resolve(alias),
                    strings.resolve(action)
                ),
            );
            return None;
        };

        let mut host = HostState {
            strings,
            arena,
            loc,
        };
        let mut api = CxyPluginApi {
            state: (&mut host as *mut HostState<'_>).cast(),
            intern: host_intern,
            mk_ident: host_mk_ident,
            mk_integer: host_mk_integer,
            mk_string: host_mk_string,
        };
        let raw_args: Vec<u32> = args.iter().map(|a| a.0).collect();
        let result = unsafe { func(&mut api, raw_args.as_ptr(), raw_args.len()) };
        if result == u32::MAX {
            log.error(
                loc,
                format!(
                    "plugin action '{}' reported failure",
                    strings.resolve(action)
                ),
            );
            return None;
        }
        let node = NodeIndex(result);
        if node.index() >= arena.len() {
            log.error(loc, "plugin action returned an invalid node");
            return None;
        }
        Some(node)
    }
}

struct HostState<'a> {
    strings: &'a mut Interner,
    arena: &'a mut NodeArena,
    loc: FileLoc,
}

unsafe extern "C" fn host_intern(state: *mut c_void, text: *const c_char) -> u32 {
    let host = unsafe { &mut *state.cast::<HostState<'_>>() };
    let text = unsafe { CStr::from_ptr(text) };
    match text.to_str() {
        Ok(text) => host.strings.intern(text).0,
        Err(_) => Atom::DUMMY.0,
    }
}

unsafe extern "C" fn host_mk_ident(state: *mut c_void, atom: u32) -> u32 {
    let host = unsafe { &mut *state.cast::<HostState<'_>>() };
    host.arena.mk_ident(Atom(atom), host.loc).0
}

unsafe extern "C" fn host_mk_integer(state: *mut c_void, value: u64) -> u32 {
    let host = unsafe { &mut *state.cast::<HostState<'_>>() };
    host.arena.mk_int(value as u128, host.loc).0
}

unsafe extern "C" fn host_mk_string(state: *mut c_void, text: *const c_char) -> u32 {
    let host = unsafe { &mut *state.cast::<HostState<'_>>() };
    let text = unsafe { CStr::from_ptr(text) };
    let raw = match text.to_str() {
        Ok(text) => host.strings.intern(text),
        Err(_) => Atom::DUMMY,
    };
    host.arena
        .alloc_flagged(AstKind::StringLit { raw }, host.loc, NodeFlags::GENERATED)
        .0
}
