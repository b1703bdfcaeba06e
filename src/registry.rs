//! Process-wide table of named packed functions
//!
//! The debug create entry points are installed the first time the table is
//! touched. Registration is idempotent per name: a second registration of
//! the same name is ignored unless the caller asks to override.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::debug::create::builtin_functions;
use crate::error::DebugResult;
use crate::packed::PackedFunc;

static GLOBAL_REGISTRY: Lazy<RwLock<HashMap<String, PackedFunc>>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for (name, func) in builtin_functions() {
        table.insert(name.to_string(), func);
    }
    RwLock::new(table)
});

/// Register `func` under `name`
///
/// Returns `true` when the table changed. An existing entry is kept
/// (returning `false`) unless `allow_override` is set.
pub fn register_global(name: &str, func: PackedFunc, allow_override: bool) -> DebugResult<bool> {
    let mut table = GLOBAL_REGISTRY.write()?;
    if table.contains_key(name) && !allow_override {
        debug!("global function '{}' already registered, keeping existing entry", name);
        return Ok(false);
    }
    if table.insert(name.to_string(), func).is_some() {
        warn!("global function '{}' overridden", name);
    }
    Ok(true)
}

pub fn get_global(name: &str) -> DebugResult<Option<PackedFunc>> {
    Ok(GLOBAL_REGISTRY.read()?.get(name).cloned())
}

/// Registered names, sorted
pub fn list_global_names() -> DebugResult<Vec<String>> {
    let mut names: Vec<String> = GLOBAL_REGISTRY.read()?.keys().cloned().collect();
    names.sort();
    Ok(names)
}

pub fn remove_global(name: &str) -> DebugResult<bool> {
    Ok(GLOBAL_REGISTRY.write()?.remove(name).is_some())
}

/// (Re-)install the builtin entry points without touching other entries
pub fn register_builtins() -> DebugResult<()> {
    for (name, func) in builtin_functions() {
        register_global(name, func, false)?;
    }
    Ok(())
}

/// Drain the table; returns the number of entries dropped
pub fn shutdown() -> DebugResult<usize> {
    let mut table = GLOBAL_REGISTRY.write()?;
    let count = table.len();
    table.clear();
    debug!("global registry drained ({} entries)", count);
    Ok(count)
}
