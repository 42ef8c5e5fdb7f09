//! Host integration points.
//!
//! Anything a script names that it did not declare itself is forwarded to a
//! [`HostBridge`]: unknown variables are read and written through
//! `get_var`/`set_var`, unknown functions go to `call`.  Indexed access
//! (`name[i]`) always goes to a separately injected [`IndexedStore`].
//!
//! [`Extensions`] is the usual bridge: it holds host functions and variables
//! registered by name and falls through to any number of chained bridges.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use super::scope::Scope;
use super::value::Value;

/// Evaluated call arguments.
pub type Args = SmallVec<[Value; 4]>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("Unrecognised variable {0}")]
    UnresolvedVariable(String),
    #[error("Unrecognised function {0}")]
    UnresolvedFunction(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

impl HostError {
    /// `true` if the bridge simply does not know the name, so the next one in
    /// a chain may be asked.
    pub fn is_unresolved(&self) -> bool {
        !matches!(self, HostError::Failed(_))
    }
}

// ── HostBridge ────────────────────────────────────────────────────────────────

/// Host-side variables and functions.  Every method defaults to "unresolved".
pub trait HostBridge {
    fn get_var(&mut self, name: &str) -> Result<Value, HostError> {
        Err(HostError::UnresolvedVariable(name.to_owned()))
    }

    fn set_var(&mut self, name: &str, _value: Value) -> Result<(), HostError> {
        Err(HostError::UnresolvedVariable(name.to_owned()))
    }

    /// Run a host function.  `scope` is the interpreter's live scope, so the
    /// callee sees the innermost script frame.  `Ok(None)` means the function
    /// produced no value.
    fn call(
        &mut self,
        name: &str,
        _args: &[Value],
        _scope: &mut Scope,
    ) -> Result<Option<Value>, HostError> {
        Err(HostError::UnresolvedFunction(name.to_owned()))
    }
}

/// A bridge that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostBridge for NoHost {}

// ── IndexedStore ──────────────────────────────────────────────────────────────

/// Backing storage for `name[index]` reads and writes.
pub trait IndexedStore {
    fn get_index(&mut self, name: &str, index: &Value) -> Result<Value, HostError>;
    fn set_index(&mut self, name: &str, index: &Value, value: Value) -> Result<(), HostError>;
}

/// In-memory [`IndexedStore`]: one map per array name, keyed by the index's
/// textual form, so `a[1]` and `a["1"]` are the same slot.
#[derive(Debug, Clone, Default)]
pub struct MapStore {
    arrays: FxHashMap<String, FxHashMap<String, Value>>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements stored under `name`.
    pub fn len(&self, name: &str) -> usize {
        self.arrays.get(name).map_or(0, |a| a.len())
    }

    pub fn get(&self, name: &str, index: &Value) -> Option<&Value> {
        self.arrays.get(name)?.get(&index.to_string())
    }
}

impl IndexedStore for MapStore {
    fn get_index(&mut self, name: &str, index: &Value) -> Result<Value, HostError> {
        let array = self
            .arrays
            .get(name)
            .ok_or_else(|| HostError::UnresolvedVariable(name.to_owned()))?;
        array
            .get(&index.to_string())
            .cloned()
            .ok_or_else(|| HostError::Failed(format!("No element {name}[{index}]")))
    }

    fn set_index(&mut self, name: &str, index: &Value, value: Value) -> Result<(), HostError> {
        self.arrays
            .entry(name.to_owned())
            .or_default()
            .insert(index.to_string(), value);
        Ok(())
    }
}

/// Shared handle, so the host keeps access to a store it has handed over.
impl<T: IndexedStore> IndexedStore for Rc<RefCell<T>> {
    fn get_index(&mut self, name: &str, index: &Value) -> Result<Value, HostError> {
        self.borrow_mut().get_index(name, index)
    }

    fn set_index(&mut self, name: &str, index: &Value, value: Value) -> Result<(), HostError> {
        self.borrow_mut().set_index(name, index, value)
    }
}

impl<T: HostBridge> HostBridge for Rc<RefCell<T>> {
    fn get_var(&mut self, name: &str) -> Result<Value, HostError> {
        self.borrow_mut().get_var(name)
    }

    fn set_var(&mut self, name: &str, value: Value) -> Result<(), HostError> {
        self.borrow_mut().set_var(name, value)
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Value],
        scope: &mut Scope,
    ) -> Result<Option<Value>, HostError> {
        self.borrow_mut().call(name, args, scope)
    }
}

// ── Extensions ────────────────────────────────────────────────────────────────

/// Host function signature used by [`Extensions::register_fn`].
pub type HostFn = Box<dyn FnMut(&[Value], &mut Scope) -> Result<Option<Value>, HostError>>;

/// Registry of named host functions and variables, backed by a chain of
/// further bridges that are asked in order.
#[derive(Default)]
pub struct Extensions {
    functions: FxHashMap<String, HostFn>,
    vars: FxHashMap<String, Value>,
    chain: Vec<Box<dyn HostBridge>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bridge` to the fallback chain.
    pub fn with_bridge(mut self, bridge: impl HostBridge + 'static) -> Self {
        self.add_bridge(bridge);
        self
    }

    pub fn add_bridge(&mut self, bridge: impl HostBridge + 'static) {
        self.chain.push(Box::new(bridge));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnMut(&[Value], &mut Scope) -> Result<Option<Value>, HostError> + 'static,
    {
        self.functions.insert(name.into(), Box::new(f));
    }

    pub fn register_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

impl HostBridge for Extensions {
    fn get_var(&mut self, name: &str) -> Result<Value, HostError> {
        if let Some(v) = self.vars.get(name) {
            return Ok(v.clone());
        }
        for bridge in &mut self.chain {
            match bridge.get_var(name) {
                Err(e) if e.is_unresolved() => continue,
                other => return other,
            }
        }
        Err(HostError::UnresolvedVariable(name.to_owned()))
    }

    fn set_var(&mut self, name: &str, value: Value) -> Result<(), HostError> {
        if let Some(slot) = self.vars.get_mut(name) {
            *slot = slot
                .coerce_assign(value, true)
                .map_err(|e| HostError::Failed(e.to_string()))?;
            return Ok(());
        }
        for bridge in &mut self.chain {
            match bridge.set_var(name, value.clone()) {
                Err(e) if e.is_unresolved() => continue,
                other => return other,
            }
        }
        Err(HostError::UnresolvedVariable(name.to_owned()))
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Value],
        scope: &mut Scope,
    ) -> Result<Option<Value>, HostError> {
        if let Some(f) = self.functions.get_mut(name) {
            debug!(function = name, args = args.len(), "registered host function");
            return f(args, scope);
        }
        for bridge in &mut self.chain {
            match bridge.call(name, args, scope) {
                Err(e) if e.is_unresolved() => continue,
                other => return other,
            }
        }
        Err(HostError::UnresolvedFunction(name.to_owned()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
