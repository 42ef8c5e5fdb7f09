//! Variable frames and the script function table.
//!
//! Frame 0 holds the globals.  Each script call pushes a frame that sees only
//! its own bindings and the globals; the caller's locals stay hidden.  Host
//! callbacks get `&mut Scope` and so read and write through the innermost
//! frame exactly like script code does.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::value::{Incompatible, Value, ValueKind};

// ── FunctionDef ───────────────────────────────────────────────────────────────

/// A script function: its signature and the source lines of its body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<(ValueKind, String)>,
    /// Line holding the `function` header.
    pub start: usize,
    /// Line holding `endfunction`.
    pub end: usize,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("Already defined in this scope: {0}")]
    AlreadyDefined(String),
    #[error("{source} (variable {name})")]
    Incompatible {
        name: String,
        #[source]
        source: Incompatible,
    },
}

/// Outcome of [`Scope::assign`].
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Stored,
    /// No frame binds the name; the value is handed back for the host.
    Unbound(Value),
}

// ── Frame ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Frame {
    vars: FxHashMap<String, Value>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, failing if this frame already has it.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), ScopeError> {
        if self.vars.contains_key(name) {
            return Err(ScopeError::AlreadyDefined(name.to_owned()));
        }
        self.vars.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bindings rendered as text, sorted by name.
    pub fn dump(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), format!("{v} ({})", v.type_name())))
            .collect();
        out.sort();
        out
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
    functions: FxHashMap<String, Rc<FunctionDef>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::new()],
            functions: FxHashMap::default(),
        }
    }

    /// Number of active script calls.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn innermost(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn innermost_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn globals(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn locals(&self) -> &Frame {
        self.innermost()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Drop the innermost call frame.  The globals frame is never popped.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    // ── Bindings ─────────────────────────────────────────────────────────────

    /// Declare `name` in the innermost frame.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), ScopeError> {
        self.innermost_mut().declare(name, value)
    }

    /// Declare `name` in the globals frame.
    pub fn declare_global(&mut self, name: &str, value: Value) -> Result<(), ScopeError> {
        self.frames[0].declare(name, value)
    }

    /// Innermost frame first, then the globals.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.innermost().get(name).or_else(|| self.frames[0].get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overwrite an existing binding.
    ///
    /// The innermost frame applies the `object` wrapper rule (see
    /// [`Value::coerce_assign`]); the globals seen from inside a call demand
    /// an exact type match.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<Assignment, ScopeError> {
        let depth = self.depth();
        let (frame, wrap) = if self.innermost().get(name).is_some() {
            (depth, true)
        } else if self.frames[0].get(name).is_some() {
            (0, false)
        } else {
            return Ok(Assignment::Unbound(value));
        };
        let slot = self.frames[frame]
            .vars
            .get_mut(name)
            .ok_or_else(|| ScopeError::AlreadyDefined(name.to_owned()))?;
        let stored = slot
            .coerce_assign(value, wrap)
            .map_err(|source| ScopeError::Incompatible {
                name: name.to_owned(),
                source,
            })?;
        *slot = stored;
        Ok(Assignment::Stored)
    }

    /// Drop every binding and any active call frames.
    pub fn clear_bindings(&mut self) {
        self.frames.truncate(1);
        self.frames[0].vars.clear();
    }

    // ── Functions ────────────────────────────────────────────────────────────

    /// Record `def`, replacing any function of the same name.
    pub fn define_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), Rc::new(def));
    }

    pub fn function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    /// Names of all defined script functions, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
