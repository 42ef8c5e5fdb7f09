//! FScript interpreter.
//!
//! The [`Interpreter`] owns the script lines (through a [`LineCursor`]), the
//! lexer positioned somewhere inside them, the variable [`Scope`] and the host
//! bridge.  There is no program-wide syntax tree: statements are parsed and
//! executed in one pass, and control flow works by moving the cursor.  A
//! `while` loop seeks back to its header line and re-lexes it on every
//! iteration; a script function call saves the position, runs the body's line
//! range and restores the position afterwards.
//!
//! Statement handling lives in [`stmt`](super::stmt), expression handling in
//! [`expr`](super::expr); both are `impl Interpreter` blocks over the state
//! declared here.

use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::source::{check_line, LineCursor, LoadError, ScriptSource};
use super::{
    error::{ErrorContext, ErrorKind, ScriptError},
    host::{Args, HostBridge, HostError, IndexedStore, NoHost},
    lexer::{Lexer, Token},
    scope::{Assignment, Frame, Scope},
    value::Value,
};

// ── Unwinding ─────────────────────────────────────────────────────────────────

/// Non-local exits.  `Return` never leaves the interpreter as an error.
#[derive(Debug)]
pub(super) enum Unwind {
    Error(Box<ScriptError>),
    Return(Option<Value>),
}

impl Unwind {
    fn into_error(self) -> ScriptError {
        match self {
            Unwind::Error(e) => *e,
            Unwind::Return(_) => ScriptError::new(ErrorKind::Structural, "return outside of a call"),
        }
    }
}

pub(super) type Exec<T> = Result<T, Unwind>;

/// Program-position register saved across a script function call.
struct Position {
    line: usize,
    range_end: Option<usize>,
    lexer: Lexer,
    tok: Token,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// An FScript interpreter over any [`LineCursor`].
pub struct Interpreter<C: LineCursor = ScriptSource> {
    pub(super) source: C,
    pub(super) lexer: Lexer,
    /// Token under examination.
    pub(super) tok: Token,
    /// Last line of the range being executed; `None` while running an ad-hoc
    /// line, where end-of-line is also end-of-stream.
    pub(super) range_end: Option<usize>,
    pub(super) scope: Scope,
    pub(super) host: Box<dyn HostBridge>,
    pub(super) store: Option<Box<dyn IndexedStore>>,
    pub(super) config: Config,
}

impl Default for Interpreter<ScriptSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter<ScriptSource> {
    pub fn new() -> Self {
        Self::with_source(ScriptSource::new())
    }

    /// Append the lines of `text` to the script.
    ///
    /// With [`Config::validate_lines`] set, every line is checked first and
    /// nothing is appended if any line is unbalanced.
    pub fn load_str(&mut self, text: &str) -> Result<(), LoadError> {
        if self.config.validate_lines {
            let base = self.source.len();
            for (i, line) in text.lines().enumerate() {
                check_line(line).map_err(|reason| LoadError::Unbalanced {
                    line: base + i + 1,
                    reason,
                })?;
            }
        }
        for line in text.lines() {
            self.source.push_line(line);
        }
        Ok(())
    }

    /// Append one line to the script.
    pub fn load_line(&mut self, line: &str) -> Result<(), LoadError> {
        if self.config.validate_lines {
            check_line(line).map_err(|reason| LoadError::Unbalanced {
                line: self.source.len() + 1,
                reason,
            })?;
        }
        self.source.push_line(line);
        Ok(())
    }

    /// Append the lines of a script file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), LoadError> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }
}

impl<C: LineCursor> Interpreter<C> {
    pub fn with_source(source: C) -> Self {
        Interpreter {
            source,
            lexer: Lexer::new(),
            tok: Token::Eol,
            range_end: None,
            scope: Scope::new(),
            host: Box::new(NoHost),
            store: None,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_host(mut self, host: impl HostBridge + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_store(mut self, store: impl IndexedStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut C {
        &mut self.source
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    // ── Execution ────────────────────────────────────────────────────────────

    /// Run the whole script from its first line.  Returns the value of a
    /// top-level `return`, if one was executed.
    pub fn run(&mut self) -> Result<Option<Value>, ScriptError> {
        let end = self.source.line_count().saturating_sub(1);
        self.execute_range(0, end).map_err(Unwind::into_error)
    }

    /// Execute one line that is not part of the script.  Functions defined by
    /// the loaded script may be called from it.
    pub fn run_line(&mut self, text: &str) -> Result<Option<Value>, ScriptError> {
        if self.config.validate_lines {
            if let Err(reason) = check_line(text) {
                let mut err = ScriptError::new(ErrorKind::Syntax, reason);
                err.context.line_text = text.to_owned();
                return Err(err);
            }
        }
        let saved = self.save_position();
        self.range_end = None;
        self.lexer.set_line(text);
        let result = self.lex().and_then(|tok| {
            self.tok = tok;
            self.execute_current()
        });
        self.restore_position(saved);
        result.map_err(Unwind::into_error)
    }

    /// Invoke a script function (or, failing that, a host function) by name.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, ScriptError> {
        let args: Args = args.iter().cloned().collect();
        self.call(name, args).map_err(Unwind::into_error)
    }

    /// Execute lines `from..=to` as a block of statements.
    pub(super) fn execute_range(&mut self, from: usize, to: usize) -> Exec<Option<Value>> {
        if from >= self.source.line_count() {
            return Ok(None);
        }
        self.range_end = Some(to);
        self.source.seek(from);
        let text = self.source.line_text(from).to_owned();
        self.lexer.set_line(&text);
        self.tok = self.lex()?;
        self.execute_current()
    }

    /// Statement loop from the current token to end-of-stream.
    fn execute_current(&mut self) -> Exec<Option<Value>> {
        while self.tok != Token::Eof {
            match self.statement() {
                Ok(()) => {}
                Err(Unwind::Return(v)) => return Ok(v),
                Err(e) => return Err(e),
            }
            self.advance()?;
        }
        Ok(None)
    }

    // ── Variables ────────────────────────────────────────────────────────────

    /// Read a variable: script scope first, then the host.
    pub fn get_var(&mut self, name: &str) -> Result<Value, ScriptError> {
        self.read_var(name).map_err(Unwind::into_error)
    }

    /// Assign an existing variable: script scope first, then the host.
    pub fn set_var(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.store_var(name, Some(value)).map_err(Unwind::into_error)
    }

    /// `true` if the script scope binds `name`.  Host variables are not asked.
    pub fn has_var(&self, name: &str) -> bool {
        self.scope.contains(name)
    }

    /// Create a global variable from the host side.
    pub fn declare_global(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.scope
            .declare_global(name, value)
            .map_err(|e| ScriptError::new(ErrorKind::Semantic, e.to_string()))
    }

    /// Forget every variable.  Function definitions and loaded lines stay.
    pub fn reset(&mut self) {
        self.scope.clear_bindings();
    }

    /// Names of the script functions defined so far.
    pub fn functions(&self) -> Vec<String> {
        self.scope.function_names()
    }

    pub(super) fn read_var(&mut self, name: &str) -> Exec<Value> {
        if let Some(v) = self.scope.get(name) {
            return Ok(v.clone());
        }
        debug!(variable = name, "host variable read");
        let result = self.host.get_var(name);
        result.map_err(|e| self.delegation(e))
    }

    pub(super) fn store_var(&mut self, name: &str, value: Option<Value>) -> Exec<()> {
        let Some(value) = value else {
            return Err(self.fail(
                ErrorKind::Semantic,
                format!("set variable {name} with null value"),
            ));
        };
        let outcome = self.scope.assign(name, value);
        match outcome {
            Ok(Assignment::Stored) => Ok(()),
            Ok(Assignment::Unbound(value)) => {
                debug!(variable = name, "host variable write");
                let result = self.host.set_var(name, value);
                result.map_err(|e| self.delegation(e))
            }
            Err(e) => Err(self.fail(ErrorKind::Semantic, e.to_string())),
        }
    }

    pub(super) fn read_index(&mut self, name: &str, index: &Value) -> Exec<Value> {
        let result = match self.store.as_mut() {
            Some(store) => store.get_index(name, index),
            None => Err(HostError::Unsupported(format!("indexed access to {name}"))),
        };
        result.map_err(|e| self.delegation(e))
    }

    pub(super) fn write_index(&mut self, name: &str, index: &Value, value: Value) -> Exec<()> {
        let result = match self.store.as_mut() {
            Some(store) => store.set_index(name, index, value),
            None => Err(HostError::Unsupported(format!("indexed access to {name}"))),
        };
        result.map_err(|e| self.delegation(e))
    }

    // ── Calls ────────────────────────────────────────────────────────────────

    /// Call a script function, or hand the call to the host if no script
    /// function has that name.
    pub(super) fn call(&mut self, name: &str, args: Args) -> Exec<Option<Value>> {
        let Some(def) = self.scope.function(name) else {
            debug!(function = name, args = args.len(), "host call");
            let result = self.host.call(name, &args, &mut self.scope);
            return result.map_err(|e| self.delegation(e));
        };

        if def.params.len() != args.len() {
            return Err(self.fail(
                ErrorKind::Semantic,
                format!(
                    "Expected {} parameters, Found {}",
                    def.params.len(),
                    args.len()
                ),
            ));
        }
        let mut frame = Frame::new();
        for ((_, param), arg) in def.params.iter().zip(args) {
            frame
                .declare(param, arg)
                .map_err(|e| self.fail(ErrorKind::Semantic, e.to_string()))?;
        }

        let depth = self.scope.depth() + 1;
        debug!(function = name, depth, "call");
        let saved = self.save_position();
        self.scope.push_frame(frame);
        let result = self.execute_range(def.start + 1, def.end);
        self.scope.pop_frame();
        self.restore_position(saved);
        debug!(function = name, depth, ok = result.is_ok(), "return");
        result
    }

    fn save_position(&self) -> Position {
        Position {
            line: self.source.current_line(),
            range_end: self.range_end,
            lexer: self.lexer.clone(),
            tok: self.tok.clone(),
        }
    }

    fn restore_position(&mut self, pos: Position) {
        self.source.seek(pos.line);
        self.range_end = pos.range_end;
        self.lexer = pos.lexer;
        self.tok = pos.tok;
    }

    // ── Tokens ───────────────────────────────────────────────────────────────

    /// Next token from the current line.
    pub(super) fn lex(&mut self) -> Exec<Token> {
        let result = self.lexer.next_token();
        result.map_err(|e| self.fail(ErrorKind::Syntax, e.to_string()))
    }

    /// Move to the next token.  At end-of-line this steps onto the next line
    /// of the range, or yields end-of-stream when the range is used up.
    pub(super) fn advance(&mut self) -> Exec<()> {
        if self.tok == Token::Eof {
            return Ok(());
        }
        if self.tok != Token::Eol {
            self.tok = self.lex()?;
            return Ok(());
        }
        match self.range_end {
            Some(end) if self.source.current_line() < end => {
                let next = self.source.current_line() + 1;
                self.source.seek(next);
                let text = self.source.line_text(next).to_owned();
                self.lexer.set_line(&text);
                self.tok = self.lex()?;
            }
            _ => self.tok = Token::Eof,
        }
        Ok(())
    }

    /// Current line number for logging, 1-based.
    pub(super) fn line_no(&self) -> Option<usize> {
        self.range_end.map(|_| self.source.current_line() + 1)
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    pub(super) fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> Unwind {
        let mut err = ScriptError::new(kind, message);
        *err.context = self.context();
        Unwind::Error(Box::new(err))
    }

    pub(super) fn delegation(&self, e: HostError) -> Unwind {
        self.fail(ErrorKind::Delegation, e.to_string())
    }

    fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext {
            token: self.tok.to_string(),
            locals: self.scope.locals().dump(),
            ..ErrorContext::default()
        };
        if self.scope.depth() > 0 {
            ctx.globals = self.scope.globals().dump();
        }
        if self.range_end.is_none() {
            ctx.line_text = self.lexer.line().to_owned();
            return ctx;
        }
        let cur = self.source.current_line();
        let n = self.config.context_lines;
        let last = (cur + n).min(self.source.line_count().saturating_sub(1)).max(cur);
        ctx.line = Some(cur + 1);
        ctx.line_text = self.source.line_text(cur).to_owned();
        ctx.surrounding = (cur.saturating_sub(n)..=last)
            .map(|i| (i + 1, self.source.line_text(i).to_owned()))
            .collect();
        ctx
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
