//! Script failures and the diagnostic context attached to them.

use std::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Broad category of a script failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ErrorKind {
    /// Malformed tokens or statements.
    Syntax,
    /// Unbalanced or misplaced block keywords.
    Structural,
    /// Type errors, redeclarations, bad calls.
    Semantic,
    /// A host variable, function or store refused or failed.
    Delegation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Structural => "structure error",
            ErrorKind::Semantic => "semantic error",
            ErrorKind::Delegation => "host error",
        })
    }
}

/// Where execution stood when an error was raised.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ErrorContext {
    /// 1-based line number; `None` for ad-hoc lines.
    pub line: Option<usize>,
    pub line_text: String,
    /// Neighbouring lines as `(line number, text)`, the failing line included.
    pub surrounding: Vec<(usize, String)>,
    /// Text of the token being examined.
    pub token: String,
    /// Bindings of the innermost frame, sorted by name.
    pub locals: Vec<(String, String)>,
    /// Global bindings; only filled in when the failure happened inside a call.
    pub globals: Vec<(String, String)>,
}

/// A fatal script failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Box<ErrorContext>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ScriptError {
            kind,
            message: message.into(),
            context: Box::default(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.context.line
    }

    /// Multi-line human-readable report: message, source excerpt, bindings.
    pub fn report(&self) -> String {
        let ctx = &self.context;
        let mut out = match ctx.line {
            Some(n) => format!("{self} at line {n}\n"),
            None => format!("{self}\n"),
        };
        if ctx.surrounding.is_empty() {
            if !ctx.line_text.is_empty() {
                out.push_str(&format!("  > {}\n", ctx.line_text));
            }
        } else {
            for (n, text) in &ctx.surrounding {
                let marker = if Some(*n) == ctx.line { '>' } else { ' ' };
                out.push_str(&format!("{marker}{n:>5} | {text}\n"));
            }
        }
        if !ctx.token.is_empty() {
            out.push_str(&format!("  at token: {}\n", ctx.token));
        }
        push_bindings(&mut out, "locals", &ctx.locals);
        push_bindings(&mut out, "globals", &ctx.globals);
        out
    }
}

fn push_bindings(out: &mut String, title: &str, vars: &[(String, String)]) {
    if vars.is_empty() {
        return;
    }
    out.push_str(title);
    out.push_str(":\n");
    for (name, value) in vars {
        out.push_str(&format!("  {name} = {value}\n"));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
