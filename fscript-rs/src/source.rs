//! Script line storage.
//!
//! The interpreter never sees a script as one string: it asks a
//! [`LineCursor`] for individual lines and moves the cursor around as control
//! flow demands.  Line numbers are 0-based here; diagnostics add one.

use std::path::Path;

use thiserror::Error;

/// Random-access, line-addressed script text.
pub trait LineCursor {
    /// Line the cursor is on.
    fn current_line(&self) -> usize;

    /// Text of line `n`, or `""` past the end.
    fn line_text(&self, n: usize) -> &str;

    /// Move the cursor to line `n`.
    fn seek(&mut self, n: usize);

    fn line_count(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Unbalanced { line: usize, reason: String },
}

// ── ScriptSource ──────────────────────────────────────────────────────────────

/// In-memory [`LineCursor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSource {
    lines: Vec<String>,
    cur: usize,
}

impl ScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `text` into lines.
    pub fn from_text(text: &str) -> Self {
        ScriptSource {
            lines: text.lines().map(str::to_owned).collect(),
            cur: 0,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    /// Append one line; returns its index.
    pub fn push_line(&mut self, text: impl Into<String>) -> usize {
        self.lines.push(text.into());
        self.lines.len() - 1
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.cur = 0;
    }
}

impl From<&str> for ScriptSource {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl LineCursor for ScriptSource {
    fn current_line(&self) -> usize {
        self.cur
    }

    fn line_text(&self, n: usize) -> &str {
        self.lines.get(n).map_or("", String::as_str)
    }

    fn seek(&mut self, n: usize) {
        self.cur = n;
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Check that string quotes are closed and `()`/`[]` nest properly on one
/// line.  Text after a `#` outside a string is ignored.
pub fn check_line(text: &str) -> Result<(), String> {
    let mut stack: Vec<char> = Vec::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => {
                        chars.next();
                    }
                    Some(_) => {}
                    None => return Err("unterminated string".to_owned()),
                }
            },
            '#' => break,
            '(' | '[' => stack.push(c),
            ')' | ']' => {
                let open = if c == ')' { '(' } else { '[' };
                if stack.pop() != Some(open) {
                    return Err(format!("unbalanced '{c}'"));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(format!("unclosed '{open}'")),
        None => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
