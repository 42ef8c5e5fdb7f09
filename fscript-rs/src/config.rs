//! Interpreter settings.
//!
//! Settings can be built in code with the `with_*` methods or read from a
//! small settings text:
//!
//! | Line | Action |
//! |------|--------|
//! | `context_lines = <n>` | lines shown either side of a failing line |
//! | `validate_lines = true\|false` | check quote/bracket balance on load |
//! | Lines starting with `;` or blank | ignored |

use std::path::Path;

use thiserror::Error;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal problem on one line of a settings text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Source lines captured either side of the failing line in diagnostics.
    pub context_lines: usize,
    /// Reject lines with unbalanced quotes or brackets at load time.
    pub validate_lines: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            context_lines: 2,
            validate_lines: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_lines(mut self, n: usize) -> Self {
        self.context_lines = n;
        self
    }

    pub fn with_validate_lines(mut self, on: bool) -> Self {
        self.validate_lines = on;
        self
    }

    /// Parse a settings text.
    ///
    /// Bad lines are reported and skipped; the returned config keeps the
    /// defaults for anything not set.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Err(message) = config.apply(line) {
                errors.push(ConfigError {
                    line: i + 1,
                    message,
                });
            }
        }
        (config, errors)
    }

    /// Read and parse a settings file.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&text))
    }

    fn apply(&mut self, line: &str) -> Result<(), String> {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("expected `name = value`, got `{line}`"))?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "context_lines" => {
                self.context_lines = value
                    .parse()
                    .map_err(|_| format!("context_lines: not a number: {value}"))?;
            }
            "validate_lines" => {
                self.validate_lines = parse_bool(value)
                    .ok_or_else(|| format!("validate_lines: not a boolean: {value}"))?;
            }
            other => return Err(format!("unknown setting `{other}`")),
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.context_lines, 2);
        assert!(c.validate_lines);
    }

    #[test]
    fn builder() {
        let c = Config::new().with_context_lines(0).with_validate_lines(false);
        assert_eq!(c.context_lines, 0);
        assert!(!c.validate_lines);
    }

    #[test]
    fn load_str_sets_values() {
        let (c, errs) = Config::load_str("; diagnostics\ncontext_lines = 5\n\nvalidate_lines=off\n");
        assert!(errs.is_empty());
        assert_eq!(c.context_lines, 5);
        assert!(!c.validate_lines);
    }

    #[test]
    fn load_str_reports_bad_lines() {
        let (c, errs) = Config::load_str("context_lines = many\nbogus = 1\nno equals sign");
        assert_eq!(c, Config::default());
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0].line, 1);
        assert_eq!(errs[1].to_string(), "line 2: unknown setting `bogus`");
    }

    #[test]
    fn load_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fscript.conf");
        std::fs::write(&path, "context_lines = 1\n").unwrap();
        let (c, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(c.context_lines, 1);
    }
}
