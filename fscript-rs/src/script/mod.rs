//! The FScript language.
//!
//! A small line-oriented imperative language meant to be embedded in a host
//! program:
//!
//! - Typed variables: `int`, `double`, `string` and `object` (a host value)
//! - Arithmetic, comparison and logical expressions
//! - Control flow: `if` … `elsif` … `else` … `endif`, `while` … `endwhile`
//! - Functions: `function name(int a, string b)` … `return` … `endfunction`
//! - Anything the script does not define is resolved through a
//!   [`HostBridge`]; `name[i]` goes to an [`IndexedStore`]
//!
//! # Quick start
//!
//! ```rust
//! use fscript::script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.load_str("int x = 6\nreturn x * 7").unwrap();
//! assert_eq!(interp.run().unwrap(), Some(Value::Int(42)));
//! ```

pub mod error;
pub mod expr;
pub mod host;
pub mod interp;
pub mod lexer;
pub mod scope;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use error::{ErrorContext, ErrorKind, ScriptError};
pub use host::{Args, Extensions, HostBridge, HostError, IndexedStore, MapStore, NoHost};
pub use interp::Interpreter;
pub use scope::{FunctionDef, Scope};
pub use value::{HostValue, Value, ValueKind};
