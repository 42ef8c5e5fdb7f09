//! FScript: an embeddable, line-oriented scripting language.
//!
//! The host loads script lines into an [`Interpreter`], runs them, and extends
//! the language with its own variables, functions and indexed storage through
//! [`HostBridge`] and [`IndexedStore`].

pub mod config;
pub mod script;
pub mod source;

pub use config::Config;
pub use script::{
    ErrorKind, Extensions, HostBridge, HostError, HostValue, IndexedStore, Interpreter, MapStore,
    ScriptError, Value, ValueKind,
};
pub use source::{LineCursor, LoadError, ScriptSource};
