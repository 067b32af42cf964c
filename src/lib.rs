#![warn(clippy::all)]

//! weft — a small bytecode-compiled text-template engine.
//!
//! A template is lexed, lowered to a flat array of packed fixed-width
//! instructions with a constant pool, and evaluated by a loop/register VM
//! against a dynamically-typed context tree. Compiled programs round-trip
//! through a versioned little-endian container and can be cached in a
//! byte-bounded LRU keyed by template source.
//!
//! The template surface is deliberately narrow: interpolation
//! (`{{ .path }}`), iteration (`{{range .seq}}...{{end}}`), and built-in
//! function calls (`{{upper(.name)}}`). No conditionals, no arithmetic,
//! no assignment.
//!
//! ```
//! use weft::{Engine, Value};
//!
//! let engine = Engine::new();
//! let context = Value::from(serde_json::json!({ "name": "World" }));
//! let out = engine.execute("Hello, {{ .name }}!", &context).unwrap();
//! assert_eq!(out, "Hello, World!");
//! ```

pub mod bytecode;
pub mod compiler;
pub mod diagnostic;
pub mod engine;
pub mod lexer;
pub mod lru;
pub mod value;
pub mod vm;

pub use engine::{Engine, Error};
pub use value::Value;
