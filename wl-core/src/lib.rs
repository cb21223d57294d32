//! Core pipeline for the WL language toolchain.
//!
//! The pipeline is roughly:
//!
//!   source .wl
//!     -> lexer      (tokens)
//!     -> parser     (AST)
//!     -> loader     (import graph)
//!     -> check      (modules, scopes, typed HIR)
//!     -> lower      (extern -> inlineC wrappers)
//!     -> codegen_c  (C text)
//!
//! Higher-level tools (CLI, REPL) should depend on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod source;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;
pub mod loader;

// ---------------------------------------------------------------------
// Semantic layers: types, modules, checking, HIR
// ---------------------------------------------------------------------

pub mod types;
pub mod module;
pub mod check;
pub mod hir;
pub mod lower;

// ---------------------------------------------------------------------
// Back-end: code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen_c;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::Compiler;
pub use diagnostic::Diagnostic;
pub use error::CoreError;
pub use source::{FileId, Position, SourceMap};
