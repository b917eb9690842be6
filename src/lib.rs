//! A TypeScript-subset to WebAssembly compiler front-end.
//!
//! The crate centers on [`compiler::program::Program`]: parse sources with
//! [`parse::parse_source`], add them to a program, call
//! [`compiler::program::Program::initialize`], then drive the resolver entry
//! points from later compilation passes.

pub mod compile;
pub mod compiler;
pub mod parse;
