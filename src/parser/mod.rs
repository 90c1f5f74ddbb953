//! Query text parsing.
//!
//! The grammar lives in `grammar.pest`; [`parse_query`] turns text into the
//! AST defined in [`ast`].

pub mod ast;
mod grammar;

pub use grammar::parse_query;
