//! Parser for the message template JSON grammar

pub mod ast;
mod grammar;
pub mod lenient;

pub use ast::*;
pub use grammar::{parse, parse_str, parse_value};
