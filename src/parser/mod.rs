//! Lexing and parsing for colormap scripts.
//!
//! A script is a sequence of statements:
//!
//! ```text
//! alpha allow;
//! $threshold = 3 / 180;
//! on hsv pixels having ($h in 0 .. $threshold) | ($h in 1 - $threshold .. 1) do
//!     $v *= 0.5;
//!     using rgb:
//!         $alpha = 0.5;
//! end;
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use colormap::parser::{parse, tokenize_strict};
//!
//! let tokens = tokenize_strict("$lorem = 1.45;")?;
//! let program = parse(&tokens)?;
//! ```

pub mod ast;
mod diagnostic;
mod grammar;
pub mod span;
mod token;

pub use ast::{
    ActionBlock, AlphaPolicy, Assignment, BinaryOp, Expr, Primitive, Program, Rule, Shape,
    Statement, Target, UnaryOp, VectorLengths,
};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use grammar::{parse, parse_expression, Parser};
pub use span::{Location, Span};
pub use token::{tokenize, tokenize_strict, Keyword, Lexed, Lexer, Token, TokenKind, SPACE_NAMES};
