//! Lexical analysis for the vanarize language.
//!
//! A single-pass scanner that turns source text into a flat stream of
//! [`Token`]s. The lexer has no lookahead of its own; the parser
//! (`vanarize-par`) keeps one token of lookahead on top of it.

pub mod cursor;
pub mod lexer;
pub mod token;

pub use cursor::LexerCheckpoint;
pub use lexer::Lexer;
pub use token::{Token, TokenKind};
