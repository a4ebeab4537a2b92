/// A cursor over the source text, used by the tokenizer.
pub mod stream;

/// The tokenizer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// A cursor over the token sequence, used by the parser.
pub mod token_stream;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The mid-level IR: modules, functions, basic blocks and the builder which
/// constructs them.
pub mod mir;

pub mod ast;
pub mod backend;
pub mod token;

pub mod util;

pub use parser::{parse_expr, parse_script, parse_statements, Error};
