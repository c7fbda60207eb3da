//! An embeddable interpreter for small shell-like scripts that may come
//! from untrusted sources.
//!
//! The host decides which commands, control structures and expansions exist
//! by registering [`CallHandler`]s; the interpreter provides the grammar,
//! evaluation order, dynamic scoping and resource limits.

mod parser;
pub use parser::tokenizer::{
    tokenize_string, ParserState, Token, TokenType, Tokenizer, TokenizerOptions,
};
pub use parser::{
    parse, parse_interactive, parse_with, Ast, Error as ParseError, ErrorKind as ParseErrorKind,
    Locatable, Location, Node, NodeType, Span, DEFAULT_MAX_NESTING,
};

mod interpreter;
pub use interpreter::value::{self, Number, Value};
pub use interpreter::{
    builtins, CallContext, CallHandler, CallKind, CallResult, CallbackHandler,
    ErrorKind as RuntimeErrorKind, HandlerChain, Interpreter, InterpreterContext, Limits, Registry,
    RuntimeError, ScopeFrame, ScopeStack, TraceFrame,
};

/// Any failure a script can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    /// Human-readable report pointing into `source`.
    pub fn render(&self, source: &str) -> String {
        match self {
            Error::Parse(e) => e.render(source),
            Error::Runtime(e) => e.render(source),
        }
    }
}
