mod ast;
mod combinators;
mod error;
mod grammar;
mod locations;
pub mod tokenizer;

pub use ast::{Ast, Node, NodeType};
pub(crate) use error::render_excerpt;
pub use error::{Error, ErrorKind};
pub use locations::{Locatable, Location, Span};
pub use tokenizer::{tokenize_string, ParserState, Token, TokenType, Tokenizer, TokenizerOptions};

/// Default bound on how deeply blocks, control bodies and argument pieces
/// may nest.
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Parses a whole script with the default tokenizer options.
pub fn parse(script: &str) -> Result<Ast, Error> {
    parse_with(script, &TokenizerOptions::default(), DEFAULT_MAX_NESTING)
}

/// Parses a whole script. Nothing is returned unless every token was
/// accepted; `max_nesting` of 0 disables the nesting bound.
pub fn parse_with(
    script: &str,
    options: &TokenizerOptions,
    max_nesting: usize,
) -> Result<Ast, Error> {
    let root = Tokenizer::new(script, options)
        .finalize()
        .and_then(|tokens| grammar::parse(&tokens, max_nesting))
        .map_err(|e| {
            tracing::debug!(error = %e, "parse failed");
            e
        })?;
    Ok(Ast {
        root,
        script: script.to_string(),
    })
}

/// Parses text holding at most one statement, optionally surrounded by
/// separators. Returns `None` for blank input.
pub fn parse_interactive(
    script: &str,
    options: &TokenizerOptions,
    max_nesting: usize,
) -> Result<Option<Node>, Error> {
    Tokenizer::new(script, options)
        .finalize()
        .and_then(|tokens| grammar::parse_interactive(&tokens, max_nesting))
        .map_err(|e| {
            tracing::debug!(error = %e, "parse failed");
            e
        })
}

#[cfg(test)]
mod test;
