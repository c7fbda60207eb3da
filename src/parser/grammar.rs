// # ========================= START OF THE GRAMMAR =========================

// # General grammatical elements and rules:
// #
// # * Strings with single quotes (') denote punctuation tokens
// # * Upper case names (SEP) denote tokens
// # * `~` commits to the current alternative: a mismatch after it is a
// #   syntax error instead of a backtrack
// # * `adjacent e` matches e only if no whitespace precedes it
// #
// # Every node that can nest (statements and argument pieces) passes through
// # a depth check bounded by the configured maximum nesting.
// #

use super::ast::{Node, NodeType};
use super::combinators::*;
use super::error::Error;
use super::tokenizer::{Token, TokenType as TT};

pub(crate) fn parse(tokens: &[Token], max_nesting: usize) -> Result<Node, Error> {
    let input = ParserInput::new(tokens, max_nesting);
    finish(file_.parse(input), input)
}

pub(crate) fn parse_interactive(
    tokens: &[Token],
    max_nesting: usize,
) -> Result<Option<Node>, Error> {
    let input = ParserInput::new(tokens, max_nesting);
    finish(interactive.parse(input), input)
}

fn finish<T>(result: ParseResult<T>, input: ParserInput) -> Result<T, Error> {
    match result {
        ParseResult::Ok((value, _)) => Ok(value),
        ParseResult::Fatal(e) => Err(e),
        ParseResult::Err => Err(input.error("invalid syntax")),
    }
}

// # STARTING RULES
// # ==============
// file: statements ~ENDMARKER
fn file_(input: ParserInput) -> ParseResult<Node> {
    left(statements, cut(tok(TT::ENDMARKER), "statement or end of script"))
        .map(|statements| Node::new(NodeType::Root, None, statements))
        .parse(input)
}

// interactive: SEP* [statement] SEP* ~ENDMARKER
fn interactive(input: ParserInput) -> ParseResult<Option<Node>> {
    right(
        zero_or_more(tok(TT::SEP)),
        left(
            maybe(statement),
            pair(
                zero_or_more(tok(TT::SEP)),
                cut(tok(TT::ENDMARKER), "end of input after a single statement"),
            ),
        ),
    )
    .parse(input)
}

// # STATEMENTS
// # ==========
// statements: (SEP* statement)* SEP*
fn statements(input: ParserInput) -> ParseResult<Vec<Node>> {
    left(
        zero_or_more(right(zero_or_more(tok(TT::SEP)), statement)),
        zero_or_more(tok(TT::SEP)),
    )
    .parse(input)
}

// statement: block | control | command
fn statement(input: ParserInput) -> ParseResult<Node> {
    nested(block.or(control).or(command)).parse(input)
}

// block: '{' statements ~'}'
fn block(input: ParserInput) -> ParseResult<Node> {
    pair(
        tok(TT::LBRACE),
        left(statements, cut(tok(TT::RBRACE), "statement or '}'")),
    )
    .map(|(brace, statements)| Node::new(NodeType::Block, Some(brace), statements))
    .parse(input)
}

// control: '!' ~adjacent argument ['(' argument* ~')'] ~statement
fn control(input: ParserInput) -> ParseResult<Node> {
    pair(
        pair(
            tok(TT::EXCLAMATION),
            cut(adjacent(argument), "control call name directly after '!'"),
        ),
        pair(
            maybe(right(
                tok(TT::LPAR),
                left(zero_or_more(argument), cut(tok(TT::RPAR), "argument or ')'")),
            )),
            cut(statement, "statement as control call body"),
        ),
    )
    .map(|((sigil, name), (args, body))| {
        let args = argument_list(args.unwrap_or_default());
        Node::new(NodeType::ControlCall, Some(sigil), vec![name, args, body])
    })
    .parse(input)
}

// command: argument argument* &(SEP | '}' | ENDMARKER)
fn command(input: ParserInput) -> ParseResult<Node> {
    left(pair(argument, zero_or_more(argument)), end_of_command)
        .map(|(name, args)| {
            let token = name.token().cloned();
            Node::new(NodeType::CommandCall, token, vec![name, argument_list(args)])
        })
        .parse(input)
}

fn end_of_command(input: ParserInput) -> ParseResult<()> {
    let terminator = lookahead(tok(TT::SEP))
        .or(lookahead(tok(TT::RBRACE)))
        .or(lookahead(tok(TT::ENDMARKER)));
    match terminator.parse(input) {
        ParseResult::Err => {
            let msg = match input.current().map(|t| t.typ) {
                Some(TT::EXCLAMATION) => "'!' may only introduce a control call".to_string(),
                Some(TT::CIRCUMFLEX) => "'^' may only appear as part of '$^'".to_string(),
                _ => format!("expected end of command, found {}", found(input.current())),
            };
            ParseResult::Fatal(input.error(msg))
        }
        other => other,
    }
}

// # ARGUMENTS
// # =========
// argument: piece (adjacent piece)*
fn argument(input: ParserInput) -> ParseResult<Node> {
    pair(piece, zero_or_more(adjacent(piece)))
        .map(|(first, mut rest)| {
            if rest.is_empty() {
                return first;
            }
            let token = first.token().cloned();
            rest.insert(0, first);
            Node::new(NodeType::Concatenation, token, rest)
        })
        .parse(input)
}

// piece: vector_expansion | name_piece
fn piece(input: ParserInput) -> ParseResult<Node> {
    nested(vector_expansion.or(name_piece)).parse(input)
}

// name_piece: literal | substitution | variable
fn name_piece(input: ParserInput) -> ParseResult<Node> {
    literal.or(substitution).or(variable).parse(input)
}

// literal: STRING | QUOTED
fn literal(input: ParserInput) -> ParseResult<Node> {
    tok(TT::STRING)
        .or(tok(TT::QUOTED))
        .map(Node::literal)
        .parse(input)
}

// substitution: '$' call_tail
fn substitution(input: ParserInput) -> ParseResult<Node> {
    pair(tok(TT::DOLLAR), call_tail)
        .map(|(sigil, (name, args))| {
            Node::new(NodeType::SubstitutionCall, Some(sigil), vec![name, args])
        })
        .parse(input)
}

// call_tail: adjacent '(' ~argument argument* ~')'
fn call_tail(input: ParserInput) -> ParseResult<(Node, Node)> {
    right(
        adjacent(tok(TT::LPAR)),
        pair(
            cut(argument, "call name"),
            left(zero_or_more(argument), cut(tok(TT::RPAR), "argument or ')'")),
        ),
    )
    .map(|(name, args)| (name, argument_list(args)))
    .parse(input)
}

// variable: '$' ~adjacent name_piece
fn variable(input: ParserInput) -> ParseResult<Node> {
    pair(
        tok(TT::DOLLAR),
        cut(adjacent(nested(name_piece)), "variable name directly after '$'"),
    )
    .map(|(sigil, name)| Node::new(NodeType::VariableReference, Some(sigil), vec![name]))
    .parse(input)
}

// vector_expansion: '$^' (call_tail | ~adjacent name_piece)
fn vector_expansion(input: ParserInput) -> ParseResult<Node> {
    let vector = tok(TT::VECTOR);
    let ParseResult::Ok((sigil, rest)) = vector.parse(input) else {
        return ParseResult::Err;
    };
    let call = call_tail.map(|(name, args)| (NodeType::SubstitutionCall, vec![name, args]));
    let var = cut(adjacent(nested(name_piece)), "variable name or '(' after '$^'")
        .map(|name| (NodeType::VariableReference, vec![name]));
    call.or(var).parse(rest).map(|((typ, children), rest)| {
        let target = Node::new(typ, Some(sigil.clone()), children);
        (
            Node::new(NodeType::VectorExpansion, Some(sigil), vec![target]),
            rest,
        )
    })
}

fn argument_list(args: Vec<Node>) -> Node {
    Node::new(NodeType::ArgumentList, None, args)
}
