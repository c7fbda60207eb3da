use super::error::Error;
use super::tokenizer::{Token, TokenType};

/// Outcome of a single grammar rule.
///
/// `Err` means the rule did not match and the caller may try an alternative.
/// `Fatal` means the rule committed to a construct that turned out to be
/// malformed; it aborts the whole parse.
#[derive(Debug)]
pub enum ParseResult<'a, Output> {
    Ok((Output, ParserInput<'a>)),
    Err,
    Fatal(Error),
}

/// Cursor over the token stream. Copying it is how rules backtrack.
#[derive(Debug, Clone, Copy)]
pub struct ParserInput<'a> {
    tokens: &'a [Token],
    depth: usize,
    max_depth: usize,
}

impl<'a> ParserInput<'a> {
    pub fn new(tokens: &'a [Token], max_depth: usize) -> Self {
        Self {
            tokens,
            depth: 0,
            max_depth,
        }
    }

    pub(super) fn current(&self) -> Option<&'a Token> {
        self.tokens.first()
    }

    fn advance(self) -> Self {
        Self {
            tokens: self.tokens.get(1..).unwrap_or_default(),
            ..self
        }
    }

    /// A syntax error pointing at the current token.
    pub(super) fn error(&self, msg: impl Into<String>) -> Error {
        match self.current() {
            Some(token) => Error::syntax(token, msg),
            None => Error::syntax(&Token::default(), msg),
        }
    }
}

impl<'a, T> ParseResult<'a, T> {
    pub(super) fn or_else<O>(self, op: O) -> Self
    where
        O: FnOnce() -> Self,
    {
        match self {
            Self::Err => op(),
            other => other,
        }
    }
    pub(super) fn map<U, F>(self, op: F) -> ParseResult<'a, U>
    where
        F: FnOnce((T, ParserInput<'a>)) -> (U, ParserInput<'a>),
    {
        match self {
            Self::Ok(inner) => ParseResult::Ok(op(inner)),
            Self::Err => ParseResult::Err,
            Self::Fatal(e) => ParseResult::Fatal(e),
        }
    }
    pub(super) fn and_then<U, F>(self, op: F) -> ParseResult<'a, U>
    where
        F: FnOnce((T, ParserInput<'a>)) -> ParseResult<'a, U>,
    {
        match self {
            Self::Ok(inner) => op(inner),
            Self::Err => ParseResult::Err,
            Self::Fatal(e) => ParseResult::Fatal(e),
        }
    }
}

pub(super) trait Parser<'a, Output> {
    fn parse(&self, input: ParserInput<'a>) -> ParseResult<'a, Output>;
    fn map<F, MappedOutput>(self, map_fn: F) -> BoxedParser<'a, MappedOutput>
    where
        Self: Sized + 'a,
        Output: 'a,
        MappedOutput: 'a,
        F: Fn(Output) -> MappedOutput + 'a,
    {
        BoxedParser::new(map(self, map_fn))
    }
    fn or(self, parser: impl Parser<'a, Output> + 'a) -> BoxedParser<'a, Output>
    where
        Self: Sized + 'a,
        Output: 'a,
    {
        let alternative = move |input| self.parse(input).or_else(|| parser.parse(input));
        BoxedParser::new(alternative)
    }
}

impl<'a, F, Output> Parser<'a, Output> for F
where
    F: Fn(ParserInput<'a>) -> ParseResult<'a, Output>,
{
    fn parse(&self, input: ParserInput<'a>) -> ParseResult<'a, Output> {
        self(input)
    }
}

pub(super) struct BoxedParser<'a, Output> {
    parser: Box<dyn Parser<'a, Output> + 'a>,
}

impl<'a, Output> BoxedParser<'a, Output> {
    fn new(parser: impl Parser<'a, Output> + 'a) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }
}

impl<'a, Output> Parser<'a, Output> for BoxedParser<'a, Output> {
    fn parse(&self, input: ParserInput<'a>) -> ParseResult<'a, Output> {
        self.parser.parse(input)
    }
}

pub(super) fn pair<'a, R1, R2>(
    parser1: impl Parser<'a, R1>,
    parser2: impl Parser<'a, R2>,
) -> impl Parser<'a, (R1, R2)> {
    move |input| {
        parser1.parse(input).and_then(|(result1, next_input)| {
            parser2
                .parse(next_input)
                .map(|(result2, rest)| ((result1, result2), rest))
        })
    }
}

pub(super) fn map<'a, F, A, B>(
    parser: impl Parser<'a, A>,
    map_fn: F,
) -> impl Fn(ParserInput<'a>) -> ParseResult<'a, B>
where
    F: Fn(A) -> B,
{
    move |input| {
        parser
            .parse(input)
            .map(|(result, rest)| (map_fn(result), rest))
    }
}

pub(super) fn left<'a, A, B>(
    left_parser: impl Parser<'a, A>,
    right_parser: impl Parser<'a, B>,
) -> impl Parser<'a, A> {
    map(pair(left_parser, right_parser), |(left, _right)| left)
}

pub(super) fn right<'a, A, B>(
    left_parser: impl Parser<'a, A>,
    right_parser: impl Parser<'a, B>,
) -> impl Parser<'a, B> {
    map(pair(left_parser, right_parser), |(_left, right)| right)
}

pub(super) fn zero_or_more<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, Vec<R>> {
    move |input| {
        let mut result = Vec::new();
        let mut tmp_input = input;
        loop {
            match parser.parse(tmp_input) {
                ParseResult::Ok((next, rest)) => {
                    tmp_input = rest;
                    result.push(next);
                }
                ParseResult::Err => return ParseResult::Ok((result, tmp_input)),
                ParseResult::Fatal(e) => return ParseResult::Fatal(e),
            }
        }
    }
}

pub(super) fn maybe<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, Option<R>> {
    move |input| match parser.parse(input) {
        ParseResult::Ok((value, rest)) => ParseResult::Ok((Some(value), rest)),
        ParseResult::Err => ParseResult::Ok((None, input)),
        ParseResult::Fatal(e) => ParseResult::Fatal(e),
    }
}

pub(super) fn tok<'a>(
    expected_type: TokenType,
) -> impl Fn(ParserInput<'a>) -> ParseResult<'a, Token> {
    move |input| match input.current() {
        Some(token) if token.typ == expected_type => {
            ParseResult::Ok((token.clone(), input.advance()))
        }
        _ => ParseResult::Err,
    }
}

/// Succeeds only if the next token follows the previous one without
/// whitespace in between.
pub(super) fn adjacent<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, R> {
    move |input: ParserInput<'a>| match input.current() {
        Some(token) if !token.spaced => parser.parse(input),
        _ => ParseResult::Err,
    }
}

/// Commits to `parser`: a mismatch becomes a fatal error naming what was
/// expected and the token actually found.
pub(super) fn cut<'a, R>(parser: impl Parser<'a, R>, expected: &'static str) -> impl Parser<'a, R> {
    move |input: ParserInput<'a>| match parser.parse(input) {
        ParseResult::Err => ParseResult::Fatal(
            input.error(format!("expected {expected}, found {}", found(input.current()))),
        ),
        other => other,
    }
}

/// Runs `parser` one nesting level deeper, failing fatally once the
/// configured maximum is exceeded.
pub(super) fn nested<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, R> {
    move |input: ParserInput<'a>| {
        if input.max_depth > 0 && input.depth >= input.max_depth {
            return ParseResult::Fatal(input.error(format!(
                "nesting deeper than {} levels",
                input.max_depth
            )));
        }
        let inner = ParserInput {
            depth: input.depth + 1,
            ..input
        };
        parser.parse(inner).map(|(result, rest)| {
            (
                result,
                ParserInput {
                    depth: input.depth,
                    ..rest
                },
            )
        })
    }
}

pub(super) fn lookahead<'a, R>(parser: impl Parser<'a, R>) -> impl Parser<'a, ()> {
    move |input| match parser.parse(input) {
        ParseResult::Ok(_) => ParseResult::Ok(((), input)),
        ParseResult::Err => ParseResult::Err,
        ParseResult::Fatal(e) => ParseResult::Fatal(e),
    }
}

pub(super) fn found(token: Option<&Token>) -> String {
    match token {
        Some(token) => match token.typ {
            TokenType::STRING | TokenType::QUOTED => {
                format!("{} '{}'", token.typ.describe(), token.lexeme)
            }
            other => other.describe().to_string(),
        },
        None => TokenType::ENDMARKER.describe().to_string(),
    }
}
