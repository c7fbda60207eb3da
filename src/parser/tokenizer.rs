use super::error::Error;
use super::locations::{Location, Span};
use const_format::concatcp;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Token {
    pub(crate) typ: TokenType,
    pub(crate) lexeme: String,
    pub(crate) span: Span,
    /// Whether whitespace separated this token from the previous one.
    pub(crate) spaced: bool,
}

impl Token {
    pub fn typ(&self) -> TokenType {
        self.typ
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn location(&self) -> Location {
        self.span.start
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}('{}')", self.typ, self.lexeme)
    }
}

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TokenType {
    ENDMARKER,
    STRING,
    QUOTED,
    SEP,
    LPAR,
    RPAR,
    LBRACE,
    RBRACE,
    DOLLAR,
    VECTOR,
    CIRCUMFLEX,
    EXCLAMATION,
    #[default]
    ERRORTOKEN,
}

impl TokenType {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::ENDMARKER => "end of script",
            Self::STRING => "literal",
            Self::QUOTED => "quoted literal",
            Self::SEP => "command separator",
            Self::LPAR => "'('",
            Self::RPAR => "')'",
            Self::LBRACE => "'{'",
            Self::RBRACE => "'}'",
            Self::DOLLAR => "'$'",
            Self::VECTOR => "'$^'",
            Self::CIRCUMFLEX => "'^'",
            Self::EXCLAMATION => "'!'",
            Self::ERRORTOKEN => "invalid token",
        }
    }
}

const VECTOR: (&str, TokenType) = ("$^", TokenType::VECTOR);
const DOLLAR: (&str, TokenType) = ("$", TokenType::DOLLAR);
const CIRCUMFLEX: (&str, TokenType) = ("^", TokenType::CIRCUMFLEX);
const EXCLAMATION: (&str, TokenType) = ("!", TokenType::EXCLAMATION);
const LPAR: (&str, TokenType) = ("(", TokenType::LPAR);
const RPAR: (&str, TokenType) = (")", TokenType::RPAR);
const LBRACE: (&str, TokenType) = ("{", TokenType::LBRACE);
const RBRACE: (&str, TokenType) = ("}", TokenType::RBRACE);
const SEMI: (&str, TokenType) = (";", TokenType::SEP);

// `$^` must be tried before `$`.
const SIMPLE_TOKENS: [(&str, TokenType); 9] = [
    VECTOR,
    DOLLAR,
    CIRCUMFLEX,
    EXCLAMATION,
    LPAR,
    RPAR,
    LBRACE,
    RBRACE,
    SEMI,
];

const S_WHITESPACE: &str = r"^[^\S\n]+";
const S_COMMENT: &str = r"^#[^\n]*";
const S_STOP: &str = r"\s\$\^!\(\)\{\};";
const S_LITERAL: &str = concatcp!(r"^[^", S_STOP, "#\"", r"]+");
const S_LITERAL_NO_COMMENTS: &str = concatcp!(r"^[^", S_STOP, "\"", r"]+");
const S_LITERAL_NO_QUOTES: &str = concatcp!(r"^[^", S_STOP, "#", r"]+");
const S_LITERAL_BARE: &str = concatcp!(r"^[^", S_STOP, r"]+");
const S_REST_OF_LINE: &str = r"^[^\n;\{\}]*";

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHITESPACE).expect("Error compiling regex."));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(S_COMMENT).expect("Error compiling regex."));
static LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(S_LITERAL).expect("Error compiling regex."));
static LITERAL_NO_COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_LITERAL_NO_COMMENTS).expect("Error compiling regex."));
static LITERAL_NO_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_LITERAL_NO_QUOTES).expect("Error compiling regex."));
static LITERAL_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_LITERAL_BARE).expect("Error compiling regex."));
static REST_OF_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_REST_OF_LINE).expect("Error compiling regex."));

/// Switches that change how a script is split into tokens.
#[derive(Clone, Debug)]
pub struct TokenizerOptions {
    /// `#` starts a comment running to the end of the line.
    pub comments: bool,
    /// `"` opens a quoted literal.
    pub quotes: bool,
    /// A newline ends the current statement.
    pub newline_separates: bool,
    /// Commands whose trailing text is taken verbatim as one literal once
    /// the given number of ordinary literals has been read.
    pub consume_rest_triggers: HashMap<String, usize>,
    /// Consumed text runs to the end of the script instead of the line.
    pub consume_rest_all: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            comments: true,
            quotes: true,
            newline_separates: true,
            consume_rest_triggers: HashMap::new(),
            consume_rest_all: false,
        }
    }
}

impl TokenizerOptions {
    fn literal_regex(&self) -> &'static Regex {
        match (self.comments, self.quotes) {
            (true, true) => &*LITERAL,
            (false, true) => &*LITERAL_NO_COMMENTS,
            (true, false) => &*LITERAL_NO_QUOTES,
            (false, false) => &*LITERAL_BARE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConsumeRest {
    Off,
    Counting(usize),
    Consume,
}

pub struct Tokenizer<'s> {
    source: &'s str,
    options: &'s TokenizerOptions,
    pos: usize,
    location: Location,
    delimiters: Vec<(TokenType, Location)>,
    consume_rest: ConsumeRest,
    at_statement_start: bool,
    incomplete: bool,
    done: bool,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str, options: &'s TokenizerOptions) -> Self {
        Self {
            source,
            options,
            pos: 0,
            location: Location::default(),
            delimiters: vec![],
            consume_rest: ConsumeRest::Off,
            at_statement_start: true,
            incomplete: false,
            done: false,
        }
    }

    /// Produces the next token. After the end marker has been returned every
    /// further call returns another end marker.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        let token = self.scan()?;
        tracing::trace!(token = %token, "tokenize");
        self.track_consume_rest(&token);
        Ok(token)
    }

    /// Materializes the remaining tokens, end marker included.
    pub fn finalize(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token()?;
            let end = token.typ == TokenType::ENDMARKER;
            tokens.push(token);
            if end {
                return Ok(tokens);
            }
        }
    }

    /// Reports whether `source` is a complete script, one that only needs
    /// more lines, or one that can never tokenize.
    pub fn probe(source: &str, options: &TokenizerOptions) -> ParserState {
        let mut tokenizer = Tokenizer::new(source, options);
        loop {
            match tokenizer.next_token() {
                Ok(token) if token.typ == TokenType::ENDMARKER => return ParserState::Ok,
                Ok(_) => continue,
                Err(_) if tokenizer.incomplete => return ParserState::ContinuationNeeded,
                Err(e) => return ParserState::Error(e.to_string()),
            }
        }
    }

    fn scan(&mut self) -> Result<Token, Error> {
        let mut spaced = self.pos == 0;
        loop {
            let rest = &self.source[self.pos..];

            if let Some(m) = WHITESPACE.find(rest) {
                self.advance(m.end());
                spaced = true;
                continue;
            }
            if self.consume_rest == ConsumeRest::Consume {
                if let Some(token) = self.rest_of_line(spaced) {
                    return Ok(token);
                }
                continue;
            }
            if rest.is_empty() {
                return self.end_of_input(spaced);
            }
            if rest.starts_with('\n') {
                let in_parens = matches!(self.delimiters.last(), Some((TokenType::LPAR, _)));
                if !self.options.newline_separates || in_parens {
                    self.advance(1);
                    spaced = true;
                    continue;
                }
                return Ok(self.push(TokenType::SEP, 1, "\n".to_string(), spaced));
            }
            if self.options.comments {
                if let Some(m) = COMMENT.find(rest) {
                    self.advance(m.end());
                    spaced = true;
                    continue;
                }
            }
            if self.options.quotes && rest.starts_with('"') {
                return self.quoted(spaced);
            }
            for (lexeme, tok_type) in SIMPLE_TOKENS {
                if rest.starts_with(lexeme) {
                    self.track_delimiter(tok_type)?;
                    return Ok(self.push(tok_type, lexeme.len(), lexeme.to_string(), spaced));
                }
            }
            if let Some(m) = self.options.literal_regex().find(rest) {
                let lexeme = m.as_str().to_string();
                return Ok(self.push(TokenType::STRING, m.end(), lexeme, spaced));
            }
            let chr = rest.chars().next().unwrap_or_default();
            return Err(Error::lexical(
                self.location,
                format!("unexpected character {chr:?}"),
            ));
        }
    }

    fn end_of_input(&mut self, spaced: bool) -> Result<Token, Error> {
        if let Some((tok_type, opened)) = self.delimiters.last() {
            self.incomplete = true;
            return Err(Error::lexical(
                *opened,
                format!("{} is never closed", tok_type.describe()),
            ));
        }
        self.done = true;
        Ok(self.push(TokenType::ENDMARKER, 0, String::new(), spaced))
    }

    fn track_delimiter(&mut self, tok_type: TokenType) -> Result<(), Error> {
        let opener = match tok_type {
            TokenType::LPAR | TokenType::LBRACE => {
                self.delimiters.push((tok_type, self.location));
                return Ok(());
            }
            TokenType::RPAR => TokenType::LPAR,
            TokenType::RBRACE => TokenType::LBRACE,
            _ => return Ok(()),
        };
        match self.delimiters.pop() {
            Some((open, _)) if open == opener => Ok(()),
            Some((open, opened)) => Err(Error::lexical(
                self.location,
                format!(
                    "{} does not match {} opened at {}",
                    tok_type.describe(),
                    open.describe(),
                    opened
                ),
            )),
            None => Err(Error::lexical(
                self.location,
                format!("unmatched {}", tok_type.describe()),
            )),
        }
    }

    fn quoted(&mut self, spaced: bool) -> Result<Token, Error> {
        let start = self.location;
        let rest = &self.source[self.pos..];
        let mut value = String::new();
        let mut escaped = false;
        let mut closed = false;
        let mut len = 1;
        for chr in rest[1..].chars() {
            len += chr.len_utf8();
            if escaped {
                value.push(unescape(chr));
                escaped = false;
                continue;
            }
            match chr {
                '\\' => escaped = true,
                '"' => {
                    closed = true;
                    break;
                }
                _ => value.push(chr),
            }
        }
        if !closed {
            self.incomplete = true;
            return Err(Error::lexical(start, "unterminated quoted literal"));
        }
        Ok(self.push(TokenType::QUOTED, len, value, spaced))
    }

    fn rest_of_line(&mut self, spaced: bool) -> Option<Token> {
        let rest = &self.source[self.pos..];
        let end = if self.options.consume_rest_all {
            rest.len()
        } else {
            REST_OF_LINE.find(rest).map(|m| m.end()).unwrap_or(0)
        };
        let lexeme = rest[..end].trim_end().to_string();
        if lexeme.is_empty() {
            self.consume_rest = ConsumeRest::Off;
            return None;
        }
        Some(self.push(TokenType::STRING, end, lexeme, spaced))
    }

    fn track_consume_rest(&mut self, token: &Token) {
        self.consume_rest = match self.consume_rest {
            ConsumeRest::Off => {
                if matches!(
                    token.typ,
                    TokenType::SEP | TokenType::LBRACE | TokenType::RBRACE | TokenType::RPAR
                ) {
                    self.at_statement_start = true;
                    return;
                }
                let trigger = if self.at_statement_start && token.typ == TokenType::STRING {
                    self.options.consume_rest_triggers.get(&token.lexeme).copied()
                } else {
                    None
                };
                self.at_statement_start = false;
                match trigger {
                    Some(0) => ConsumeRest::Consume,
                    Some(n) => ConsumeRest::Counting(n),
                    None => ConsumeRest::Off,
                }
            }
            ConsumeRest::Counting(n) if token.typ == TokenType::STRING => {
                if n == 1 {
                    ConsumeRest::Consume
                } else {
                    ConsumeRest::Counting(n - 1)
                }
            }
            ConsumeRest::Counting(_) | ConsumeRest::Consume => {
                self.at_statement_start = token.typ == TokenType::SEP;
                ConsumeRest::Off
            }
        };
    }

    fn push(&mut self, typ: TokenType, len: usize, lexeme: String, spaced: bool) -> Token {
        let start = self.location;
        self.advance(len);
        Token {
            typ,
            lexeme,
            span: Span::new(start, self.location),
            spaced,
        }
    }

    fn advance(&mut self, len: usize) {
        for chr in self.source[self.pos..self.pos + len].chars() {
            if chr == '\n' {
                self.location.line += 1;
                self.location.column = 0;
            } else {
                self.location.column += 1;
            }
        }
        self.pos += len;
    }
}

impl<'s> Iterator for Tokenizer<'s> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_token();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

fn unescape(chr: char) -> char {
    match chr {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Tokenizes a whole script with the default options.
pub fn tokenize_string(input: &str) -> Result<Vec<Token>, Error> {
    let options = TokenizerOptions::default();
    Tokenizer::new(input, &options).finalize()
}

/// Outcome of [`Tokenizer::probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    Ok,
    ContinuationNeeded,
    Error(String),
}
