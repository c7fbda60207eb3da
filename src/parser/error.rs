use super::locations::{Locatable, Location};

/// Number of source lines shown above the offending one in a rendered report.
const PRIOR_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Syntax => write!(f, "syntax"),
        }
    }
}

/// A tokenizer or parser failure. Parsing is fail-fast, so at most one of
/// these is ever produced for a script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error at {location}: {message}")]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) location: Location,
    pub(crate) message: String,
}

impl Error {
    pub(crate) fn lexical(location: Location, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Lexical,
            location,
            message: msg.into(),
        }
    }

    pub(crate) fn syntax<R: Locatable>(at: &R, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            location: at.span().start,
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the error against the script it was raised for, pointing a
    /// caret at the offending column.
    pub fn render(&self, source: &str) -> String {
        render_excerpt(source, self.location, &self.message)
    }
}

pub(crate) fn render_excerpt(source: &str, location: Location, message: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().max(1).to_string().len();
    let first = location.line.saturating_sub(PRIOR_LINES);

    let mut output = vec![];
    if first > 0 {
        output.push("...".to_string());
    }
    for (lineno, line) in lines
        .iter()
        .enumerate()
        .take(location.line + 1)
        .skip(first)
    {
        output.push(format!("{lineno:0width$} {line}"));
    }
    output.push(format!("{}^", " ".repeat(location.column + 1 + width)));
    output.push(format!("line {}: {}", location.line, message));
    output.join("\n")
}
