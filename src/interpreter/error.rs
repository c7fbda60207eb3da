use super::handler::CallKind;
use crate::parser::{render_excerpt, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown call, undefined variable or missing `nonlocal` target.
    NameResolution,
    /// A value could not be read as the number a handler needed.
    Format,
    /// Call depth or step ceiling exceeded.
    ResourceLimit,
    /// Anything else a handler reports.
    Handler,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameResolution => write!(f, "name resolution"),
            Self::Format => write!(f, "format"),
            Self::ResourceLimit => write!(f, "resource limit"),
            Self::Handler => write!(f, "handler"),
        }
    }
}

/// One entry of a backtrace: a call that was in progress when an error was
/// raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub call_name: String,
    pub kind: CallKind,
    pub arguments: Vec<String>,
    pub location: Location,
}

impl std::fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} '{}'", self.location, self.kind, self.call_name)?;
        if !self.arguments.is_empty() {
            write!(f, " with ({})", self.arguments.join(" "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct RuntimeError {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    backtrace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            location: None,
            backtrace: vec![],
        }
    }

    pub fn name_resolution(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameResolution, msg)
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, msg)
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLimit, msg)
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Handler, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Calls in progress when the error was raised, outermost first.
    pub fn backtrace(&self) -> &[TraceFrame] {
        &self.backtrace
    }

    /// Attaches the error site. An error that already carries one keeps it,
    /// so the innermost site wins while the error unwinds.
    pub(crate) fn locate<F>(mut self, location: Location, backtrace: F) -> Self
    where
        F: FnOnce() -> Vec<TraceFrame>,
    {
        if self.location.is_none() {
            self.location = Some(location);
            self.backtrace = backtrace();
        }
        self
    }

    /// Renders the backtrace followed by the offending source line.
    pub fn render(&self, source: &str) -> String {
        let mut output = vec![];
        if !self.backtrace.is_empty() {
            output.push("backtrace (innermost call last):".to_string());
            output.extend(self.backtrace.iter().map(|frame| format!("  {frame}")));
        }
        let message = format!("{} error: {}", self.kind, self.message);
        match self.location {
            Some(location) => output.push(render_excerpt(source, location, &message)),
            None => output.push(message),
        }
        output.join("\n")
    }
}
