use super::error::{RuntimeError, TraceFrame};
use super::handler::CallKind;
use crate::parser::Location;
use std::collections::HashMap;

pub(crate) const GLOBAL_FRAME: &str = "<global>";

/// Variables owned by one user-defined call (or the global frame), plus the
/// names this scope forwards to another frame after `global`/`nonlocal`.
#[derive(Debug, Default, Clone)]
pub(crate) struct Scope {
    bindings: HashMap<String, String>,
    redirects: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub(crate) call_name: String,
    pub(crate) kind: CallKind,
    pub(crate) arguments: Vec<String>,
    pub(crate) location: Location,
    pub(crate) scope: Option<Scope>,
    /// Statements run directly in this frame so far.
    statements: usize,
    /// Statement number of the `if`/`elif` that left its chain open.
    else_armed: Option<usize>,
    pub(crate) return_value: Option<String>,
}

impl ScopeFrame {
    pub(crate) fn new(
        call_name: String,
        kind: CallKind,
        arguments: Vec<String>,
        location: Location,
        opens_scope: bool,
    ) -> Self {
        Self {
            call_name,
            kind,
            arguments,
            location,
            scope: opens_scope.then(Scope::default),
            statements: 0,
            else_armed: None,
            return_value: None,
        }
    }

    pub fn call_name(&self) -> &str {
        &self.call_name
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub(crate) fn count_statement(&mut self) {
        self.statements += 1;
    }

    /// Set only when the chain was left open by the statement right before
    /// the current one.
    pub(crate) fn else_signal(&self) -> bool {
        self.else_armed.is_some() && self.else_armed == self.statements.checked_sub(1)
    }

    pub(crate) fn set_else_signal(&mut self, signal: bool) {
        self.else_armed = signal.then_some(self.statements);
    }
}

/// The frames of one run, innermost last. Frame 0 is the global frame and
/// is never popped.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self {
            frames: vec![ScopeFrame::new(
                GLOBAL_FRAME.to_string(),
                CallKind::Command,
                vec![],
                Location::default(),
                true,
            )],
        }
    }
}

impl ScopeStack {
    pub(crate) fn push(&mut self, frame: ScopeFrame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<ScopeFrame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Drops every frame above the global one.
    pub(crate) fn unwind(&mut self) {
        self.frames.truncate(1);
    }

    /// Number of calls in progress.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn frames(&self) -> &[ScopeFrame] {
        &self.frames
    }

    pub(crate) fn top(&self) -> &ScopeFrame {
        &self.frames[self.frames.len() - 1]
    }

    pub(crate) fn top_mut(&mut self) -> &mut ScopeFrame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    /// The frame enclosing the innermost call.
    pub(crate) fn parent_mut(&mut self) -> &mut ScopeFrame {
        let index = self.frames.len().saturating_sub(2);
        &mut self.frames[index]
    }

    pub(crate) fn parent(&self) -> &ScopeFrame {
        &self.frames[self.frames.len().saturating_sub(2)]
    }

    /// Index of the innermost frame that owns variables.
    fn current(&self) -> usize {
        self.frames
            .iter()
            .rposition(|frame| frame.scope.is_some())
            .unwrap_or(0)
    }

    fn scope(&self, index: usize) -> Option<&Scope> {
        self.frames.get(index).and_then(|frame| frame.scope.as_ref())
    }

    fn scope_mut(&mut self, index: usize) -> Option<&mut Scope> {
        self.frames
            .get_mut(index)
            .and_then(|frame| frame.scope.as_mut())
    }

    /// Index of the frame `name` lives in, as seen from the current scope.
    fn resolve(&self, name: &str) -> usize {
        let current = self.current();
        self.scope(current)
            .and_then(|scope| scope.redirects.get(name).copied())
            .unwrap_or(current)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.scope(self.resolve(name))
            .and_then(|scope| scope.bindings.get(name))
            .map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: String) {
        let index = self.resolve(name);
        if let Some(scope) = self.scope_mut(index) {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Removes a binding, reporting whether there was one.
    pub fn unset(&mut self, name: &str) -> bool {
        let index = self.resolve(name);
        self.scope_mut(index)
            .and_then(|scope| scope.bindings.remove(name))
            .is_some()
    }

    /// Binds directly in the current scope, bypassing redirects.
    pub(crate) fn bind_local(&mut self, name: &str, value: String) {
        let index = self.current();
        if let Some(scope) = self.scope_mut(index) {
            scope.redirects.remove(name);
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Redirects `name` in the current scope to the global frame.
    pub fn declare_global(&mut self, name: &str) {
        let current = self.current();
        if current == 0 {
            return;
        }
        if let Some(scope) = self.scope_mut(current) {
            scope.redirects.insert(name.to_string(), 0);
        }
    }

    /// Redirects `name` in the current scope to the nearest enclosing scope
    /// that binds it, following that scope's own redirect if it has one.
    pub fn declare_nonlocal(&mut self, name: &str) -> Result<(), RuntimeError> {
        let current = self.current();
        let target = (0..current).rev().find_map(|index| {
            let scope = self.scope(index)?;
            match scope.redirects.get(name) {
                Some(&target) => Some(target),
                None if scope.bindings.contains_key(name) => Some(index),
                None => None,
            }
        });
        match (target, self.scope_mut(current)) {
            (Some(target), Some(scope)) => {
                scope.redirects.insert(name.to_string(), target);
                Ok(())
            }
            _ => Err(RuntimeError::name_resolution(format!(
                "nonlocal: no enclosing scope binds '{name}'"
            ))),
        }
    }

    /// Stores a return value on the innermost user-defined call.
    pub(crate) fn set_return(&mut self, value: String) -> Result<(), RuntimeError> {
        let frame = self
            .frames
            .iter_mut()
            .skip(1)
            .rev()
            .find(|frame| frame.scope.is_some())
            .ok_or_else(|| RuntimeError::handler("return outside of a defined call"))?;
        frame.return_value = Some(value);
        Ok(())
    }

    pub(crate) fn take_return(&mut self) -> Option<String> {
        self.frames.last_mut().and_then(|frame| frame.return_value.take())
    }

    /// Snapshot of the calls in progress, outermost first.
    pub(crate) fn backtrace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .skip(1)
            .map(|frame| TraceFrame {
                call_name: frame.call_name.clone(),
                kind: frame.kind,
                arguments: frame.arguments.clone(),
                location: frame.location,
            })
            .collect()
    }
}
