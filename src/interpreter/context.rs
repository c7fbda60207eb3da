use super::error::RuntimeError;
use super::handler::CallKind;
use super::scope::ScopeStack;
use super::value::Value;
use super::Interpreter;
use crate::parser::{Node, NodeType};
use std::collections::HashMap;
use std::rc::Rc;

/// Where execution goes after the current statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Flow {
    #[default]
    Next,
    /// Unwinding to the innermost user-defined call.
    Return,
    /// Unwinding the whole run.
    Stop,
}

/// A call defined by the script itself.
#[derive(Debug)]
pub(crate) struct Definition {
    pub(crate) name: String,
    pub(crate) kind: CallKind,
    pub(crate) params: Vec<String>,
    /// Trailing `*name` parameter collecting the remaining arguments.
    pub(crate) rest: Option<String>,
    pub(crate) body: Node,
}

impl Definition {
    /// Bodies that issue a literal `return` command define expansions.
    pub(crate) fn kind_of(body: &Node) -> CallKind {
        let returns = body.find_all(|node| {
            node.typ() == NodeType::CommandCall
                && node.children().first().and_then(Node::str_content) == Some("return")
        });
        if returns.is_empty() {
            CallKind::Command
        } else {
            CallKind::Expansion
        }
    }
}

/// State owned by one run: the scope stack, calls defined by the script,
/// and step accounting. A context may be reused for several runs, as a
/// REPL does.
#[derive(Debug, Default)]
pub struct InterpreterContext {
    pub(crate) scopes: ScopeStack,
    pub(crate) definitions: HashMap<(CallKind, String), Rc<Definition>>,
    pub(crate) flow: Flow,
    pub(crate) steps: usize,
}

impl InterpreterContext {
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.scopes.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<String>) {
        self.scopes.set(name, value.into());
    }

    pub fn del_var(&mut self, name: &str) -> bool {
        self.scopes.unset(name)
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Statements and substitutions dispatched during the last run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_stopped(&self) -> bool {
        self.flow == Flow::Stop
    }

    /// Whether a user-defined call of this kind and name exists.
    pub fn is_defined(&self, kind: CallKind, name: &str) -> bool {
        self.definitions.contains_key(&(kind, name.to_string()))
    }

    pub(crate) fn begin_run(&mut self) {
        self.scopes.unwind();
        self.flow = Flow::Next;
        self.steps = 0;
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.flow != Flow::Next
    }

    pub(crate) fn definition(&self, kind: CallKind, name: &str) -> Option<Rc<Definition>> {
        if kind == CallKind::Control {
            return None;
        }
        self.definitions.get(&(kind, name.to_string())).cloned()
    }
}

/// Everything a handler can see and do while serving one call.
pub struct CallContext<'a> {
    interpreter: &'a Interpreter,
    state: &'a mut InterpreterContext,
    node: &'a Node,
    args: Vec<String>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        interpreter: &'a Interpreter,
        state: &'a mut InterpreterContext,
        node: &'a Node,
        args: Vec<String>,
    ) -> Self {
        Self {
            interpreter,
            state,
            node,
            args,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        self.interpreter
    }

    pub fn state(&self) -> &InterpreterContext {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut InterpreterContext {
        &mut *self.state
    }

    pub fn call_name(&self) -> &str {
        &self.state.scopes.top().call_name
    }

    pub fn kind(&self) -> CallKind {
        self.state.scopes.top().kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The `n`th argument, or an error naming the call when it is missing.
    pub fn arg(&self, n: usize) -> Result<Value<'_>, RuntimeError> {
        self.args.get(n).map(|s| Value::new(s)).ok_or_else(|| {
            RuntimeError::handler(format!(
                "{}: missing argument {}",
                self.call_name(),
                n + 1
            ))
        })
    }

    /// Fails unless exactly `n` arguments were passed.
    pub fn require_args(&self, n: usize) -> Result<(), RuntimeError> {
        if self.args.len() != n {
            return Err(RuntimeError::handler(format!(
                "{}: expected {} argument{}, got {}",
                self.call_name(),
                n,
                if n == 1 { "" } else { "s" },
                self.args.len()
            )));
        }
        Ok(())
    }

    /// Fails unless at least `n` arguments were passed.
    pub fn require_min_args(&self, n: usize) -> Result<(), RuntimeError> {
        if self.args.len() < n {
            return Err(RuntimeError::handler(format!(
                "{}: requires at least {} argument{}",
                self.call_name(),
                n,
                if n == 1 { "" } else { "s" }
            )));
        }
        Ok(())
    }

    pub fn node(&self) -> &Node {
        self.node
    }

    /// The unevaluated body of a control call.
    pub fn body(&self) -> Option<&'a Node> {
        match self.node.typ() {
            NodeType::ControlCall => self.node.children().get(2),
            _ => None,
        }
    }

    /// Runs the control body once. Loops should stop once
    /// [`CallContext::interrupted`] reports a pending `return` or `stop`.
    pub fn interpret_body(&mut self) -> Result<(), RuntimeError> {
        let body = self.body().ok_or_else(|| {
            RuntimeError::handler(format!("{}: call has no body", self.call_name()))
        })?;
        self.interpreter.interpret_statement(self.state, body)
    }

    /// Evaluates the call's argument nodes again, for conditions that must
    /// be re-read on every iteration.
    pub fn evaluate_arguments(&mut self) -> Result<Vec<String>, RuntimeError> {
        match self.node.children().get(1) {
            Some(list) => self.interpreter.evaluate_arguments(self.state, list),
            None => Ok(vec![]),
        }
    }

    /// A pending `return` or `stop` is unwinding through this call.
    pub fn interrupted(&self) -> bool {
        self.state.interrupted()
    }

    pub fn get_var(&self, name: &str) -> Result<&str, RuntimeError> {
        self.state
            .get_var(name)
            .ok_or_else(|| RuntimeError::name_resolution(format!("no such variable '{name}'")))
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<String>) {
        self.state.set_var(name, value);
    }

    pub fn del_var(&mut self, name: &str) -> Result<(), RuntimeError> {
        if self.state.del_var(name) {
            Ok(())
        } else {
            Err(RuntimeError::name_resolution(format!(
                "no such variable '{name}'"
            )))
        }
    }

    pub fn declare_global(&mut self, name: &str) {
        self.state.scopes.declare_global(name);
    }

    pub fn declare_nonlocal(&mut self, name: &str) -> Result<(), RuntimeError> {
        self.state.scopes.declare_nonlocal(name)
    }

    /// Whether the statement right before this control call, in the same
    /// frame, left an `if` chain open.
    pub fn else_signal(&self) -> bool {
        self.state.scopes.parent().else_signal()
    }

    /// Opens or closes the chain for the statement that follows this one.
    pub fn set_else_signal(&mut self, signal: bool) {
        self.state.scopes.parent_mut().set_else_signal(signal);
    }

    /// Hands `value` to the innermost user-defined call and unwinds to it.
    pub fn set_return(&mut self, value: String) -> Result<(), RuntimeError> {
        self.state.scopes.set_return(value)?;
        self.state.flow = Flow::Return;
        Ok(())
    }

    /// Ends the run successfully once the current statement unwinds.
    pub fn stop(&mut self) {
        self.state.flow = Flow::Stop;
    }

    /// Defines a call for the rest of the run. A final parameter written
    /// `*name` collects the remaining arguments, space-joined.
    pub fn define(
        &mut self,
        name: &str,
        params: &[String],
        body: &Node,
    ) -> Result<CallKind, RuntimeError> {
        if name.is_empty() {
            return Err(RuntimeError::handler("def: call name must not be empty"));
        }
        let mut params = params.to_vec();
        let rest = match params.last().and_then(|p| p.strip_prefix('*')) {
            Some(rest) => {
                let rest = rest.to_string();
                params.pop();
                Some(rest)
            }
            None => None,
        };
        if let Some(bad) = params.iter().find(|p| p.starts_with('*')) {
            return Err(RuntimeError::handler(format!(
                "def: only the last parameter may collect arguments, not '{bad}'"
            )));
        }
        let kind = Definition::kind_of(body);
        tracing::debug!(name, %kind, "define call");
        let definition = Definition {
            name: name.to_string(),
            kind,
            params,
            rest,
            body: body.clone(),
        };
        self.state
            .definitions
            .insert((kind, name.to_string()), Rc::new(definition));
        Ok(kind)
    }
}
