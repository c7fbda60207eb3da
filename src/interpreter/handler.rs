use super::context::CallContext;
use super::error::RuntimeError;
use derivative::Derivative;
use std::collections::HashMap;

/// What a handler returns: `Some` text for expansions, `None` otherwise.
pub type CallResult = Result<Option<String>, RuntimeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// A statement run for its effects.
    Command,
    /// A statement that decides how often its body runs.
    Control,
    /// A call in argument position that yields a string.
    Expansion,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Control => write!(f, "control"),
            Self::Expansion => write!(f, "expansion"),
        }
    }
}

pub trait CallHandler {
    /// Whether this handler answers to `name`.
    fn contains(&self, name: &str) -> bool;
    fn invoke(&self, context: &mut CallContext) -> CallResult;
}

type Callback = Box<dyn Fn(&mut CallContext) -> CallResult>;

/// Maps call names, and aliases of them, to closures.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct CallbackHandler {
    #[derivative(Debug(format_with = "fmt_names"))]
    calls: HashMap<String, Callback>,
    aliases: HashMap<String, String>,
}

fn fmt_names(
    calls: &HashMap<String, Callback>,
    f: &mut std::fmt::Formatter,
) -> std::fmt::Result {
    let mut names: Vec<&String> = calls.keys().collect();
    names.sort();
    f.debug_list().entries(names).finish()
}

impl CallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_call<F>(&mut self, name: &str, callback: F) -> &mut Self
    where
        F: Fn(&mut CallContext) -> CallResult + 'static,
    {
        self.calls.insert(name.to_string(), Box::new(callback));
        self
    }

    pub fn add_alias(&mut self, alias: &str, name: &str) -> &mut Self {
        self.aliases.insert(alias.to_string(), name.to_string());
        self
    }

    pub fn remove_call(&mut self, name: &str) {
        self.calls.remove(name);
        self.aliases.retain(|_, target| target != name);
    }

    fn callback(&self, name: &str) -> Option<&Callback> {
        let name = self.aliases.get(name).map_or(name, String::as_str);
        self.calls.get(name)
    }
}

impl CallHandler for CallbackHandler {
    fn contains(&self, name: &str) -> bool {
        self.callback(name).is_some()
    }

    fn invoke(&self, context: &mut CallContext) -> CallResult {
        match self.callback(context.call_name()) {
            Some(callback) => callback(context),
            None => Err(RuntimeError::name_resolution(format!(
                "no callback registered for '{}'",
                context.call_name()
            ))),
        }
    }
}

/// Handlers for one call kind, consulted in registration order.
#[derive(Default)]
pub struct HandlerChain {
    entries: Vec<(String, Box<dyn CallHandler>)>,
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl HandlerChain {
    /// Registers `handler` under `name`. Re-registering a name replaces the
    /// handler but keeps its position in the chain.
    pub fn add(&mut self, name: &str, handler: impl CallHandler + 'static) {
        tracing::debug!(name, "register call handler");
        let handler: Box<dyn CallHandler> = Box::new(handler);
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = handler,
            None => self.entries.push((name.to_string(), handler)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn CallHandler>> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&dyn CallHandler> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, handler)| handler.as_ref())
    }

    /// The first handler that answers to `call_name`.
    pub fn get_for_call(&self, call_name: &str) -> Option<&dyn CallHandler> {
        self.entries
            .iter()
            .map(|(_, handler)| handler.as_ref())
            .find(|handler| handler.contains(call_name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

/// One chain per call kind.
#[derive(Debug, Default)]
pub struct Registry {
    commands: HandlerChain,
    controls: HandlerChain,
    expansions: HandlerChain,
}

impl Registry {
    pub fn chain(&self, kind: CallKind) -> &HandlerChain {
        match kind {
            CallKind::Command => &self.commands,
            CallKind::Control => &self.controls,
            CallKind::Expansion => &self.expansions,
        }
    }

    pub fn chain_mut(&mut self, kind: CallKind) -> &mut HandlerChain {
        match kind {
            CallKind::Command => &mut self.commands,
            CallKind::Control => &mut self.controls,
            CallKind::Expansion => &mut self.expansions,
        }
    }
}
