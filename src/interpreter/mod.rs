pub mod builtins;
mod context;
mod error;
mod evaluator;
mod handler;
mod scope;
pub mod value;

pub use context::{CallContext, InterpreterContext};
pub use error::{ErrorKind, RuntimeError, TraceFrame};
pub use handler::{CallHandler, CallKind, CallResult, CallbackHandler, HandlerChain, Registry};
pub use scope::{ScopeFrame, ScopeStack};

use crate::parser::{self, Ast, Node, TokenizerOptions, DEFAULT_MAX_NESTING};
use crate::Error;
use derivative::Derivative;

/// Ceilings that keep untrusted scripts from exhausting the host. A value of
/// 0 disables the corresponding ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Calls that may be in progress at once.
    pub max_call_depth: usize,
    /// Statement and substitution dispatches per run.
    pub max_steps: usize,
    /// Syntactic nesting accepted by the parser.
    pub max_nesting: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            max_steps: 1_000_000,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

type Initializer = Box<dyn Fn(&mut InterpreterContext) -> Result<(), RuntimeError>>;

/// Parses and runs scripts against a set of host handlers. The interpreter
/// itself holds no run state; every run works on its own
/// [`InterpreterContext`].
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct Interpreter {
    registry: Registry,
    limits: Limits,
    options: TokenizerOptions,
    #[derivative(Debug = "ignore")]
    initializers: Vec<Initializer>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_tokenizer_options(mut self, options: TokenizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn tokenizer_options(&self) -> &TokenizerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn add_handler(&mut self, kind: CallKind, name: &str, handler: impl CallHandler + 'static) {
        self.registry.chain_mut(kind).add(name, handler);
    }

    /// Registers a hook run on every fresh context, e.g. to seed globals.
    pub fn add_initializer<F>(&mut self, initializer: F)
    where
        F: Fn(&mut InterpreterContext) -> Result<(), RuntimeError> + 'static,
    {
        self.initializers.push(Box::new(initializer));
    }

    pub fn new_context(&self) -> Result<InterpreterContext, RuntimeError> {
        let mut ctx = InterpreterContext::default();
        for initializer in &self.initializers {
            initializer(&mut ctx)?;
        }
        Ok(ctx)
    }

    pub fn parse(&self, script: &str) -> Result<Ast, parser::Error> {
        parser::parse_with(script, &self.options, self.limits.max_nesting)
    }

    /// Parses and runs `script` on a fresh context, returning the context
    /// the run left behind.
    pub fn run(&self, script: &str) -> Result<InterpreterContext, Error> {
        let ast = self.parse(script)?;
        Ok(self.run_ast(&ast)?)
    }

    pub fn run_ast(&self, ast: &Ast) -> Result<InterpreterContext, RuntimeError> {
        let mut ctx = self.new_context()?;
        self.run_ast_with(ast, &mut ctx)?;
        Ok(ctx)
    }

    /// Parses and runs `script` on an existing context.
    pub fn run_with(&self, script: &str, ctx: &mut InterpreterContext) -> Result<(), Error> {
        let ast = self.parse(script)?;
        Ok(self.run_ast_with(&ast, ctx)?)
    }

    pub fn run_ast_with(
        &self,
        ast: &Ast,
        ctx: &mut InterpreterContext,
    ) -> Result<(), RuntimeError> {
        self.run_node(ctx, ast.root())
    }

    /// Parses text holding at most one statement and runs it on `ctx`.
    pub fn run_statement(&self, text: &str, ctx: &mut InterpreterContext) -> Result<(), Error> {
        let statement =
            parser::parse_interactive(text, &self.options, self.limits.max_nesting)?;
        if let Some(node) = statement {
            self.run_node(ctx, &node)?;
        }
        Ok(())
    }

    fn run_node(&self, ctx: &mut InterpreterContext, node: &Node) -> Result<(), RuntimeError> {
        ctx.begin_run();
        let result = self.interpret_statement(ctx, node);
        ctx.scopes.unwind();
        tracing::debug!(steps = ctx.steps, ok = result.is_ok(), "run finished");
        result
    }
}

#[cfg(test)]
mod test;
