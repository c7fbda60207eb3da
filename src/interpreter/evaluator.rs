use super::context::{CallContext, Definition, Flow, InterpreterContext};
use super::error::RuntimeError;
use super::handler::{CallKind, CallResult};
use super::scope::ScopeFrame;
use super::Interpreter;
use crate::parser::{Locatable, Node, NodeType};

impl Interpreter {
    /// Executes one statement against `ctx`. Stops early when a `return` or
    /// `stop` starts unwinding.
    pub fn interpret_statement(
        &self,
        ctx: &mut InterpreterContext,
        node: &Node,
    ) -> Result<(), RuntimeError> {
        self.tick(ctx, node)?;
        ctx.scopes.top_mut().count_statement();
        match node.typ() {
            NodeType::Root | NodeType::Block => self.interpret_block(ctx, node),
            NodeType::CommandCall => self.interpret_call(ctx, node, CallKind::Command).map(|_| ()),
            NodeType::ControlCall => self.interpret_call(ctx, node, CallKind::Control).map(|_| ()),
            other => Err(self.fail(
                ctx,
                node,
                RuntimeError::handler(format!("{other:?} is not a statement")),
            )),
        }
    }

    fn interpret_block(
        &self,
        ctx: &mut InterpreterContext,
        node: &Node,
    ) -> Result<(), RuntimeError> {
        for statement in node.children() {
            if ctx.interrupted() {
                break;
            }
            self.interpret_statement(ctx, statement)?;
        }
        Ok(())
    }

    /// Evaluates every argument of an `ArgumentList`. A whole-argument
    /// vector expansion contributes one argument per item.
    pub(crate) fn evaluate_arguments(
        &self,
        ctx: &mut InterpreterContext,
        list: &Node,
    ) -> Result<Vec<String>, RuntimeError> {
        let mut args = vec![];
        for arg in list.children() {
            self.evaluate_into(ctx, arg, &mut args)?;
        }
        Ok(args)
    }

    /// Appends the slots one argument fills: one per item for a whole
    /// vector expansion, exactly one otherwise.
    fn evaluate_into(
        &self,
        ctx: &mut InterpreterContext,
        arg: &Node,
        slots: &mut Vec<String>,
    ) -> Result<(), RuntimeError> {
        let value = self.evaluate(ctx, arg)?;
        match arg.typ() {
            NodeType::VectorExpansion => slots.extend(value.split_whitespace().map(String::from)),
            _ => slots.push(value),
        }
        Ok(())
    }

    /// Evaluates one argument to a single string.
    fn evaluate(&self, ctx: &mut InterpreterContext, node: &Node) -> Result<String, RuntimeError> {
        match (node.typ(), node.children()) {
            (NodeType::StringLiteral, _) => Ok(node.str_content().unwrap_or_default().to_string()),
            (NodeType::VariableReference, [name]) => {
                let name = self.evaluate(ctx, name)?;
                match ctx.get_var(&name) {
                    Some(value) => Ok(value.to_string()),
                    None => Err(self.fail(
                        ctx,
                        node,
                        RuntimeError::name_resolution(format!("no such variable '{name}'")),
                    )),
                }
            }
            (NodeType::SubstitutionCall, _) => {
                self.tick(ctx, node)?;
                Ok(self
                    .interpret_call(ctx, node, CallKind::Expansion)?
                    .unwrap_or_default())
            }
            (NodeType::VectorExpansion, [target]) => {
                let value = self.evaluate(ctx, target)?;
                Ok(value.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            (NodeType::Concatenation, pieces) => {
                let mut joined = String::new();
                for piece in pieces {
                    joined.push_str(&self.evaluate(ctx, piece)?);
                }
                Ok(joined)
            }
            (other, _) => Err(self.fail(
                ctx,
                node,
                RuntimeError::handler(format!("{other:?} is not an argument")),
            )),
        }
    }

    /// Resolves the call name and arguments, then dispatches to a
    /// definition from this run or to the first matching host handler.
    fn interpret_call(
        &self,
        ctx: &mut InterpreterContext,
        node: &Node,
        kind: CallKind,
    ) -> CallResult {
        let (name_node, arg_list) = match node.children() {
            [name, args] | [name, args, _] => (name, args),
            _ => {
                return Err(self.fail(
                    ctx,
                    node,
                    RuntimeError::handler("malformed call node"),
                ));
            }
        };
        // A vector expansion in name position names the call with its first
        // item and passes the rest as leading arguments.
        let mut call = vec![];
        self.evaluate_into(ctx, name_node, &mut call)?;
        let mut rest = call.into_iter();
        let name = rest.next().unwrap_or_default();
        let args: Vec<String> = rest
            .chain(self.evaluate_arguments(ctx, arg_list)?)
            .collect();
        if name.is_empty() {
            return Err(self.fail(
                ctx,
                node,
                RuntimeError::name_resolution(format!("{kind} name must not be empty")),
            ));
        }
        if ctx.is_stopped() {
            return Ok(None);
        }
        let depth_limit = self.limits.max_call_depth;
        if depth_limit > 0 && ctx.scopes.depth() >= depth_limit {
            tracing::warn!(depth = depth_limit, call = %name, "call depth limit reached");
            return Err(self.fail(
                ctx,
                node,
                RuntimeError::resource_limit(format!(
                    "maximum call depth of {depth_limit} exceeded"
                )),
            ));
        }

        let location = node.span().start;
        let definition = ctx.definition(kind, &name);
        ctx.scopes.push(ScopeFrame::new(
            name.clone(),
            kind,
            args.clone(),
            location,
            definition.is_some(),
        ));
        let result = self.dispatch(ctx, node, &name, kind, definition.as_deref(), args);
        let result = result.map_err(|e| e.locate(location, || ctx.scopes.backtrace()));
        ctx.scopes.pop();
        match (kind, result) {
            (CallKind::Expansion, Ok(value)) => Ok(Some(value.unwrap_or_default())),
            (_, Ok(_)) => Ok(None),
            (_, Err(e)) => Err(e),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(call = %name, kind = %kind))]
    fn dispatch(
        &self,
        ctx: &mut InterpreterContext,
        node: &Node,
        name: &str,
        kind: CallKind,
        definition: Option<&Definition>,
        args: Vec<String>,
    ) -> CallResult {
        if let Some(definition) = definition {
            return self.invoke_definition(ctx, definition, args);
        }
        match self.registry.chain(kind).get_for_call(name) {
            Some(handler) => {
                let mut call = CallContext::new(self, ctx, node, args);
                handler.invoke(&mut call)
            }
            None => Err(RuntimeError::name_resolution(format!("{kind} '{name}' not found"))),
        }
    }

    fn invoke_definition(
        &self,
        ctx: &mut InterpreterContext,
        definition: &Definition,
        args: Vec<String>,
    ) -> CallResult {
        let params = &definition.params;
        let arity_ok = match definition.rest {
            Some(_) => args.len() >= params.len(),
            None => args.len() == params.len(),
        };
        if !arity_ok {
            return Err(RuntimeError::handler(format!(
                "{}: expected {}{} argument{}, got {}",
                definition.name,
                if definition.rest.is_some() { "at least " } else { "" },
                params.len(),
                if params.len() == 1 { "" } else { "s" },
                args.len()
            )));
        }
        for (param, arg) in params.iter().zip(&args) {
            ctx.scopes.bind_local(param, arg.clone());
        }
        if let Some(rest) = &definition.rest {
            ctx.scopes.bind_local(rest, args[params.len()..].join(" "));
        }

        self.interpret_statement(ctx, &definition.body)?;
        if ctx.flow == Flow::Return {
            ctx.flow = Flow::Next;
        }
        Ok(ctx.scopes.take_return())
    }

    /// Counts one step against the step ceiling.
    fn tick(&self, ctx: &mut InterpreterContext, node: &Node) -> Result<(), RuntimeError> {
        ctx.steps += 1;
        let max_steps = self.limits.max_steps;
        if max_steps > 0 && ctx.steps > max_steps {
            tracing::warn!(steps = max_steps, "step limit reached");
            return Err(self.fail(
                ctx,
                node,
                RuntimeError::resource_limit(format!(
                    "maximum of {max_steps} evaluation steps exceeded"
                )),
            ));
        }
        Ok(())
    }

    /// Pins an error raised outside any handler to `node` and the calls
    /// currently in progress.
    fn fail(&self, ctx: &InterpreterContext, node: &Node, error: RuntimeError) -> RuntimeError {
        error.locate(node.span().start, || ctx.scopes.backtrace())
    }
}
