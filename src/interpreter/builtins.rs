//! The base library: variables, flow control, arithmetic, comparison,
//! logic, vector helpers, random picks and standard I/O.
//!
//! ```
//! use scrolls::{builtins, Interpreter};
//!
//! let mut interpreter = Interpreter::new();
//! builtins::base_language(&mut interpreter);
//! let ctx = interpreter.run("set x $(+ 1 2)").unwrap();
//! assert_eq!(Some("3"), ctx.get_var("x"));
//! ```

use super::context::CallContext;
use super::error::RuntimeError;
use super::handler::{CallHandler, CallKind, CallResult, CallbackHandler};
use super::value::{bool_to_str, require_all_numeric, Number, Value, FALSE, TRUE};
use super::Interpreter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::io::{BufRead, Write};

/// Longest vector `rangev` will build.
const MAX_RANGE_ITEMS: i64 = 100_000;

/// Installs every handler of the base library except standard I/O, plus the
/// initializer binding `$true` and `$false`.
pub fn base_language(interpreter: &mut Interpreter) {
    interpreter.add_initializer(|ctx| {
        ctx.set_var("true", TRUE);
        ctx.set_var("false", FALSE);
        Ok(())
    });
    interpreter.add_handler(CallKind::Command, "builtin", command_handler());
    interpreter.add_handler(CallKind::Control, "builtin", control_handler());
    interpreter.add_handler(CallKind::Expansion, "arithmetic", arithmetic_handler());
    interpreter.add_handler(CallKind::Expansion, "comparison", comparison_handler());
    interpreter.add_handler(CallKind::Expansion, "logic", logic_handler());
    interpreter.add_handler(CallKind::Expansion, "string", string_handler());
    interpreter.add_handler(CallKind::Expansion, "random", random_handler());
}

/// `set`, `unset`, `global`, `nonlocal`, `return` and `stop`.
pub fn command_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("set", set)
        .add_call("unset", unset)
        .add_call("global", global)
        .add_call("nonlocal", nonlocal)
        .add_call("return", return_)
        .add_call("stop", stop);
    handler
}

/// `repeat`, `for`, `if`, `elif`, `else`, `while` and `def`.
pub fn control_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("repeat", repeat)
        .add_call("for", for_)
        .add_call("if", if_)
        .add_call("elif", elif)
        .add_call("else", else_)
        .add_call("while", while_)
        .add_call("def", def);
    handler
}

pub fn arithmetic_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("toint", |ctx| unary(ctx, Number::to_int))
        .add_call("tofloat", |ctx| unary(ctx, Number::to_float))
        .add_call("+", |ctx| reduce(ctx, Number::add))
        .add_call("*", |ctx| reduce(ctx, Number::mul))
        .add_call("-", sub)
        .add_call("/", |ctx| mass(ctx, |a, b| a.div(b)))
        .add_call("//", |ctx| mass(ctx, |a, b| a.floor_div(b)))
        .add_call("%", modulo);
    handler
}

pub fn comparison_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("eq?", |ctx| Ok(Some(bool_to_str(equals(ctx)?))))
        .add_alias("==", "eq?")
        .add_call("neq?", |ctx| Ok(Some(bool_to_str(!equals(ctx)?))))
        .add_call(">", |ctx| compare(ctx, |a, b| a > b))
        .add_call("<", |ctx| compare(ctx, |a, b| a < b))
        .add_call(">=", |ctx| compare(ctx, |a, b| a >= b))
        .add_call("<=", |ctx| compare(ctx, |a, b| a <= b))
        .add_call("in?", contains);
    handler
}

pub fn logic_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("not", |ctx| {
            ctx.require_args(1)?;
            Ok(Some(bool_to_str(!ctx.arg(0)?.is_truthy())))
        })
        .add_call("and", |ctx| logic(ctx, |a, b| a && b))
        .add_call("or", |ctx| logic(ctx, |a, b| a || b))
        .add_call("xor", |ctx| logic(ctx, |a, b| a ^ b));
    handler
}

pub fn string_handler() -> CallbackHandler {
    let mut handler = CallbackHandler::new();
    handler
        .add_call("cat", |ctx| Ok(Some(ctx.args().concat())))
        .add_alias("concat", "cat")
        .add_call("vempty?", |ctx| {
            ctx.require_min_args(1)?;
            Ok(Some(bool_to_str(ctx.args().iter().all(|a| a.trim().is_empty()))))
        })
        .add_call("vhead", vhead)
        .add_call("vtail", vtail)
        .add_call("rangev", rangev);
    handler
}

/// `select`, `shuffle` and `uniform`, drawing from OS entropy.
pub fn random_handler() -> RandomHandler {
    RandomHandler::new()
}

fn set(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let value = ctx.args()[1..].join(" ");
    let name = ctx.args()[0].clone();
    ctx.set_var(&name, value);
    Ok(None)
}

fn unset(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    for name in ctx.args().to_vec() {
        ctx.del_var(&name)?;
    }
    Ok(None)
}

fn global(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    for name in ctx.args().to_vec() {
        ctx.declare_global(&name);
    }
    Ok(None)
}

fn nonlocal(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    for name in ctx.args().to_vec() {
        ctx.declare_nonlocal(&name)?;
    }
    Ok(None)
}

fn return_(ctx: &mut CallContext) -> CallResult {
    let value = ctx.args().join(" ");
    ctx.set_return(value)?;
    Ok(None)
}

fn stop(ctx: &mut CallContext) -> CallResult {
    ctx.stop();
    Ok(None)
}

fn repeat(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(1)?;
    let times = ctx.arg(0)?.to_int()?;
    for _ in 0..times.max(0) {
        ctx.interpret_body()?;
        if ctx.interrupted() {
            break;
        }
    }
    Ok(None)
}

fn for_(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(2)?;
    if ctx.args()[1] != "in" {
        return Err(RuntimeError::handler(format!(
            "for: expected 'in', found '{}'",
            ctx.args()[1]
        )));
    }
    let var = ctx.args()[0].clone();
    let items = ctx.args()[2..].to_vec();
    for item in items {
        ctx.set_var(&var, item);
        ctx.interpret_body()?;
        if ctx.interrupted() {
            break;
        }
    }
    ctx.state_mut().del_var(&var);
    Ok(None)
}

fn if_(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(1)?;
    let taken = ctx.arg(0)?.is_truthy();
    ctx.set_else_signal(!taken);
    if taken {
        ctx.interpret_body()?;
    }
    Ok(None)
}

fn elif(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(1)?;
    if !ctx.else_signal() {
        return Ok(None);
    }
    let taken = ctx.arg(0)?.is_truthy();
    ctx.set_else_signal(!taken);
    if taken {
        ctx.interpret_body()?;
    }
    Ok(None)
}

fn else_(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(0)?;
    if ctx.else_signal() {
        ctx.set_else_signal(false);
        ctx.interpret_body()?;
    }
    Ok(None)
}

fn while_(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(1)?;
    let mut condition = ctx.args()[0].clone();
    while Value::new(&condition).is_truthy() {
        ctx.interpret_body()?;
        if ctx.interrupted() {
            break;
        }
        condition = ctx.evaluate_arguments()?.join(" ");
    }
    Ok(None)
}

fn def(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let body = ctx
        .body()
        .ok_or_else(|| RuntimeError::handler("def: missing body"))?;
    let name = ctx.args()[0].clone();
    let params = ctx.args()[1..].to_vec();
    ctx.define(&name, &params, body)?;
    Ok(None)
}

fn unary(ctx: &mut CallContext, op: fn(Number) -> Number) -> CallResult {
    ctx.require_args(1)?;
    Ok(Some(op(ctx.arg(0)?.to_number()?).to_string()))
}

fn reduce(ctx: &mut CallContext, op: fn(Number, Number) -> Number) -> CallResult {
    ctx.require_min_args(1)?;
    let numbers = require_all_numeric(ctx.args())?;
    let result = numbers.into_iter().reduce(op);
    Ok(result.map(|n| n.to_string()))
}

/// `first OP (rest combined)`, where the rest is summed for `-` and
/// multiplied for division.
fn mass<F>(ctx: &mut CallContext, op: F) -> CallResult
where
    F: Fn(Number, Number) -> Result<Number, RuntimeError>,
{
    ctx.require_min_args(2)?;
    let numbers = require_all_numeric(ctx.args())?;
    let divisor = numbers[1..]
        .iter()
        .copied()
        .reduce(Number::mul)
        .unwrap_or(Number::Int(1));
    Ok(Some(op(numbers[0], divisor)?.to_string()))
}

fn sub(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let numbers = require_all_numeric(ctx.args())?;
    let result = match numbers.split_first() {
        Some((first, [])) => first.negate(),
        Some((first, rest)) => {
            let total = rest.iter().copied().reduce(Number::add).unwrap_or(Number::Int(0));
            first.sub(total)
        }
        None => Number::Int(0),
    };
    Ok(Some(result.to_string()))
}

fn modulo(ctx: &mut CallContext) -> CallResult {
    ctx.require_args(2)?;
    let numbers = require_all_numeric(ctx.args())?;
    Ok(Some(numbers[0].modulo(numbers[1])?.to_string()))
}

/// Numeric comparison when both sides are numbers, string comparison
/// otherwise.
fn equals(ctx: &CallContext) -> Result<bool, RuntimeError> {
    ctx.require_args(2)?;
    match require_all_numeric(ctx.args()) {
        Ok(numbers) => Ok(numbers[0] == numbers[1]),
        Err(_) => Ok(ctx.args()[0] == ctx.args()[1]),
    }
}

fn compare(ctx: &mut CallContext, op: fn(f64, f64) -> bool) -> CallResult {
    ctx.require_args(2)?;
    let numbers = require_all_numeric(ctx.args())?;
    Ok(Some(bool_to_str(op(numbers[0].as_f64(), numbers[1].as_f64()))))
}

fn contains(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let (needle, haystack) = ctx.args().split_at(1);
    Ok(Some(bool_to_str(haystack.contains(&needle[0]))))
}

fn logic(ctx: &mut CallContext, op: fn(bool, bool) -> bool) -> CallResult {
    ctx.require_min_args(1)?;
    let result = ctx
        .args()
        .iter()
        .map(|a| Value::new(a).is_truthy())
        .reduce(op)
        .unwrap_or(false);
    Ok(Some(bool_to_str(result)))
}

fn vhead(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let vector = ctx.args().join(" ");
    let head = Value::new(&vector).items().next().map(str::to_string);
    match head {
        Some(head) => Ok(Some(head)),
        None => Err(RuntimeError::handler("vhead: vector is empty")),
    }
}

/// Everything after the first item, spacing preserved.
fn vtail(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(1)?;
    let vector = ctx.args().join(" ");
    let trimmed = vector.trim_start();
    let tail = match trimmed.find(char::is_whitespace) {
        Some(end) => trimmed[end..].trim_start(),
        None => "",
    };
    Ok(Some(tail.to_string()))
}

fn rangev(ctx: &mut CallContext) -> CallResult {
    ctx.require_min_args(2)?;
    let numbers = require_all_numeric(&ctx.args()[..2])?;
    let (start, end) = match (numbers[0].to_int(), numbers[1].to_int()) {
        (Number::Int(a), Number::Int(b)) => (a, b),
        _ => return Err(RuntimeError::format("rangev: bounds must be numbers")),
    };
    if end.saturating_sub(start) > MAX_RANGE_ITEMS {
        return Err(RuntimeError::resource_limit(format!(
            "rangev: ranges are limited to {MAX_RANGE_ITEMS} items"
        )));
    }
    let items: Vec<String> = (start..end).map(|n| n.to_string()).collect();
    Ok(Some(items.join(" ")))
}

/// Random expansions over one generator, which hosts may seed for
/// reproducible runs.
#[derive(Debug)]
pub struct RandomHandler {
    rng: RefCell<StdRng>,
}

impl Default for RandomHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomHandler {
    pub fn new() -> Self {
        Self {
            rng: RefCell::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn select(&self, ctx: &mut CallContext) -> CallResult {
        ctx.require_min_args(1)?;
        let mut rng = self.rng.borrow_mut();
        Ok(ctx.args().choose(&mut *rng).cloned())
    }

    fn shuffle(&self, ctx: &mut CallContext) -> CallResult {
        let mut items = ctx.args().to_vec();
        items.shuffle(&mut *self.rng.borrow_mut());
        Ok(Some(items.join(" ")))
    }

    /// A float between the two bounds, in either order.
    fn uniform(&self, ctx: &mut CallContext) -> CallResult {
        ctx.require_args(2)?;
        let lower = ctx.arg(0)?.to_number()?.as_f64();
        let upper = ctx.arg(1)?.to_number()?.as_f64();
        let x = lower + (upper - lower) * self.rng.borrow_mut().gen::<f64>();
        Ok(Some(Number::Float(x).to_string()))
    }
}

impl CallHandler for RandomHandler {
    fn contains(&self, name: &str) -> bool {
        matches!(name, "select" | "shuffle" | "uniform")
    }

    fn invoke(&self, ctx: &mut CallContext) -> CallResult {
        let name = ctx.call_name().to_string();
        match name.as_str() {
            "select" => self.select(ctx),
            "shuffle" => self.shuffle(ctx),
            "uniform" => self.uniform(ctx),
            other => Err(RuntimeError::name_resolution(format!("random: unknown call '{other}'"))),
        }
    }
}

/// `print` and `input`, bound to any pair of streams.
pub struct StdIoHandler {
    input: RefCell<Box<dyn BufRead>>,
    output: RefCell<Box<dyn Write>>,
}

impl Default for StdIoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StdIoHandler {
    /// Reads from stdin and prints to stdout.
    pub fn new() -> Self {
        Self::with_streams(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    pub fn with_streams(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn print(&self, ctx: &mut CallContext) -> CallResult {
        let line = ctx.args().join(" ");
        let mut output = self.output.borrow_mut();
        writeln!(output, "{line}")
            .and_then(|_| output.flush())
            .map_err(|e| RuntimeError::handler(format!("print: {e}")))?;
        Ok(None)
    }

    fn input(&self, ctx: &mut CallContext) -> CallResult {
        ctx.require_args(1)?;
        let mut line = String::new();
        self.input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|e| RuntimeError::handler(format!("input: {e}")))?;
        let name = ctx.args()[0].clone();
        ctx.set_var(&name, line.trim_end_matches(&['\n', '\r'][..]));
        Ok(None)
    }
}

impl CallHandler for StdIoHandler {
    fn contains(&self, name: &str) -> bool {
        matches!(name, "print" | "input")
    }

    fn invoke(&self, ctx: &mut CallContext) -> CallResult {
        let name = ctx.call_name().to_string();
        match name.as_str() {
            "print" => self.print(ctx),
            "input" => self.input(ctx),
            other => Err(RuntimeError::name_resolution(format!("stdio: unknown call '{other}'"))),
        }
    }
}
