use super::builtins::{self, RandomHandler, StdIoHandler};
use super::value::Value;
use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;

type Calls = Rc<RefCell<Vec<Vec<String>>>>;

/// An interpreter with the base library and a `record` command that keeps
/// the arguments of every call.
fn recording_interpreter(limits: Limits) -> (Interpreter, Calls) {
    let mut interpreter = Interpreter::new().with_limits(limits);
    builtins::base_language(&mut interpreter);
    let calls: Calls = Rc::default();
    let sink = Rc::clone(&calls);
    let mut handler = CallbackHandler::new();
    handler.add_call("record", move |ctx| {
        sink.borrow_mut().push(ctx.args().to_vec());
        Ok(None)
    });
    interpreter.add_handler(CallKind::Command, "record", handler);
    (interpreter, calls)
}

fn run_and_record(script: &str) -> Vec<Vec<String>> {
    let (interpreter, calls) = recording_interpreter(Limits::default());
    if let Err(err) = interpreter.run(script) {
        panic!("{}", err.render(script));
    }
    let recorded = calls.borrow().clone();
    recorded
}

fn assert_records(script: &str, expected: &[&[&str]]) {
    let expected: Vec<Vec<String>> = expected
        .iter()
        .map(|args| args.iter().map(|a| a.to_string()).collect())
        .collect();
    assert_eq!(expected, run_and_record(script), "while running {script:?}");
}

fn runtime_error(script: &str, limits: Limits) -> RuntimeError {
    let (interpreter, _) = recording_interpreter(limits);
    match interpreter.run(script) {
        Err(crate::Error::Runtime(err)) => err,
        Err(crate::Error::Parse(err)) => panic!("{script:?} failed to parse: {err}"),
        Ok(_) => panic!("{script:?} ran without error"),
    }
}

fn assert_raises(script: &str, kind: ErrorKind, msg: &str) {
    let err = runtime_error(script, Limits::default());
    assert_eq!(kind, err.kind(), "wrong error kind for {script:?}: {err}");
    assert!(
        err.message().contains(msg),
        "expected {:?} in error message {:?}",
        msg,
        err.message()
    );
}

#[test]
fn test_variables_keep_spaces() {
    assert_records("set x 1 2 3; record $x", &[&["1 2 3"]]);
    assert_records("set x a; set y $x$x; record $y", &[&["aa"]]);
    assert_records("set name x; set x 5; record $$name", &[&["5"]]);
}

#[test]
fn test_vector_expansion() {
    assert_records("set x 1 2 3\nrecord $^x", &[&["1", "2", "3"]]);
    assert_records("set x \"  a   b \"\nrecord $^x end", &[&["a", "b", "end"]]);
    assert_records("set x \"a   b\"\nrecord pre$^x", &[&["prea b"]]);
    assert_records("set x\nrecord $^x", &[&[]]);
    assert_records("record $^(rangev 0 3)", &[&["0", "1", "2"]]);
}

#[test]
fn test_vector_expansion_in_name_position() {
    assert_records("set c record hi there\n$^c more", &[&["hi", "there", "more"]]);
    assert_records(
        "!def(twice n) {\n    return $(* $n 2)\n}\nset c twice 5\nrecord $($^c)",
        &[&["10"]],
    );
    assert_raises(
        "set c\n$^c a",
        ErrorKind::NameResolution,
        "command name must not be empty",
    );
}

#[test]
fn test_repeat() {
    assert_records("!repeat(3) record hi", &[&["hi"], &["hi"], &["hi"]]);
    assert_records("!repeat(0) record hi", &[]);
}

#[test]
fn test_def_and_return() {
    assert_records(
        "!def(square n) {\n    return $(* $n $n)\n}\nrecord $(square 4)",
        &[&["16"]],
    );
    assert_records(
        "!def(tail first *rest) {\n    return $rest\n}\nrecord $(tail a b c)",
        &[&["b c"]],
    );
    assert_records(
        "!def(greet who) {\n    record hello $who\n}\ngreet world",
        &[&["hello", "world"]],
    );
    assert_records(
        "!def(first_even *xs) {\n    !for(x in $^xs) {\n        !if($(eq? $(% $x 2) 0)) return $x\n    }\n    return none\n}\nrecord $(first_even 1 3 4 6)",
        &[&["4"]],
    );
}

#[test]
fn test_local_scopes() {
    assert_records(
        "set x global\n!def(f) {\n    set x local\n    record $x\n}\nf\nrecord $x",
        &[&["local"], &["global"]],
    );
    assert_raises(
        "set x 1\n!def(f) {\n    record $x\n}\nf",
        ErrorKind::NameResolution,
        "no such variable 'x'",
    );
}

#[test]
fn test_global_and_nonlocal() {
    assert_records(
        "set x 1\n!def(f) {\n    global x\n    set x 2\n}\nf\nrecord $x",
        &[&["2"]],
    );
    assert_records(
        "!def(outer) {\n    set n 1\n    inner\n    record $n\n}\n!def(inner) {\n    nonlocal n\n    set n 2\n}\nouter",
        &[&["2"]],
    );
    assert_raises(
        "!def(f) {\n    nonlocal q\n}\nf",
        ErrorKind::NameResolution,
        "nonlocal: no enclosing scope binds 'q'",
    );
}

#[test]
fn test_conditionals() {
    assert_records(
        "!for(n in 1 2 3) {\n    !if($(eq? $n 1)) record one\n    !elif($(eq? $n 2)) record two\n    !else { record many }\n}",
        &[&["one"], &["two"], &["many"]],
    );
    assert_records("!if($false) record no\n!else { record yes }", &[&["yes"]]);
    assert_records("!if(anything) record yes", &[&["yes"]]);
}

#[test]
fn test_else_chain_must_be_contiguous() {
    assert_records("!if(0) record a; record mid; !else { record z }", &[&["mid"]]);
    assert_records(
        "!if(0) record a\n!elif(0) record b\nrecord mid\n!else { record z }",
        &[&["mid"]],
    );
    assert_records(
        "!if(0) record a\n!elif(0) record b\n!elif(1) record c\n!else { record z }",
        &[&["c"]],
    );
    assert_records(
        "!if(0) record a\n!else { record z }\n!else { record again }",
        &[&["z"]],
    );
    assert_records("!elif(1) record orphan\n!else { record orphan }", &[]);
}

#[test]
fn test_loops() {
    assert_records(
        "set i 0\n!while($(< $i 3)) {\n    record $i\n    set i $(+ $i 1)\n}",
        &[&["0"], &["1"], &["2"]],
    );
    assert_records("!for(x in a b) record $x", &[&["a"], &["b"]]);
    assert_raises(
        "!for(x in a b) { }\nrecord $x",
        ErrorKind::NameResolution,
        "no such variable 'x'",
    );
    assert_raises("!for(x of a b) { }", ErrorKind::Handler, "for: expected 'in', found 'of'");
}

#[test]
fn test_stop() {
    let (interpreter, calls) = recording_interpreter(Limits::default());
    let ctx = interpreter
        .run("record a\n!repeat(5) {\n    record b\n    stop\n    record c\n}\nrecord d")
        .unwrap();
    assert!(ctx.is_stopped());
    assert_eq!(vec![vec!["a".to_string()], vec!["b".to_string()]], *calls.borrow());
}

#[test]
fn test_arithmetic() {
    assert_records(
        "record $(+ 1 2) $(+ 1 2.5) $(- 5) $(- 10 1 2) $(* 2 3) $(/ 7 2) $(/ 4 2)",
        &[&["3", "3.5", "-5", "7", "6", "3.5", "2.0"]],
    );
    assert_records(
        "record $(// 7 2) $(// -7 2) $(% -7 3) $(% 7 -3) $(toint 3.7) $(tofloat 2)",
        &[&["3", "-4", "2", "-2", "3", "2.0"]],
    );
    assert_records("record $(+ 9223372036854775807 1)", &[&["9.223372036854776e18"]]);
    assert_records(
        "record $(/ 100000000000000000000 1) $(* 1000000.0 1000000000.0)",
        &[&["1e20", "1000000000000000.0"]],
    );
    assert_records(
        "set x $(tofloat 10000000000000000)\nrecord $x $(// $x 3)",
        &[&["1e16", "3333333333333333.0"]],
    );
    assert_raises("record $(+ 1 x)", ErrorKind::Format, "\"x\" is not a valid int or float");
    assert_raises("record $(/ 1 0)", ErrorKind::Handler, "division by zero");
    assert_raises("!repeat(1.5) { }", ErrorKind::Format, "not a valid integer");
}

#[test]
fn test_comparison_and_logic() {
    assert_records(
        "record $(eq? 1 1.0) $(eq? a a) $(neq? a b) $(== 2 3) $(in? b a b c) $(>= 2 2) $(< 3 2)",
        &[&["1", "1", "1", "0", "1", "1", "0"]],
    );
    assert_records(
        "record $(and 1 1) $(or 0 0) $(xor 1 1 1) $(not 0) $(not x)",
        &[&["1", "0", "1", "1", "0"]],
    );
    assert_records("record $true $false", &[&["1", "0"]]);
}

#[test]
fn test_string_and_vector_calls() {
    assert_records(
        "set e\nrecord $(cat a b c) $(concat x y) $(vhead a b c) $(vtail a b c) $(vempty? $e) $(vempty? a)",
        &[&["abc", "xy", "a", "b c", "1", "0"]],
    );
    assert_raises("set e\nrecord $(vhead $e)", ErrorKind::Handler, "vhead: vector is empty");
    assert_raises(
        "record $(rangev 0 1000000)",
        ErrorKind::ResourceLimit,
        "rangev: ranges are limited",
    );
}

#[test]
fn test_unset() {
    assert_raises("set x 1; unset x; record $x", ErrorKind::NameResolution, "'x'");
    assert_raises("unset nothing", ErrorKind::NameResolution, "no such variable 'nothing'");
}

#[test]
fn test_call_errors() {
    assert_raises("nope 1", ErrorKind::NameResolution, "command 'nope' not found");
    assert_raises("record $(nope)", ErrorKind::NameResolution, "expansion 'nope' not found");
    assert_raises("!nope(1) { }", ErrorKind::NameResolution, "control 'nope' not found");
    assert_raises(
        "set empty\n$empty a",
        ErrorKind::NameResolution,
        "command name must not be empty",
    );
    assert_raises("return 5", ErrorKind::Handler, "return outside of a defined call");
    assert_raises("!def(f a) { }\nf", ErrorKind::Handler, "f: expected 1 argument, got 0");
    assert_raises("set", ErrorKind::Handler, "set: requires at least 1 argument");
}

#[test]
fn test_call_depth_limit() {
    let limits = Limits {
        max_call_depth: 32,
        ..Limits::default()
    };
    let err = runtime_error("!def(f) {\n    f\n}\nf", limits);
    assert_eq!(ErrorKind::ResourceLimit, err.kind());
    assert_eq!(32, err.backtrace().len());
    assert!(err.backtrace().iter().all(|frame| frame.call_name == "f"));
}

#[test]
fn test_step_limit() {
    let limits = Limits {
        max_steps: 1000,
        ..Limits::default()
    };
    let err = runtime_error("!while(1) {}", limits);
    assert_eq!(ErrorKind::ResourceLimit, err.kind());
    assert!(err.message().contains("1000"), "{}", err.message());

    let err = runtime_error("!def(f) {\n    return $(f)\n}\nrecord $(f)", limits);
    assert_eq!(ErrorKind::ResourceLimit, err.kind());
}

#[test]
fn test_steps_are_counted_per_run() {
    let (interpreter, _) = recording_interpreter(Limits::default());
    assert_eq!(2, interpreter.run("record a").unwrap().steps());
    assert_eq!(3, interpreter.run("record $(+ 1 2)").unwrap().steps());

    let mut ctx = interpreter.new_context().unwrap();
    interpreter.run_with("record a; record b", &mut ctx).unwrap();
    interpreter.run_with("record c", &mut ctx).unwrap();
    assert_eq!(2, ctx.steps());
}

#[test]
fn test_backtrace() {
    let source = "!def(inner) {\n    return $(nope)\n}\n!def(outer x) {\n    return $(inner)\n}\nrecord $(outer 1)";
    let err = runtime_error(source, Limits::default());
    assert_eq!(ErrorKind::NameResolution, err.kind());
    assert_eq!(Some(1), err.location().map(|l| l.line));

    let names: Vec<&str> = err.backtrace().iter().map(|f| f.call_name.as_str()).collect();
    assert_eq!(vec!["outer", "inner", "nope"], names);
    assert!(err.backtrace().iter().all(|f| f.kind == CallKind::Expansion));
    assert_eq!(vec!["1".to_string()], err.backtrace()[0].arguments);
    assert_eq!(6, err.backtrace()[0].location.line);

    let rendered = err.render(source);
    assert!(rendered.starts_with("backtrace (innermost call last):\n"), "{rendered}");
    assert!(rendered.contains("expansion 'outer' with (1)"), "{rendered}");
    assert!(
        rendered.ends_with("name resolution error: expansion 'nope' not found"),
        "{rendered}"
    );
}

#[test]
fn test_parse_errors_run_nothing() {
    for script in ["record a\nrecord )", "record a\nrecord b!c", "record a\n!repeat(2)"] {
        let (interpreter, calls) = recording_interpreter(Limits::default());
        let err = interpreter.run(script).unwrap_err();
        assert!(matches!(err, crate::Error::Parse(_)), "{script:?}: {err}");
        assert!(calls.borrow().is_empty(), "{script:?} ran {:?}", calls.borrow());
    }
}

#[test]
fn test_random_calls() {
    let seeded = |seed| {
        let (mut interpreter, calls) = recording_interpreter(Limits::default());
        interpreter.add_handler(CallKind::Expansion, "random", RandomHandler::with_seed(seed));
        interpreter
            .run("record $(select a b c) $(shuffle 1 2 3 4 5) $(uniform 2 4) $(uniform 1 1)")
            .unwrap();
        let recorded = calls.borrow()[0].clone();
        recorded
    };
    let first = seeded(7);
    assert_eq!(first, seeded(7));
    assert!(["a", "b", "c"].contains(&first[0].as_str()));

    let mut shuffled: Vec<&str> = first[1].split(' ').collect();
    shuffled.sort();
    assert_eq!(vec!["1", "2", "3", "4", "5"], shuffled);

    let x = Value::new(&first[2]).to_number().unwrap();
    assert!(x.is_float() && (2.0..=4.0).contains(&x.as_f64()), "{x}");
    assert_eq!("1.0", first[3]);

    assert_raises(
        "record $(uniform 1)",
        ErrorKind::Handler,
        "uniform: expected 2 arguments, got 1",
    );
    assert_raises("record $(uniform a 2)", ErrorKind::Format, "\"a\" is not a valid int or float");
    assert_raises("record $(select)", ErrorKind::Handler, "select: requires at least 1 argument");
}

#[test]
fn test_error_display() {
    let err = runtime_error("nope", Limits::default());
    assert_eq!("name resolution error: command 'nope' not found", err.to_string());

    let (interpreter, _) = recording_interpreter(Limits::default());
    let err = interpreter.run("record \"open").unwrap_err();
    assert!(matches!(err, crate::Error::Parse(_)));
}

#[test]
fn test_host_handlers() {
    let (mut interpreter, calls) = recording_interpreter(Limits::default());
    let mut custom = CallbackHandler::new();
    custom
        .add_call("upper", |ctx| Ok(Some(ctx.args().join(" ").to_uppercase())))
        .add_alias("shout", "upper");
    interpreter.add_handler(CallKind::Expansion, "custom", custom);

    let mut twice = CallbackHandler::new();
    twice.add_call("twice", |ctx| {
        ctx.require_args(0)?;
        ctx.interpret_body()?;
        ctx.interpret_body()?;
        Ok(None)
    });
    interpreter.add_handler(CallKind::Control, "twice", twice);

    interpreter
        .run("record $(upper abc) $(shout x)\n!twice() record again")
        .unwrap();
    assert_eq!(
        vec![
            vec!["ABC".to_string(), "X".to_string()],
            vec!["again".to_string()],
            vec!["again".to_string()],
        ],
        *calls.borrow()
    );
}

#[test]
fn test_handler_chain_order() {
    let mut chain = HandlerChain::default();
    let mut first = CallbackHandler::new();
    first.add_call("x", |_| Ok(Some("first".to_string())));
    let mut second = CallbackHandler::new();
    second
        .add_call("x", |_| Ok(Some("second".to_string())))
        .add_call("y", |_| Ok(None));
    chain.add("first", first);
    chain.add("second", second);
    assert_eq!(vec!["first", "second"], chain.names().collect::<Vec<_>>());
    assert!(chain.get_for_call("x").is_some());
    assert!(chain.get_for_call("z").is_none());

    let mut replacement = CallbackHandler::new();
    replacement.add_call("z", |_| Ok(None));
    chain.add("first", replacement);
    assert_eq!(vec!["first", "second"], chain.names().collect::<Vec<_>>());
    assert!(chain.get_for_call("z").is_some());

    assert!(chain.remove("first").is_some());
    assert!(chain.get_for_call("z").is_none());
    assert!(chain.get("second").is_some_and(|h| h.contains("y")));
}

#[test]
fn test_first_handler_wins() {
    let (mut interpreter, calls) = recording_interpreter(Limits::default());
    let mut shadow = CallbackHandler::new();
    shadow.add_call("cat", |_| Ok(Some("shadowed".to_string())));
    interpreter.add_handler(CallKind::Expansion, "shadow", shadow);
    interpreter.run("record $(cat a b)").unwrap();
    assert_eq!(vec![vec!["ab".to_string()]], *calls.borrow());

    interpreter.registry_mut().chain_mut(CallKind::Expansion).remove("string");
    interpreter.run("record $(cat a b)").unwrap();
    assert_eq!(vec!["shadowed".to_string()], calls.borrow()[1]);
}

#[test]
fn test_definitions_shadow_handlers() {
    assert_records(
        "!def(cat *xs) {\n    return joined\n}\nrecord $(cat a b)",
        &[&["joined"]],
    );
}

#[test]
fn test_persistent_context() {
    let (interpreter, calls) = recording_interpreter(Limits::default());
    let mut ctx = interpreter.new_context().unwrap();
    interpreter.run_statement("set x 5\n", &mut ctx).unwrap();
    interpreter
        .run_statement("!def(double n) { return $(* $n 2) }", &mut ctx)
        .unwrap();
    interpreter.run_statement("record $(double $x)", &mut ctx).unwrap();
    interpreter.run_statement("  \n", &mut ctx).unwrap();
    assert!(ctx.is_defined(CallKind::Expansion, "double"));
    assert_eq!(Some("5"), ctx.get_var("x"));
    assert_eq!(vec![vec!["10".to_string()]], *calls.borrow());

    let err = interpreter.run_statement("a; b", &mut ctx).unwrap_err();
    assert!(matches!(err, crate::Error::Parse(_)));

    // a failed run leaves the context usable
    assert!(interpreter.run_statement("nope", &mut ctx).is_err());
    assert_eq!(0, ctx.scopes().depth());
    interpreter.run_statement("record $x", &mut ctx).unwrap();
}

#[test]
fn test_initializers() {
    let mut interpreter = Interpreter::new();
    interpreter.add_initializer(|ctx| {
        ctx.set_var("greeting", "hi");
        Ok(())
    });
    let ctx = interpreter.run("").unwrap();
    assert_eq!(Some("hi"), ctx.get_var("greeting"));

    interpreter.add_initializer(|_| Err(RuntimeError::handler("refused")));
    assert!(interpreter.new_context().is_err());
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_stdio_handler() {
    let output = SharedBuffer::default();
    let stdio = StdIoHandler::with_streams(
        Box::new(Cursor::new(b"alice\r\nbob\n".to_vec())),
        Box::new(output.clone()),
    );
    let mut interpreter = Interpreter::new();
    builtins::base_language(&mut interpreter);
    interpreter.add_handler(CallKind::Command, "stdio", stdio);

    let ctx = interpreter
        .run("input first\ninput second\nprint hello $first and $second\ninput third")
        .unwrap();
    assert_eq!(Some(""), ctx.get_var("third"));
    assert_eq!(
        "hello alice and bob\n",
        String::from_utf8_lossy(&output.0.borrow())
    );
}

#[test]
fn test_custom_tokenizer_options() {
    let options = crate::parser::TokenizerOptions {
        comments: false,
        ..Default::default()
    };
    let mut interpreter = Interpreter::new().with_tokenizer_options(options);
    builtins::base_language(&mut interpreter);
    let ctx = interpreter.run("set tag #1").unwrap();
    assert_eq!(Some("#1"), ctx.get_var("tag"));
}

fn statement() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("set x 1"),
        Just("set x $(+ $x 1)"),
        Just("set v a b c"),
        Just("record $x"),
        Just("record $^v"),
        Just("unset x"),
        Just("!repeat(2) record $(* $x 2)"),
        Just("!if($(> $x 2)) stop"),
        Just("!def(f) { return $(vtail $^v) }"),
        Just("set v $(f)"),
    ]
}

proptest! {
    #[test]
    fn runs_are_deterministic(statements in prop::collection::vec(statement(), 0..12)) {
        let script = statements.join("\n");
        let outcome = || {
            let (interpreter, calls) = recording_interpreter(Limits::default());
            let result = interpreter.run(&script).map(|ctx| ctx.steps());
            let recorded = calls.borrow().clone();
            (result, recorded)
        };
        prop_assert_eq!(outcome(), outcome());
    }

    #[test]
    fn untrusted_scripts_never_panic(input in "[a-z0-9 $^!(){};\n]{0,64}") {
        let limits = Limits { max_call_depth: 16, max_steps: 500, max_nesting: 32 };
        let (interpreter, _) = recording_interpreter(limits);
        let _ = interpreter.run(&input);
    }
}
