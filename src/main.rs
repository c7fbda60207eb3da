use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as ReplResult};
use std::process::ExitCode;

use scrolls::builtins::{self, StdIoHandler};
use scrolls::{CallKind, Interpreter, ParserState, Tokenizer};

fn main() -> ExitCode {
    init_tracing();
    let interpreter = build_interpreter();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        match run_repl(&interpreter) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        }
    } else {
        match run_script(&interpreter, &args[1]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(report) => {
                eprintln!("{report}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Logs go to stderr, and only when `RUST_LOG` asks for them.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn build_interpreter() -> Interpreter {
    let mut interpreter = Interpreter::new();
    builtins::base_language(&mut interpreter);
    interpreter.add_handler(CallKind::Command, "stdio", StdIoHandler::new());
    interpreter
}

fn run_script(interpreter: &Interpreter, filename: &str) -> Result<(), String> {
    let source = std::fs::read_to_string(filename).map_err(|e| format!("{filename}: {e}"))?;
    interpreter
        .run(&source)
        .map(|_| ())
        .map_err(|e| e.render(&source))
}

fn run_repl(interpreter: &Interpreter) -> ReplResult<()> {
    let mut rl = DefaultEditor::new()?;
    let mut ctx = match interpreter.new_context() {
        Ok(ctx) => ctx,
        Err(err) => {
            println!("{err}");
            return Ok(());
        }
    };
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { ">> " } else { ".. " };
        match rl.readline(prompt) {
            Ok(line) => {
                buffer.push_str(&line);
                buffer.push('\n');
                if Tokenizer::probe(&buffer, interpreter.tokenizer_options())
                    == ParserState::ContinuationNeeded
                {
                    continue;
                }
                rl.add_history_entry(buffer.trim_end())?;
                if let Err(err) = interpreter.run_with(&buffer, &mut ctx) {
                    println!("{}", err.render(&buffer));
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}
