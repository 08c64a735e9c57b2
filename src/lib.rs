//! Core library: lexer, parser, resolver, and evaluator for the language.
//! Free of `std::time`/`std::io`/CLI concerns (§1) -- those live in `main.rs`
//! and are reached by the evaluator only through the `ClockSource`/`Sink`
//! trait seams in `interpreter`.

pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod syntax;
pub mod token;
pub mod value;

use std::rc::Rc;

use error::Error;
use interpreter::{Interpreter, Sink};
use parser::Parser;
use resolver::Resolver;

/// Runs `source` end to end: lex, parse, abort before resolving/evaluating
/// if any syntax error was reported, otherwise resolve then evaluate against
/// `interpreter`. Returns every collected diagnostic in source order. This
/// is the pipeline sequencing the binary's `main.rs` and the integration
/// tests both call into, matching §2's driver description.
pub fn run(source: &str, interpreter: &Interpreter) -> Vec<Error> {
    let (tokens, lex_errors) = lexer::Lexer::new(source).scan_tokens();
    let (statements, parse_errors) = Parser::new(tokens).parse();

    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        let mut errors = lex_errors;
        errors.extend(parse_errors);
        return errors;
    }

    let resolve_errors = Resolver::new().resolve(&statements);
    if !resolve_errors.is_empty() {
        return resolve_errors;
    }

    interpreter.interpret(&statements)
}

/// Builds an `Interpreter` wired to the given clock/sink and runs `source`
/// through it in one call -- the shape the integration tests use, with a
/// fake `ClockSource` and an in-memory `Sink`.
pub fn run_with(source: &str, clock: Rc<dyn interpreter::ClockSource>, sink: Rc<dyn Sink>) -> Vec<Error> {
    let interpreter = Interpreter::new(clock, sink);
    run(source, &interpreter)
}
