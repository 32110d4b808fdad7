// ABOUTME: CLI/REPL driver exercising eval/eval_text over stdin or a script file

mod apply;
mod config;
mod env;
mod error;
mod eval;
mod ffi;
mod interner;
mod parser;
mod pattern;
mod primitives;
mod stack;
mod trace;
mod value;

use clap::Parser as ClapParser;
use env::Environment;
use eval::{eval_text, Interpreter};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;

/// A small evaluator core: value stack, call trace, pattern matcher,
/// applicator and evaluator, with a minimal reader and primitive table
/// just sufficient to drive it from a script or a REPL.
#[derive(ClapParser, Debug)]
#[command(name = "sexpr-core")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking evaluator core for a small Lisp dialect")]
struct CliArgs {
    /// Script file to execute (omit to start the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let global_env = Environment::new();
    primitives::register(&global_env);
    let mut interp = Interpreter::new(global_env.clone());

    match args.script {
        Some(path) => run_script(&path, &global_env, &mut interp),
        None => run_repl(&global_env, &mut interp),
    }
}

fn run_script(
    path: &PathBuf,
    env: &std::rc::Rc<Environment>,
    interp: &mut Interpreter,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read script file {}: {e}", path.display()))?;
    eval_text(interp, env, &contents, false);
    Ok(())
}

fn run_repl(env: &std::rc::Rc<Environment>, interp: &mut Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = DefaultEditor::with_config(rl_config)
        .map_err(|e| format!("Failed to initialize REPL: {e}"))?;
    let _ = rl.load_history(config::HISTORY_FILE);

    loop {
        match rl.readline("sexpr> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if matches!(line.trim(), "(quit)" | "(exit)") {
                    break;
                }
                eval_text(interp, env, &line, true);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(config::HISTORY_FILE);
    Ok(())
}
