//! `pstack` CLI — run programs in the pstack stack language, or talk to it
//! interactively.

use std::fs;
use std::process;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use pstack_core::interpreter::{Interpreter, ScopingMode};
use pstack_core::reader::LineReader;

#[derive(Parser)]
#[command(version, about = "pstack \u{2014} a PostScript-style stack language")]
struct Cli {
    /// Input file to run
    file: Option<String>,

    /// Evaluate the given text instead of reading a file
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Name-resolution discipline: "dynamic" or "lexical"
    #[arg(long, default_value = "dynamic", value_parser = parse_scoping)]
    scoping: ScopingMode,
}

fn parse_scoping(s: &str) -> Result<ScopingMode, String> {
    match s.to_lowercase().as_str() {
        "dynamic" => Ok(ScopingMode::Dynamic),
        "lexical" => Ok(ScopingMode::Lexical),
        _ => Err(format!(
            "unknown scoping mode \"{s}\": expected \"dynamic\" or \"lexical\""
        )),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut interp = Interpreter::new(cli.scoping);

    if let Some(ref text) = cli.eval {
        run_text(&mut interp, text);
        return;
    }

    if let Some(ref file) = cli.file {
        match fs::read_to_string(file) {
            Ok(source) => run_text(&mut interp, &source),
            Err(e) => {
                eprintln!("Error reading {file}: {e}");
                process::exit(1);
            }
        }
        return;
    }

    repl(&mut interp);
}

/// Run source text line by line.
///
/// A failing line aborts only itself: the error is printed and the next
/// line runs against the surviving engine state.
fn run_text(interp: &mut Interpreter, source: &str) {
    let mut reader = LineReader::new();
    for line in source.lines() {
        if let Some(logical) = reader.feed(line) {
            if let Err(e) = interp.run_line(&logical) {
                eprintln!("Error: {e}");
            }
        }
        if interp.quit_requested() {
            break;
        }
    }
}

/// The interactive read-eval-print loop.
fn repl(interp: &mut Interpreter) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {e}");
            process::exit(1);
        }
    };

    let mut reader = LineReader::new();
    loop {
        let prompt = if reader.is_open() { "...> " } else { "PS> " };
        match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(&line);
                if let Some(logical) = reader.feed(&line) {
                    if let Err(e) = interp.run_line(&logical) {
                        eprintln!("Error: {e}");
                    }
                }
                if interp.quit_requested() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C abandons the partially-entered construct.
                reader.reset();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }
}
