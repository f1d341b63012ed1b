use clap::{Parser, Subcommand};
use ezcode_interpreter::{InterpreterConfig, MAX_CALL_DEPTH, run_source};
use ezcode_parser::{EzParser, Program, lexer::tokenize_line, split_lines};
use miette::{IntoDiagnostic, MietteHandlerOpts, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;

mod repl;
mod sexpr;

#[derive(Parser)]
#[command(
    name = "ezcode",
    version,
    about = "The EZCode scripting language",
    long_about = "EZCode is a line-oriented scripting language with classes, pattern-dispatched constructors and host calls."
)]
struct Cli {
    /// Log parser and interpreter activity (overridden by EZCODE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an EZCode program
    Run {
        /// Source file to run (use '-' to read from stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Maximum depth of nested method calls
        #[arg(long, value_name = "N", default_value_t = MAX_CALL_DEPTH)]
        max_depth: usize,

        /// Do not print parse diagnostics
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the tokens of every source line
    Tokens {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Parse a program and print its outline
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Start an interactive session
    Repl,
}

fn main() {
    setup_miette_handler();

    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Run {
            file,
            max_depth,
            quiet,
        }) => handle_run_command(&file, max_depth, quiet),
        Some(Commands::Tokens { file }) => handle_tokens_command(&file),
        Some(Commands::Parse { file }) => handle_parse_command(&file),
        Some(Commands::Repl) => repl::ReplSession::new()
            .and_then(|mut session| session.run())
            .map_err(miette::Report::new),
        None => {
            // No subcommand provided, show help
            Cli::parse_from(["ezcode", "--help"]);
            Ok(())
        }
    };

    if let Err(report) = result {
        eprintln!("{report:?}");
        process::exit(1);
    }
}

fn setup_miette_handler() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .tab_width(4)
                .with_cause_chain()
                .build(),
        )
    }))
    .ok();
}

/// Install the log subscriber. `EZCODE_LOG` takes precedence over `--verbose`.
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("EZCODE_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn read_source(path: &Path) -> Result<(String, String)> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).into_diagnostic()?;
        return Ok((buffer, "<stdin>".to_string()));
    }
    if !path.exists() {
        return Err(miette::miette!("File not found: {}", path.display()));
    }
    let source = fs::read_to_string(path).into_diagnostic()?;
    Ok((source, path.display().to_string()))
}

/// Name used in stack frames and the exit line: the file stem
fn program_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| *stem != "-")
        .unwrap_or("main")
        .to_string()
}

fn handle_run_command(path: &Path, max_depth: usize, quiet: bool) -> Result<()> {
    let (source, source_name) = read_source(path)?;
    let config = InterpreterConfig {
        file_name: program_name(path),
        max_call_depth: max_depth,
        echo_errors: false,
    };
    debug!(file = %source_name, max_depth, "starting run");

    let (report, diagnostics) = run_source(&source, config);

    if !quiet && (diagnostics.has_errors() || diagnostics.has_warnings()) {
        for report in diagnostics.create_reports_with_filename(&source_name) {
            eprintln!("{report:?}");
        }
        eprintln!("\nDiagnostics: {}", diagnostics.summary());
    }

    for line in &report.output {
        println!("{line}");
    }
    process::exit(report.status);
}

fn handle_tokens_command(path: &Path) -> Result<()> {
    let (source, _) = read_source(path)?;
    for line in split_lines(&source) {
        let tokens = tokenize_line(&line.text)
            .iter()
            .map(|token| format!("{:?}({token})", token.kind))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:>4}: {tokens}", line.number);
    }
    Ok(())
}

fn handle_parse_command(path: &Path) -> Result<()> {
    let (source, source_name) = read_source(path)?;
    let (program, diagnostics) = EzParser::new().parse_program_with_diagnostics(&source);

    if diagnostics.has_errors() || diagnostics.has_warnings() {
        for report in diagnostics.create_reports_with_filename(&source_name) {
            eprintln!("{report:?}");
        }
    }
    print_program(&program);

    if diagnostics.has_errors() {
        return Err(miette::miette!(
            "Parsing failed with {} errors",
            diagnostics.error_count()
        ));
    }
    Ok(())
}

fn print_program(program: &Program) {
    println!("{}", sexpr::format_program_as_sexpr(program));
}
