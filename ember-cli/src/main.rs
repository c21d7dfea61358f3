use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ember_core::{FsLoader, Interpreter, SourceFile, standard_environment};
use log::LevelFilter;

/// Run an Ember script.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Script to run; reads stdin when omitted.
    input: Option<PathBuf>,

    #[arg(long, env = "EMBER_DEBUG", help = "Log tokens, the AST and call transactions")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.debug { LevelFilter::Debug } else { LevelFilter::Warn };
    let logger = ftlog::Builder::new()
        .max_log_level(level)
        .root(io::stderr());
    let _guard = match logger.try_init() {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: failed to initialise logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let source = read_source(cli)?;
    let base = cli
        .input
        .as_ref()
        .and_then(|path| path.parent())
        .map(PathBuf::from)
        .unwrap_or_default();

    let mut interpreter = Interpreter::new().with_loader(FsLoader::with_base(base));
    if cli.debug {
        dump(&interpreter, &source);
    }

    let env = standard_environment();
    match interpreter.run(source, &env) {
        Ok(value) => {
            if !value.is_nothing() {
                println!("{value}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err.render());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_source(cli: &Cli) -> Result<Arc<SourceFile>> {
    match &cli.input {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {}", path.display()))?;
            Ok(SourceFile::new(path.display().to_string(), text))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(SourceFile::new("<stdin>", buffer))
        }
    }
}

/// Log the token stream and AST; failures are left for `run` to report.
fn dump(interpreter: &Interpreter, source: &Arc<SourceFile>) {
    if let Ok(tokens) = ember_core::tokenize(source) {
        log::debug!("tokens: {tokens:#?}");
    }
    if let Ok(root) = interpreter.parse_source(source) {
        log::debug!("ast: {root:#?}");
    }
}
