//! The `cxy` command line.

use clap::Parser;
use cxy_common::WarningFlags;
use cxy_driver::{CompilerDriver, Options};
use cxy_parser::dump_sexp;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cxy", about = "The cxy compiler", version)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Compile in test mode (keep `test` declarations)
    #[arg(long)]
    test: bool,

    /// Record source locations on raised exceptions
    #[arg(long)]
    trace_exceptions: bool,

    /// Warning flags: `all`, `none`, `error`, names, `no-` prefixes
    #[arg(long)]
    warnings: Option<String>,

    /// Stop emitting diagnostics after this many errors
    #[arg(long)]
    max_errors: Option<usize>,

    /// Print the S-expression dump of the compiled module
    #[arg(long)]
    dump_ast: bool,

    /// Emit diagnostics as JSON lines instead of text
    #[arg(long)]
    json_diagnostics: bool,

    /// Directory searched for plugin shared objects
    #[arg(long)]
    plugins_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut options = Options {
        test_mode: cli.test,
        trace_exceptions: cli.trace_exceptions,
        dump_ast: cli.dump_ast,
        plugins_dir: cli.plugins_dir,
        ..Options::default()
    };
    if let Some(spec) = &cli.warnings {
        match WarningFlags::parse(spec) {
            Ok(flags) => options.warnings = flags,
            Err(message) => {
                eprintln!("cxy: {message}");
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(max) = cli.max_errors {
        options.max_errors = max;
    }

    let mut driver = CompilerDriver::new(options);
    let unit = match driver.compile_file(&cli.input) {
        Ok(unit) => unit,
        Err(error) => {
            eprintln!("cxy: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in driver.log.diagnostics() {
        if cli.json_diagnostics {
            match serde_json::to_string(diagnostic) {
                Ok(line) => println!("{line}"),
                Err(error) => eprintln!("cxy: cannot encode diagnostic: {error}"),
            }
            continue;
        }
        let kind = match diagnostic.kind {
            cxy_common::DiagnosticKind::Error => "error",
            cxy_common::DiagnosticKind::Warning => "warning",
            cxy_common::DiagnosticKind::Note => "note",
        };
        let file = driver
            .strings
            .try_resolve(diagnostic.loc.file)
            .unwrap_or("<generated>");
        eprintln!(
            "{file}:{}:{}: {kind}: {}",
            diagnostic.loc.begin.row, diagnostic.loc.begin.col, diagnostic.message
        );
    }

    if cli.dump_ast {
        println!("{}", dump_sexp(&unit.arena, &driver.strings, unit.root));
    }

    if driver.exit_code() != 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
