use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::debug;
use simplec::{
    diagnostics::SourceLocation, init_logging, CompileError, Compiler, CompilerOptions, Diagnostic,
    SourceMap,
};
use std::{fs, path::PathBuf, process::ExitCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    Human,
    Json,
}

#[derive(Parser)]
#[command(name = "scc")]
#[command(about = "Simple C compiler for i386")]
#[command(version)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Write assembly here instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prefix for global symbols, e.g. "_" on Mach-O
    #[arg(long, default_value = "")]
    global_prefix: String,

    /// Maximum statement and expression nesting
    #[arg(long, default_value_t = simplec::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Only check the program, do not generate assembly
    #[arg(long)]
    check: bool,

    /// Exit with failure if any diagnostic was reported
    #[arg(long)]
    deny_diagnostics: bool,

    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    message_format: MessageFormat,

    /// Increase log verbosity (-v, -vv, -vvv, -vvvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            debug!("fatal: {:?}", err);
            report_fatal(&cli, &err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded; fatal errors come back as `Err`.
fn run(cli: &Cli) -> simplec::Result<bool> {
    let options = CompilerOptions::default()
        .with_global_prefix(cli.global_prefix.as_str())
        .with_max_depth(cli.max_depth)
        .with_deny_diagnostics(cli.deny_diagnostics)
        .with_check_only(cli.check);

    let source = fs::read_to_string(&cli.input)?;
    let compiler = Compiler::new(options);
    let compilation = compiler.compile(&source, cli.input.clone())?;

    let mut source_map = SourceMap::new();
    source_map.add_file(cli.input.clone(), source);
    for diagnostic in compilation.diagnostics.iter() {
        emit(cli, diagnostic, &source_map)?;
    }

    if !cli.check {
        match &cli.output {
            Some(path) => {
                debug!("writing {}", path.display());
                fs::write(path, &compilation.assembly)?;
            }
            None => print!("{}", compilation.assembly),
        }
    }

    Ok(compilation.succeeded(compiler.options()))
}

fn emit(cli: &Cli, diagnostic: &Diagnostic, source_map: &SourceMap) -> simplec::Result<()> {
    match cli.message_format {
        MessageFormat::Human => eprint!("{}", diagnostic.report(source_map)),
        MessageFormat::Json => eprintln!("{}", diagnostic.to_json()?),
    }
    Ok(())
}

fn report_fatal(cli: &Cli, err: &CompileError) {
    let mut diagnostic = Diagnostic::error(err.to_string());
    if let Some(line) = err.line() {
        diagnostic = diagnostic.with_location(SourceLocation {
            file: cli.input.clone(),
            line,
            column: 0,
        });
    }

    match cli.message_format {
        MessageFormat::Json => match diagnostic.to_json() {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{}: {}", "error".red().bold(), err),
        },
        MessageFormat::Human => {
            eprintln!("{}: {}: {}", cli.input.display(), "error".red().bold(), err)
        }
    }
}
