pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod symbol_table;
pub mod token;
pub mod types;

pub use ast::{Expression, Function, Statement};
pub use compiler::{Compilation, Compiler, CompilerOptions};
pub use diagnostics::{Diagnostic, Diagnostics, SemanticError, SourceMap};
pub use error::{CompileError, Result};
pub use types::Type;

/// Configure `env_logger`. `RUST_LOG` wins over the verbosity flag count.
/// Diagnostics are logged at `warn`, so they only show up in the log from
/// `-v` on.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // a second call from the same process keeps the first logger
    let _ = builder.format_timestamp(None).try_init();
}
