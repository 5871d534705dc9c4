#![allow(dead_code)]

use log::debug;
use simplec::{Compilation, Compiler, CompilerOptions, Result};
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn compile(source: &str) -> Result<Compilation> {
    compile_with(source, CompilerOptions::default())
}

pub fn compile_with(source: &str, options: CompilerOptions) -> Result<Compilation> {
    setup_logging();
    debug!("compiling test source:\n{}", source);
    Compiler::new(options).compile_source(source)
}

/// Assembly for a program expected to be free of diagnostics.
pub fn assembly(source: &str) -> String {
    let compilation = compile(source).unwrap();
    assert!(
        compilation.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        compilation.diagnostics.messages()
    );
    compilation.assembly
}

/// Diagnostic messages for a program expected to compile without a fatal
/// error.
pub fn messages(source: &str) -> Vec<String> {
    compile(source).unwrap().diagnostics.messages()
}

/// The lines of one function, from its label to its `.globl` directive.
pub fn function_body<'a>(assembly: &'a str, name: &str) -> &'a str {
    let start = assembly
        .find(&format!("\n{}:\n", name))
        .map(|index| index + 1)
        .unwrap_or_else(|| panic!("no function {} in:\n{}", name, assembly));
    let end = assembly[start..]
        .find("\t.globl\t")
        .map(|index| start + index)
        .unwrap_or(assembly.len());
    &assembly[start..end]
}

pub struct TestFile {
    pub path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestFile {
    pub fn new(name: &str, content: &str) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        debug!("writing test file: {:?}", path);
        std::fs::write(&path, content)?;
        Ok(Self { path, _dir: dir })
    }

    pub fn dir(&self) -> &Path {
        self._dir.path()
    }
}
