use crate::{
    codegen::Generator,
    diagnostics::Diagnostics,
    lexer::Lexer,
    parser::{Parser, DEFAULT_MAX_DEPTH},
    semantic::Checker,
    Result,
};
use log::{debug, info};
use std::{
    panic,
    path::{Path, PathBuf},
    thread,
};

/// Stack for the compiling thread beyond what the nesting levels use.
const STACK_BASE: usize = 4 << 20;
/// Stack reserved per level of statement or expression nesting.
const STACK_PER_LEVEL: usize = 64 << 10;

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Prepended to every global assembly symbol, e.g. `_` on Mach-O.
    pub global_prefix: String,
    pub max_depth: usize,
    /// Treat any semantic diagnostic as a failed compilation.
    pub deny_diagnostics: bool,
    /// Run the checker but emit no assembly.
    pub check_only: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            global_prefix: String::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            deny_diagnostics: false,
            check_only: false,
        }
    }
}

impl CompilerOptions {
    pub fn with_global_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.global_prefix = prefix.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_deny_diagnostics(mut self, deny: bool) -> Self {
        self.deny_diagnostics = deny;
        self
    }

    pub fn with_check_only(mut self, check_only: bool) -> Self {
        self.check_only = check_only;
        self
    }
}

/// The result of compiling one translation unit. Semantic errors do not stop
/// compilation, so assembly is produced even when diagnostics were reported.
#[derive(Debug)]
pub struct Compilation {
    pub assembly: String,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    pub fn succeeded(&self, options: &CompilerOptions) -> bool {
        !(options.deny_diagnostics && self.diagnostics.error_count() > 0)
    }
}

pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compile_file(&self, path: &Path) -> Result<Compilation> {
        let source = std::fs::read_to_string(path)?;
        self.compile(&source, path)
    }

    pub fn compile_source(&self, source: &str) -> Result<Compilation> {
        self.compile(source, "<input>")
    }

    /// Compiles `source`, attributing diagnostics to `file`. Parsing and
    /// generation recurse once per nesting level, so they run on a thread
    /// whose stack is sized from `max_depth`.
    pub fn compile(&self, source: &str, file: impl Into<PathBuf>) -> Result<Compilation> {
        let file = file.into();
        let stack_size = self.stack_size();
        debug!("compiling on a {} byte stack", stack_size);

        thread::scope(|scope| -> Result<Compilation> {
            let worker = thread::Builder::new()
                .name("simplec".into())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || self.run(source, file))?;
            worker
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload))
        })
    }

    fn stack_size(&self) -> usize {
        self.options
            .max_depth
            .saturating_mul(STACK_PER_LEVEL)
            .saturating_add(STACK_BASE)
    }

    fn run(&self, source: &str, file: PathBuf) -> Result<Compilation> {
        info!("compiling {}", file.display());

        let tokens = Lexer::new(source).tokenize()?;
        debug!("{} tokens", tokens.len());

        let checker = Checker::new(Diagnostics::new(file));
        let mut parser =
            Parser::new(tokens.into_iter(), checker).with_max_depth(self.options.max_depth);
        let mut generator = Generator::new(self.options.global_prefix.clone());
        let check_only = self.options.check_only;

        parser.parse(|function, symbols| {
            if !check_only {
                generator.generate_function(&function, symbols);
            }
            Ok(())
        })?;

        let checker = parser.finish();
        let outermost = checker.outermost();
        let (symbols, diagnostics) = checker.into_parts();

        if !check_only {
            generator.generate_globals(&symbols, outermost);
        }
        info!(
            "finished {} with {} diagnostic(s)",
            diagnostics.file().display(),
            diagnostics.error_count()
        );

        Ok(Compilation {
            assembly: generator.finish(),
            diagnostics,
        })
    }
}
