use colored::*;
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recoverable problems found by the checker. The checker records one of
/// these, substitutes an error type and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("redefinition of '{0}'")]
    Redefinition(String),

    #[error("redeclaration of '{0}'")]
    Redeclaration(String),

    #[error("conflicting types for '{0}'")]
    ConflictingTypes(String),

    #[error("'{0}' undeclared")]
    Undeclared(String),

    #[error("break statement not within loop")]
    BreakOutsideLoop,

    #[error("invalid type for test expression")]
    InvalidTest,

    #[error("invalid return type")]
    InvalidReturn,

    #[error("lvalue required in expression")]
    LvalueRequired,

    #[error("invalid operands to binary {0}")]
    InvalidOperands(&'static str),

    #[error("invalid operand to unary {0}")]
    InvalidOperand(&'static str),

    #[error("invalid operand in sizeof expression")]
    InvalidSizeof,

    #[error("invalid operand in cast expression")]
    InvalidCast,

    #[error("called object is not a function")]
    NotAFunction,

    #[error("invalid arguments to called function")]
    InvalidArguments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            location: None,
            hints: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// Render for a terminal, quoting the offending line when the source is
    /// known to `source_map`.
    pub fn report(&self, source_map: &SourceMap) -> String {
        let mut output = String::new();

        let prefix = match self.level {
            DiagnosticLevel::Error => "error".red().bold(),
        };

        output.push_str(&format!("{}: {}\n", prefix, self.message.bold()));

        if let Some(location) = &self.location {
            output.push_str(&format!(
                " {} {}:{}:{}\n",
                "-->".blue().bold(),
                location.file.display(),
                location.line,
                location.column
            ));

            let line = source_map
                .get_source(&location.file)
                .and_then(|source| source.get_line(location.line));
            if let Some(line) = line {
                let gutter = " ".repeat(location.line.to_string().len());
                output.push_str(&format!("{} {}\n", gutter, "|".blue().bold()));
                output.push_str(&format!(
                    "{} {} {}\n",
                    location.line.to_string().blue().bold(),
                    "|".blue().bold(),
                    line
                ));
                output.push_str(&format!(
                    "{} {} {}{}\n",
                    gutter,
                    "|".blue().bold(),
                    " ".repeat(location.column.saturating_sub(1)),
                    "^".red().bold()
                ));
            }
        }

        for hint in &self.hints {
            output.push_str(&format!("{}: {}\n", "help".blue().bold(), hint));
        }

        output
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&SemanticError> for Diagnostic {
    fn from(error: &SemanticError) -> Self {
        let diagnostic = Diagnostic::error(error.to_string());
        match error {
            SemanticError::Undeclared(_) => diagnostic
                .with_hint("each undeclared identifier is reported only once per scope"),
            SemanticError::BreakOutsideLoop => {
                diagnostic.with_hint("break may only appear inside a while or for body")
            }
            _ => diagnostic,
        }
    }
}

/// Collects the semantic diagnostics of one translation unit.
#[derive(Debug, Default)]
pub struct Diagnostics {
    file: PathBuf,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            items: Vec::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn report(&mut self, error: SemanticError, line: usize, column: usize) {
        warn!("{}:{}: {}", self.file.display(), line, error);
        let diagnostic = Diagnostic::from(&error).with_location(SourceLocation {
            file: self.file.clone(),
            line,
            column,
        });
        self.items.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.items.iter().map(|d| d.message.clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct SourceMap {
    sources: HashMap<PathBuf, Source>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: String) {
        self.sources.insert(path.into(), Source::new(content));
    }

    pub fn get_source(&self, path: &Path) -> Option<&Source> {
        self.sources.get(path)
    }
}

#[derive(Debug)]
pub struct Source {
    content: String,
    lines: Vec<usize>, // byte offset of each line start
}

impl Source {
    pub fn new(content: String) -> Self {
        let mut lines = vec![0];
        for (i, c) in content.char_indices() {
            if c == '\n' {
                lines.push(i + 1);
            }
        }
        Self { content, lines }
    }

    /// One-based line lookup.
    pub fn get_line(&self, line: usize) -> Option<&str> {
        let start = *self.lines.get(line.checked_sub(1)?)?;
        let end = self.lines.get(line).copied().unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end())
    }
}
