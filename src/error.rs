use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Fatal conditions. Any of these stops compilation immediately; semantic
/// problems are reported through [`crate::diagnostics::Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("line {line}: {message}")]
    Lexical { line: usize, message: String },

    #[error("line {line}: syntax error at '{text}'")]
    Syntax { line: usize, text: String },

    #[error("line {line}: nesting exceeds the limit of {limit} levels")]
    NestingTooDeep { line: usize, limit: usize },

    #[error("line {line}: integer literal '{text}' is out of range")]
    IntegerOverflow { line: usize, text: String },

    #[error("line {line}: size of array '{name}' is too large")]
    ArrayTooLarge { line: usize, name: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub fn lexer_error(line: usize, message: impl Into<String>) -> Self {
        Self::Lexical {
            line,
            message: message.into(),
        }
    }

    pub fn syntax_error(line: usize, text: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            text: text.into(),
        }
    }

    /// Source line the error refers to, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lexical { line, .. }
            | Self::Syntax { line, .. }
            | Self::NestingTooDeep { line, .. }
            | Self::IntegerOverflow { line, .. }
            | Self::ArrayTooLarge { line, .. } => Some(*line),
            Self::Io(_) | Self::Json(_) => None,
        }
    }
}
