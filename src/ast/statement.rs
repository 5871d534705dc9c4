use super::Expression;
use crate::symbol_table::ScopeId;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An expression evaluated for its side effects, usually a call.
    Expression(Expression),
    Assignment {
        left: Expression,
        right: Expression,
    },
    Break,
    Return(Expression),
    Block(Block),
    While {
        test: Expression,
        body: Box<Statement>,
    },
    For {
        init: Box<Statement>,
        test: Expression,
        increment: Box<Statement>,
        body: Box<Statement>,
    },
    If {
        test: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
}

/// A braced block: the scope holding its declarations plus its statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub scope: ScopeId,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(scope: ScopeId, statements: Vec<Statement>) -> Self {
        Self { scope, statements }
    }
}
