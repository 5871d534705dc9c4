mod expression;
mod statement;

pub use expression::{Comparison, Expression, ExpressionKind};
pub use statement::{Block, Statement};

use crate::symbol_table::SymbolId;

/// A function definition. The body's scope doubles as the parameter scope,
/// whose first `parameters` symbols are the parameters in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub symbol: SymbolId,
    pub parameters: usize,
    pub body: Block,
}

impl Function {
    pub fn new(symbol: SymbolId, parameters: usize, body: Block) -> Self {
        Self {
            symbol,
            parameters,
            body,
        }
    }
}
