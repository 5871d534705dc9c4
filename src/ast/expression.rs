use crate::symbol_table::SymbolId;
use crate::types::Type;
use std::fmt;

/// A checked expression. Built only by the checker, so `ty` and `lvalue`
/// are always final.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: Type,
    pub lvalue: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Integer(u32),
    /// Source spelling of a double constant.
    Real(String),
    /// Unescaped string contents.
    String(String),
    Identifier(SymbolId),
    Call {
        callee: SymbolId,
        args: Vec<Expression>,
    },
    Not(Box<Expression>),
    Negate(Box<Expression>),
    Dereference(Box<Expression>),
    Address(Box<Expression>),
    Increment {
        operand: Box<Expression>,
        scale: u32,
    },
    Decrement {
        operand: Box<Expression>,
        scale: u32,
    },
    Cast(Box<Expression>),
    Multiply {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Divide {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Remainder {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Pointer arithmetic multiplies the integer side by the matching scale.
    Add {
        left: Box<Expression>,
        right: Box<Expression>,
        scale_left: u32,
        scale_right: u32,
    },
    /// `scale_result` is non-zero for pointer difference, which divides.
    Subtract {
        left: Box<Expression>,
        right: Box<Expression>,
        scale_right: u32,
        scale_result: u32,
    },
    Compare {
        op: Comparison,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    LogicalAnd {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    LogicalOr {
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::LessEqual => "<=",
            Comparison::GreaterEqual => ">=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: Type) -> Self {
        Self {
            kind,
            ty,
            lvalue: false,
        }
    }

    pub fn integer(value: u32) -> Self {
        Self::new(ExpressionKind::Integer(value), Type::int())
    }

    pub fn real(text: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Real(text.into()), Type::double())
    }

    /// Identifiers denote storage only when their type is scalar; arrays
    /// and functions are not assignable.
    pub fn identifier(symbol: SymbolId, ty: Type) -> Self {
        let lvalue = ty.is_scalar();
        Self {
            kind: ExpressionKind::Identifier(symbol),
            ty,
            lvalue,
        }
    }

    /// A dereference is always an lvalue, even when its type is erroneous.
    pub fn dereference(pointer: Expression, ty: Type) -> Self {
        Self {
            kind: ExpressionKind::Dereference(Box::new(pointer)),
            ty,
            lvalue: true,
        }
    }

    pub fn cast(ty: Type, operand: Expression) -> Self {
        Self::new(ExpressionKind::Cast(Box::new(operand)), ty)
    }

    pub fn address(operand: Expression, ty: Type) -> Self {
        Self::new(ExpressionKind::Address(Box::new(operand)), ty)
    }

    pub fn is_integer_literal(&self) -> bool {
        matches!(self.kind, ExpressionKind::Integer(_))
    }
}
