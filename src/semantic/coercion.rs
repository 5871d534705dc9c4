//! Implicit conversions. Every check that needs operands of a particular
//! shape goes through one of these three, which rewrite the tree by wrapping
//! the operand in an explicit `Address` or `Cast` node.

use crate::ast::{Expression, ExpressionKind};
use crate::types::Type;
use log::trace;

/// Arrays decay to a pointer to their first element and characters widen
/// to integers.
pub fn promote(expr: Expression) -> Expression {
    if expr.ty.is_array() {
        let ty = expr.ty.promote();
        trace!("promoting {} to {}", expr.ty, ty);
        Expression::address(expr, ty)
    } else if expr.ty == Type::char() {
        trace!("promoting char to int");
        Expression::cast(Type::int(), expr)
    } else {
        expr
    }
}

/// Widen toward `other` when it is a double, then promote. Integer literals
/// become real literals instead of being cast at run time.
pub fn extend(expr: Expression, other: &Type) -> Expression {
    let widen = (expr.ty == Type::char() || expr.ty == Type::int()) && *other == Type::double();
    if !widen {
        return promote(expr);
    }

    trace!("extending {} to double", expr.ty);
    if let ExpressionKind::Integer(value) = expr.kind {
        Expression::real(value.to_string())
    } else {
        Expression::cast(Type::double(), expr)
    }
}

/// Truncate or widen to `target` as an assignment would.
pub fn convert(expr: Expression, target: &Type) -> Expression {
    let narrows_int = expr.ty == Type::int() && *target == Type::char();
    let narrows_real =
        expr.ty == Type::double() && (*target == Type::int() || *target == Type::char());

    if narrows_int || narrows_real {
        trace!("truncating {} to {}", expr.ty, target);
        return Expression::cast(target.clone(), expr);
    }

    if expr.ty != *target {
        extend(expr, target)
    } else {
        expr
    }
}
