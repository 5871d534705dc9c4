use super::coercion::{convert, extend, promote};
use crate::{
    ast::{Comparison, Expression, ExpressionKind, Statement},
    diagnostics::{Diagnostics, SemanticError},
    symbol_table::{ScopeId, Symbol, SymbolId, SymbolTable},
    types::Type,
};
use log::debug;
use std::collections::HashSet;

/// Semantic checker for one translation unit.
///
/// The parser calls one operation per construct, in source order. Each
/// operation validates its operands, records a diagnostic when they are
/// wrong, and returns a typed node. An operand that already has the error
/// type makes the result an error too, without a second diagnostic.
pub struct Checker {
    symbols: SymbolTable,
    outermost: ScopeId,
    defined: HashSet<String>,
    diagnostics: Diagnostics,
    line: usize,
    column: usize,
    loop_depth: usize,
    return_type: Type,
}

impl Checker {
    pub fn new(diagnostics: Diagnostics) -> Self {
        let mut symbols = SymbolTable::new();
        let outermost = symbols.open();
        Self {
            symbols,
            outermost,
            defined: HashSet::new(),
            diagnostics,
            line: 1,
            column: 1,
            loop_depth: 0,
            return_type: Type::Error,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn outermost(&self) -> ScopeId {
        self.outermost
    }

    pub fn into_parts(self) -> (SymbolTable, Diagnostics) {
        (self.symbols, self.diagnostics)
    }

    /// Position attached to diagnostics reported from now on.
    pub fn set_location(&mut self, line: usize, column: usize) {
        self.line = line;
        self.column = column;
    }

    fn report(&mut self, error: SemanticError) {
        self.diagnostics.report(error, self.line, self.column);
    }

    fn current(&self) -> ScopeId {
        self.symbols.current().unwrap_or(self.outermost)
    }

    pub fn open_scope(&mut self) -> ScopeId {
        self.symbols.open()
    }

    pub fn close_scope(&mut self) -> ScopeId {
        self.symbols.close().unwrap_or(self.outermost)
    }

    /// Close the parameter scope of a function that is only declared. Its
    /// symbols are dropped since the signature already lives in the type.
    pub fn close_parameter_scope(&mut self) {
        let scope = self.close_scope();
        if scope != self.outermost {
            self.symbols.discard(scope);
        }
    }

    pub fn begin_function(&mut self, return_type: Type) {
        self.return_type = return_type;
        self.loop_depth = 0;
    }

    pub fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub fn leave_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    /// Define a function in the outermost scope. A second definition of the
    /// same name keeps the first one.
    pub fn define_function(&mut self, name: &str, ty: Type) -> SymbolId {
        if self.defined.contains(name) {
            self.report(SemanticError::Redefinition(name.to_string()));
            if let Some(existing) = self.symbols.find(self.outermost, name) {
                return existing;
            }
        }

        self.defined.insert(name.to_string());
        self.declare_function(name, ty)
    }

    /// Declare a function in the outermost scope. A redeclaration is
    /// dropped, after a diagnostic if its type differs.
    pub fn declare_function(&mut self, name: &str, ty: Type) -> SymbolId {
        match self.symbols.find(self.outermost, name) {
            None => {
                debug!("declaring function {}: {}", name, ty);
                self.symbols.insert(self.outermost, Symbol::new(name, ty))
            }
            Some(existing) => {
                if self.symbols.symbol(existing).ty != ty {
                    self.report(SemanticError::ConflictingTypes(name.to_string()));
                }
                existing
            }
        }
    }

    pub fn declare_variable(&mut self, name: &str, ty: Type) -> SymbolId {
        let scope = self.current();
        match self.symbols.find(scope, name) {
            None => self.symbols.insert(scope, Symbol::new(name, ty)),
            Some(existing) => {
                if scope != self.outermost {
                    self.report(SemanticError::Redeclaration(name.to_string()));
                } else if self.symbols.symbol(existing).ty != ty {
                    self.report(SemanticError::ConflictingTypes(name.to_string()));
                }
                existing
            }
        }
    }

    /// Resolve a use of `name`. An undeclared name is entered into the
    /// current scope with the error type so it is reported once.
    pub fn check_identifier(&mut self, name: &str) -> SymbolId {
        if let Some(symbol) = self.symbols.lookup(name) {
            return symbol;
        }

        self.report(SemanticError::Undeclared(name.to_string()));
        let scope = self.current();
        self.symbols.insert(scope, Symbol::new(name, Type::Error))
    }

    pub fn identifier(&self, symbol: SymbolId) -> Expression {
        Expression::identifier(symbol, self.symbols.symbol(symbol).ty.clone())
    }

    pub fn character(&self, value: u32) -> Expression {
        Expression::integer(value)
    }

    pub fn string(&self, value: String) -> Expression {
        let length = value.len() as u32 + 1;
        Expression::new(
            ExpressionKind::String(value),
            Type::array(crate::types::Specifier::Char, 0, length),
        )
    }

    pub fn check_call(&mut self, callee: SymbolId, args: Vec<Expression>) -> Expression {
        let ty = self.symbols.symbol(callee).ty.clone();
        let args: Vec<Expression> = args.into_iter().map(promote).collect();
        let mut result = Type::Error;

        match &ty {
            Type::Error => {}
            Type::Function {
                specifier,
                indirection,
                parameters,
            } => {
                if args.iter().all(|arg| !arg.ty.is_error()) {
                    let count_ok = if parameters.variadic {
                        args.len() >= parameters.types.len()
                    } else {
                        args.len() == parameters.types.len()
                    };
                    let types_ok = parameters
                        .types
                        .iter()
                        .zip(&args)
                        .all(|(param, arg)| param.is_compatible_with(&arg.ty));

                    if count_ok && types_ok {
                        result = Type::scalar(*specifier, *indirection);
                    } else {
                        self.report(SemanticError::InvalidArguments);
                    }
                }
            }
            _ => self.report(SemanticError::NotAFunction),
        }

        Expression::new(ExpressionKind::Call { callee, args }, result)
    }

    /// `left[right]` is rewritten as `*(left + right)` with the index scaled.
    pub fn check_array(&mut self, left: Expression, right: Expression) -> Expression {
        let left = promote(left);
        let right = promote(right);

        if left.ty.is_error() || right.ty.is_error() {
            return Expression::dereference(left, Type::Error);
        }

        if left.ty.is_pointer() && right.ty.is_integer() {
            let element = left.ty.deref();
            let pointer = left.ty.clone();
            let sum = Expression::new(
                ExpressionKind::Add {
                    left: Box::new(left),
                    right: Box::new(right),
                    scale_left: 0,
                    scale_right: element.size(),
                },
                pointer,
            );
            Expression::dereference(sum, element)
        } else {
            self.report(SemanticError::InvalidOperands("[]"));
            Expression::dereference(left, Type::Error)
        }
    }

    pub fn check_not(&mut self, expr: Expression) -> Expression {
        let expr = promote(expr);
        let result = self.unary_result(&expr, "!", |ty| ty.is_predicate().then(Type::int));
        Expression::new(ExpressionKind::Not(Box::new(expr)), result)
    }

    pub fn check_negate(&mut self, expr: Expression) -> Expression {
        let expr = promote(expr);
        let result = self.unary_result(&expr, "-", |ty| ty.is_numeric().then(|| ty.clone()));
        Expression::new(ExpressionKind::Negate(Box::new(expr)), result)
    }

    pub fn check_dereference(&mut self, expr: Expression) -> Expression {
        let expr = promote(expr);
        let result = self.unary_result(&expr, "*", |ty| ty.is_pointer().then(|| ty.deref()));
        Expression::dereference(expr, result)
    }

    fn unary_result(
        &mut self,
        expr: &Expression,
        op: &'static str,
        rule: impl FnOnce(&Type) -> Option<Type>,
    ) -> Type {
        if expr.ty.is_error() {
            return Type::Error;
        }
        rule(&expr.ty).unwrap_or_else(|| {
            self.report(SemanticError::InvalidOperand(op));
            Type::Error
        })
    }

    pub fn check_address(&mut self, expr: Expression) -> Expression {
        let result = self.require_lvalue(&expr).map_or(Type::Error, |ty| ty.address_of());
        Expression::address(expr, result)
    }

    pub fn check_increment(&mut self, expr: Expression) -> Expression {
        let (result, scale) = self.step(&expr);
        Expression::new(
            ExpressionKind::Increment {
                operand: Box::new(expr),
                scale,
            },
            result,
        )
    }

    pub fn check_decrement(&mut self, expr: Expression) -> Expression {
        let (result, scale) = self.step(&expr);
        Expression::new(
            ExpressionKind::Decrement {
                operand: Box::new(expr),
                scale,
            },
            result,
        )
    }

    fn step(&mut self, expr: &Expression) -> (Type, u32) {
        match self.require_lvalue(expr) {
            Some(ty) if ty.is_pointer() => (ty.clone(), ty.deref().size()),
            Some(ty) => (ty.clone(), 1),
            None => (Type::Error, 0),
        }
    }

    fn require_lvalue<'e>(&mut self, expr: &'e Expression) -> Option<&'e Type> {
        if expr.ty.is_error() {
            return None;
        }
        if !expr.lvalue {
            self.report(SemanticError::LvalueRequired);
            return None;
        }
        Some(&expr.ty)
    }

    pub fn check_sizeof(&mut self, expr: Expression) -> Expression {
        if expr.ty.is_function() {
            self.report(SemanticError::InvalidSizeof);
        }
        Expression::integer(expr.ty.size())
    }

    /// `sizeof(type)` needs no checking.
    pub fn sizeof_type(&self, ty: &Type) -> Expression {
        Expression::integer(ty.size())
    }

    pub fn check_cast(&mut self, target: Type, expr: Expression) -> Expression {
        let source = expr.ty.clone();
        if source.is_error() {
            return expr;
        }

        let expr = if target.is_numeric() && source.is_numeric() {
            convert(expr, &target)
        } else if target.is_pointer() && (source.is_pointer() || source.is_integer()) {
            promote(expr)
        } else if source.is_pointer() && target.is_integer() {
            promote(expr)
        } else {
            self.report(SemanticError::InvalidCast);
            return Expression::cast(Type::Error, expr);
        };

        if expr.ty != target {
            Expression::cast(target, expr)
        } else {
            expr
        }
    }

    /// Both operands are extended toward each other. Returns the operands
    /// and the left type when both are numeric.
    fn check_multiplicative(
        &mut self,
        left: Expression,
        right: Expression,
        op: &'static str,
    ) -> (Expression, Expression, Type) {
        let left = extend(left, &right.ty);
        let right = extend(right, &left.ty);

        let result = if left.ty.is_error() || right.ty.is_error() {
            Type::Error
        } else if left.ty.is_numeric() && right.ty.is_numeric() {
            left.ty.clone()
        } else {
            self.report(SemanticError::InvalidOperands(op));
            Type::Error
        };

        (left, right, result)
    }

    pub fn check_multiply(&mut self, left: Expression, right: Expression) -> Expression {
        let (left, right, result) = self.check_multiplicative(left, right, "*");
        Expression::new(
            ExpressionKind::Multiply {
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
        )
    }

    pub fn check_divide(&mut self, left: Expression, right: Expression) -> Expression {
        let (left, right, result) = self.check_multiplicative(left, right, "/");
        Expression::new(
            ExpressionKind::Divide {
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
        )
    }

    pub fn check_remainder(&mut self, left: Expression, right: Expression) -> Expression {
        let left = promote(left);
        let right = promote(right);

        let result = if left.ty.is_error() || right.ty.is_error() {
            Type::Error
        } else if left.ty.is_integer() && right.ty.is_integer() {
            Type::int()
        } else {
            self.report(SemanticError::InvalidOperands("%"));
            Type::Error
        };

        Expression::new(
            ExpressionKind::Remainder {
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
        )
    }

    pub fn check_add(&mut self, left: Expression, right: Expression) -> Expression {
        let left = extend(left, &right.ty);
        let right = extend(right, &left.ty);
        let (t1, t2) = (&left.ty, &right.ty);
        let (mut scale_left, mut scale_right) = (0, 0);

        let result = if t1.is_error() || t2.is_error() {
            Type::Error
        } else if t1.is_numeric() && t2.is_numeric() {
            t1.clone()
        } else if t1.is_pointer() && t2.is_integer() {
            scale_right = t1.deref().size();
            t1.clone()
        } else if t1.is_integer() && t2.is_pointer() {
            scale_left = t2.deref().size();
            t2.clone()
        } else {
            self.report(SemanticError::InvalidOperands("+"));
            Type::Error
        };

        Expression::new(
            ExpressionKind::Add {
                left: Box::new(left),
                right: Box::new(right),
                scale_left,
                scale_right,
            },
            result,
        )
    }

    pub fn check_subtract(&mut self, left: Expression, right: Expression) -> Expression {
        let left = extend(left, &right.ty);
        let right = extend(right, &left.ty);
        let (t1, t2) = (&left.ty, &right.ty);
        let (mut scale_right, mut scale_result) = (0, 0);

        let result = if t1.is_error() || t2.is_error() {
            Type::Error
        } else if t1.is_numeric() && t2.is_numeric() {
            t1.clone()
        } else if t1.is_pointer() && t1 == t2 {
            scale_result = t1.deref().size();
            Type::int()
        } else if t1.is_pointer() && t2.is_integer() {
            scale_right = t1.deref().size();
            t1.clone()
        } else {
            self.report(SemanticError::InvalidOperands("-"));
            Type::Error
        };

        Expression::new(
            ExpressionKind::Subtract {
                left: Box::new(left),
                right: Box::new(right),
                scale_right,
                scale_result,
            },
            result,
        )
    }

    pub fn check_compare(
        &mut self,
        op: Comparison,
        left: Expression,
        right: Expression,
    ) -> Expression {
        let left = extend(left, &right.ty);
        let right = extend(right, &left.ty);

        let result = if left.ty.is_error() || right.ty.is_error() {
            Type::Error
        } else if left.ty.is_compatible_with(&right.ty) {
            Type::int()
        } else {
            self.report(SemanticError::InvalidOperands(op.symbol()));
            Type::Error
        };

        Expression::new(
            ExpressionKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
        )
    }

    fn check_logical(
        &mut self,
        left: Expression,
        right: Expression,
        op: &'static str,
    ) -> (Box<Expression>, Box<Expression>, Type) {
        let left = promote(left);
        let right = promote(right);

        let result = if left.ty.is_error() || right.ty.is_error() {
            Type::Error
        } else if left.ty.is_predicate() && right.ty.is_predicate() {
            Type::int()
        } else {
            self.report(SemanticError::InvalidOperands(op));
            Type::Error
        };

        (Box::new(left), Box::new(right), result)
    }

    pub fn check_logical_and(&mut self, left: Expression, right: Expression) -> Expression {
        let (left, right, result) = self.check_logical(left, right, "&&");
        Expression::new(ExpressionKind::LogicalAnd { left, right }, result)
    }

    pub fn check_logical_or(&mut self, left: Expression, right: Expression) -> Expression {
        let (left, right, result) = self.check_logical(left, right, "||");
        Expression::new(ExpressionKind::LogicalOr { left, right }, result)
    }

    pub fn check_assignment(&mut self, left: Expression, right: Expression) -> Statement {
        let right = convert(right, &left.ty);

        if !left.ty.is_error() && !right.ty.is_error() {
            if !left.lvalue {
                self.report(SemanticError::LvalueRequired);
            } else if !left.ty.is_compatible_with(&right.ty) {
                self.report(SemanticError::InvalidOperands("="));
            }
        }

        Statement::Assignment { left, right }
    }

    pub fn check_break(&mut self) -> Statement {
        if self.loop_depth == 0 {
            self.report(SemanticError::BreakOutsideLoop);
        }
        Statement::Break
    }

    pub fn check_return(&mut self, expr: Expression) -> Statement {
        let expr = promote(expr);
        if !expr.ty.is_error() && !expr.ty.is_compatible_with(&self.return_type) {
            self.report(SemanticError::InvalidReturn);
        }
        Statement::Return(expr)
    }

    /// Condition of an `if`, `while` or `for`.
    pub fn check_test(&mut self, expr: Expression) -> Expression {
        let expr = promote(expr);
        if !expr.ty.is_error() && !expr.ty.is_predicate() {
            self.report(SemanticError::InvalidTest);
        }
        expr
    }
}
