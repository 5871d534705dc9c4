use crate::{
    ast::{Block, Comparison, Expression, Function, Statement},
    error::{CompileError, Result},
    lexer::unescape,
    semantic::Checker,
    symbol_table::{ScopeId, SymbolTable},
    token::{Token, TokenKind},
    types::{Parameters, Specifier, Type},
};
use log::debug;
use std::iter::Peekable;

/// Nesting allowed for expressions and statements before parsing gives up.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Recursive-descent driver for Simple C. It owns the checker and calls it
/// for every construct, so the tree it produces is already typed.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    current: Token,
    checker: Checker,
    depth: usize,
    max_depth: usize,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I, checker: Checker) -> Self {
        let mut parser = Self {
            tokens: tokens.peekable(),
            current: Token::new(TokenKind::Done, "", 1, 1),
            checker,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        };
        parser.advance();
        parser
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn finish(self) -> Checker {
        self.checker
    }

    /// Parse the whole translation unit. Each function is handed to `sink`
    /// as soon as its body is complete.
    pub fn parse<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(Function, &mut SymbolTable) -> Result<()>,
    {
        while self.current.kind != TokenKind::Done {
            if let Some(function) = self.top_level_declaration()? {
                sink(function, self.checker.symbols_mut())?;
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> Token {
        let next = match self.tokens.next() {
            Some(token) => token,
            None => Token::new(TokenKind::Done, "", self.current.line, self.current.column),
        };
        self.checker.set_location(next.line, next.column);
        std::mem::replace(&mut self.current, next)
    }

    fn peek(&mut self) -> Option<TokenKind> {
        self.tokens.peek().map(|token| token.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn expect_token(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            self.error()
        }
    }

    fn error<T>(&self) -> Result<T> {
        Err(CompileError::syntax_error(
            self.current.line,
            self.current.to_string(),
        ))
    }

    fn deepen(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(CompileError::NestingTooDeep {
                line: self.current.line,
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Runs a left-folding loop. Every operator the loop folds calls
    /// `deepen`, since each one adds a level to the tree; the depth is
    /// restored once the chain ends.
    fn chain<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let depth = self.depth;
        let result = parse(self);
        self.depth = depth;
        result
    }

    fn integer(&mut self) -> Result<u32> {
        let token = self.expect_token(TokenKind::Integer)?;
        token
            .text
            .parse()
            .map_err(|_| CompileError::IntegerOverflow {
                line: token.line,
                text: token.text.clone(),
            })
    }

    fn identifier(&mut self) -> Result<String> {
        Ok(self.expect_token(TokenKind::Identifier)?.text)
    }

    fn specifier(&mut self) -> Result<Specifier> {
        let specifier = match self.current.kind {
            TokenKind::Char => Specifier::Char,
            TokenKind::Int => Specifier::Int,
            TokenKind::Double => Specifier::Double,
            _ => return self.error(),
        };
        self.advance();
        Ok(specifier)
    }

    fn pointers(&mut self) -> u32 {
        let mut count = 0;
        while self.at(TokenKind::Star) {
            self.advance();
            count += 1;
        }
        count
    }

    /// `[ length ]` after the name of an array declarator.
    fn array(&mut self, specifier: Specifier, indirection: u32, name: &str) -> Result<Type> {
        self.expect_token(TokenKind::LeftBracket)?;
        let (line, text) = (self.current.line, self.current.text.clone());
        let length = self.integer()?;
        if length == 0 {
            return Err(CompileError::syntax_error(line, text));
        }
        self.expect_token(TokenKind::RightBracket)?;
        Type::sized_array(specifier, indirection, length).ok_or_else(|| {
            CompileError::ArrayTooLarge {
                line,
                name: name.to_string(),
            }
        })
    }

    // Declarations

    fn declarator(&mut self, specifier: Specifier) -> Result<()> {
        let indirection = self.pointers();
        let name = self.identifier()?;

        let ty = if self.at(TokenKind::LeftBracket) {
            self.array(specifier, indirection, &name)?
        } else {
            Type::scalar(specifier, indirection)
        };
        self.checker.declare_variable(&name, ty);
        Ok(())
    }

    fn declaration(&mut self) -> Result<()> {
        let specifier = self.specifier()?;
        self.declarator(specifier)?;

        while self.at(TokenKind::Comma) {
            self.advance();
            self.declarator(specifier)?;
        }

        self.expect_token(TokenKind::Semicolon)?;
        Ok(())
    }

    fn declarations(&mut self) -> Result<()> {
        while self.current.kind.is_specifier() {
            self.declaration()?;
        }
        Ok(())
    }

    fn parameter(&mut self) -> Result<Type> {
        let specifier = self.specifier()?;
        let indirection = self.pointers();
        let name = self.identifier()?;

        let ty = Type::scalar(specifier, indirection);
        self.checker.declare_variable(&name, ty.clone());
        Ok(ty)
    }

    /// Parameters of a function, between the parentheses. Opens the scope
    /// that holds them, which the caller must close.
    fn parameters(&mut self) -> Result<(Parameters, ScopeId)> {
        let scope = self.checker.open_scope();
        let mut parameters = Parameters::default();

        if self.at(TokenKind::Void) {
            self.advance();
            return Ok((parameters, scope));
        }

        parameters.types.push(self.parameter()?);
        while self.at(TokenKind::Comma) {
            self.advance();
            if self.at(TokenKind::Ellipsis) {
                self.advance();
                parameters.variadic = true;
                break;
            }
            parameters.types.push(self.parameter()?);
        }

        Ok((parameters, scope))
    }

    fn global_declarator(&mut self, specifier: Specifier) -> Result<()> {
        let indirection = self.pointers();
        let name = self.identifier()?;

        match self.current.kind {
            TokenKind::LeftBracket => {
                let ty = self.array(specifier, indirection, &name)?;
                self.checker.declare_variable(&name, ty);
            }
            TokenKind::LeftParen => {
                self.advance();
                let (parameters, _) = self.parameters()?;
                self.checker.close_parameter_scope();
                self.checker
                    .declare_function(&name, Type::function(specifier, indirection, parameters));
                self.expect_token(TokenKind::RightParen)?;
            }
            _ => {
                self.checker
                    .declare_variable(&name, Type::scalar(specifier, indirection));
            }
        }
        Ok(())
    }

    fn remaining_declarators(&mut self, specifier: Specifier) -> Result<()> {
        while self.at(TokenKind::Comma) {
            self.advance();
            self.global_declarator(specifier)?;
        }
        self.expect_token(TokenKind::Semicolon)?;
        Ok(())
    }

    fn top_level_declaration(&mut self) -> Result<Option<Function>> {
        let specifier = self.specifier()?;
        let indirection = self.pointers();
        let name = self.identifier()?;

        match self.current.kind {
            TokenKind::LeftBracket => {
                let ty = self.array(specifier, indirection, &name)?;
                self.checker.declare_variable(&name, ty);
            }
            TokenKind::LeftParen => {
                self.advance();
                let (parameters, scope) = self.parameters()?;
                self.expect_token(TokenKind::RightParen)?;
                let ty = Type::function(specifier, indirection, parameters);

                if self.at(TokenKind::LeftBrace) {
                    return self.function_definition(&name, ty, scope).map(Some);
                }

                self.checker.close_parameter_scope();
                self.checker.declare_function(&name, ty);
            }
            _ => {
                self.checker
                    .declare_variable(&name, Type::scalar(specifier, indirection));
            }
        }

        self.remaining_declarators(specifier)?;
        Ok(None)
    }

    fn function_definition(&mut self, name: &str, ty: Type, scope: ScopeId) -> Result<Function> {
        debug!("parsing function {}", name);
        let parameters = self.checker.symbols().scope(scope).len();
        if let Some(specifier) = ty.specifier() {
            self.checker
                .begin_function(Type::scalar(specifier, ty.indirection()));
        }
        let symbol = self.checker.define_function(name, ty);

        self.expect_token(TokenKind::LeftBrace)?;
        self.declarations()?;
        let statements = self.statements()?;
        let scope = self.checker.close_scope();
        self.expect_token(TokenKind::RightBrace)?;

        Ok(Function::new(symbol, parameters, Block::new(scope, statements)))
    }

    // Statements

    fn statements(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.at(TokenKind::RightBrace) {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Statement> {
        match self.current.kind {
            TokenKind::LeftBrace => {
                self.advance();
                let scope = self.checker.open_scope();
                self.declarations()?;
                let statements = self.statements()?;
                self.checker.close_scope();
                self.expect_token(TokenKind::RightBrace)?;
                Ok(Statement::Block(Block::new(scope, statements)))
            }
            TokenKind::Break => {
                self.advance();
                let statement = self.checker.check_break();
                self.expect_token(TokenKind::Semicolon)?;
                Ok(statement)
            }
            TokenKind::Return => {
                self.advance();
                let expr = self.expression()?;
                let statement = self.checker.check_return(expr);
                self.expect_token(TokenKind::Semicolon)?;
                Ok(statement)
            }
            TokenKind::While => {
                self.advance();
                let test = self.test()?;
                let body = self.loop_body()?;
                Ok(Statement::While { test, body })
            }
            TokenKind::For => {
                self.advance();
                self.expect_token(TokenKind::LeftParen)?;
                let init = Box::new(self.assignment()?);
                self.expect_token(TokenKind::Semicolon)?;
                let expr = self.expression()?;
                let test = self.checker.check_test(expr);
                self.expect_token(TokenKind::Semicolon)?;
                let increment = Box::new(self.assignment()?);
                self.expect_token(TokenKind::RightParen)?;
                let body = self.loop_body()?;
                Ok(Statement::For {
                    init,
                    test,
                    increment,
                    body,
                })
            }
            TokenKind::If => {
                self.advance();
                let test = self.test()?;
                let then_branch = Box::new(self.statement()?);
                let else_branch = if self.at(TokenKind::Else) {
                    self.advance();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Statement::If {
                    test,
                    then_branch,
                    else_branch,
                })
            }
            _ => {
                let statement = self.assignment()?;
                self.expect_token(TokenKind::Semicolon)?;
                Ok(statement)
            }
        }
    }

    /// `( expression )` used as a condition.
    fn test(&mut self) -> Result<Expression> {
        self.expect_token(TokenKind::LeftParen)?;
        let expr = self.expression()?;
        let test = self.checker.check_test(expr);
        self.expect_token(TokenKind::RightParen)?;
        Ok(test)
    }

    fn loop_body(&mut self) -> Result<Box<Statement>> {
        self.checker.enter_loop();
        let body = self.statement();
        self.checker.leave_loop();
        Ok(Box::new(body?))
    }

    fn assignment(&mut self) -> Result<Statement> {
        let left = self.expression()?;
        if !self.at(TokenKind::Assign) {
            return Ok(Statement::Expression(left));
        }

        self.advance();
        let right = self.expression()?;
        Ok(self.checker.check_assignment(left, right))
    }

    // Expressions, lowest precedence first

    fn expression(&mut self) -> Result<Expression> {
        self.nested(|parser| {
            parser.chain(|parser| {
                let mut left = parser.logical_and()?;
                while parser.at(TokenKind::OrOr) {
                    parser.deepen()?;
                    parser.advance();
                    let right = parser.logical_and()?;
                    left = parser.checker.check_logical_or(left, right);
                }
                Ok(left)
            })
        })
    }

    fn logical_and(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.equality()?;
            while parser.at(TokenKind::AndAnd) {
                parser.deepen()?;
                parser.advance();
                let right = parser.equality()?;
                left = parser.checker.check_logical_and(left, right);
            }
            Ok(left)
        })
    }

    fn equality(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.relational()?;
            loop {
                let op = match parser.current.kind {
                    TokenKind::Equal => Comparison::Equal,
                    TokenKind::NotEqual => Comparison::NotEqual,
                    _ => return Ok(left),
                };
                parser.deepen()?;
                parser.advance();
                let right = parser.relational()?;
                left = parser.checker.check_compare(op, left, right);
            }
        })
    }

    fn relational(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.additive()?;
            loop {
                let op = match parser.current.kind {
                    TokenKind::Less => Comparison::Less,
                    TokenKind::Greater => Comparison::Greater,
                    TokenKind::LessEqual => Comparison::LessEqual,
                    TokenKind::GreaterEqual => Comparison::GreaterEqual,
                    _ => return Ok(left),
                };
                parser.deepen()?;
                parser.advance();
                let right = parser.additive()?;
                left = parser.checker.check_compare(op, left, right);
            }
        })
    }

    fn additive(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.multiplicative()?;
            loop {
                let kind = parser.current.kind;
                if kind != TokenKind::Plus && kind != TokenKind::Minus {
                    return Ok(left);
                }
                parser.deepen()?;
                parser.advance();
                let right = parser.multiplicative()?;
                left = if kind == TokenKind::Plus {
                    parser.checker.check_add(left, right)
                } else {
                    parser.checker.check_subtract(left, right)
                };
            }
        })
    }

    fn multiplicative(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.prefix()?;
            loop {
                let kind = parser.current.kind;
                if !matches!(kind, TokenKind::Star | TokenKind::Slash | TokenKind::Percent) {
                    return Ok(left);
                }
                parser.deepen()?;
                parser.advance();
                let right = parser.prefix()?;
                left = match kind {
                    TokenKind::Star => parser.checker.check_multiply(left, right),
                    TokenKind::Slash => parser.checker.check_divide(left, right),
                    _ => parser.checker.check_remainder(left, right),
                };
            }
        })
    }

    /// `sizeof (type)` always takes the parenthesized type, so
    /// `sizeof (int) * n` multiplies.
    fn prefix(&mut self) -> Result<Expression> {
        self.nested(Self::prefix_inner)
    }

    fn prefix_inner(&mut self) -> Result<Expression> {
        let type_name = self.starts_type_name();
        match self.current.kind {
            TokenKind::Bang => {
                self.advance();
                let expr = self.prefix()?;
                Ok(self.checker.check_not(expr))
            }
            TokenKind::Minus => {
                self.advance();
                let expr = self.prefix()?;
                Ok(self.checker.check_negate(expr))
            }
            TokenKind::Star => {
                self.advance();
                let expr = self.prefix()?;
                Ok(self.checker.check_dereference(expr))
            }
            TokenKind::Ampersand => {
                self.advance();
                let expr = self.prefix()?;
                Ok(self.checker.check_address(expr))
            }
            TokenKind::Sizeof => {
                self.advance();
                if self.starts_type_name() {
                    let ty = self.type_name()?;
                    Ok(self.checker.sizeof_type(&ty))
                } else {
                    let expr = self.prefix()?;
                    Ok(self.checker.check_sizeof(expr))
                }
            }
            TokenKind::LeftParen if type_name => {
                let ty = self.type_name()?;
                let expr = self.prefix()?;
                Ok(self.checker.check_cast(ty, expr))
            }
            _ => self.postfix(),
        }
    }

    fn starts_type_name(&mut self) -> bool {
        self.at(TokenKind::LeftParen) && self.peek().map_or(false, TokenKind::is_specifier)
    }

    /// `( specifier pointers )`
    fn type_name(&mut self) -> Result<Type> {
        self.expect_token(TokenKind::LeftParen)?;
        let specifier = self.specifier()?;
        let indirection = self.pointers();
        self.expect_token(TokenKind::RightParen)?;
        Ok(Type::scalar(specifier, indirection))
    }

    fn postfix(&mut self) -> Result<Expression> {
        self.chain(|parser| {
            let mut left = parser.primary()?;
            loop {
                match parser.current.kind {
                    TokenKind::LeftBracket => {
                        parser.deepen()?;
                        parser.advance();
                        let index = parser.expression()?;
                        left = parser.checker.check_array(left, index);
                        parser.expect_token(TokenKind::RightBracket)?;
                    }
                    TokenKind::Increment => {
                        parser.deepen()?;
                        left = parser.checker.check_increment(left);
                        parser.advance();
                    }
                    TokenKind::Decrement => {
                        parser.deepen()?;
                        left = parser.checker.check_decrement(left);
                        parser.advance();
                    }
                    _ => return Ok(left),
                }
            }
        })
    }

    fn primary(&mut self) -> Result<Expression> {
        match self.current.kind {
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect_token(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::Character => {
                let token = self.advance();
                let value = unescape(&token.text).chars().next().map_or(0, |c| c as u32);
                Ok(self.checker.character(value))
            }
            TokenKind::String => {
                let token = self.advance();
                Ok(self.checker.string(unescape(&token.text)))
            }
            TokenKind::Integer => {
                let value = self.integer()?;
                Ok(Expression::integer(value))
            }
            TokenKind::Real => {
                let token = self.advance();
                Ok(Expression::real(token.text))
            }
            TokenKind::Identifier => {
                let name = self.identifier()?;
                let symbol = self.checker.check_identifier(&name);

                if !self.at(TokenKind::LeftParen) {
                    return Ok(self.checker.identifier(symbol));
                }

                self.advance();
                let mut args = Vec::new();
                if !self.at(TokenKind::RightParen) {
                    args.push(self.expression()?);
                    while self.at(TokenKind::Comma) {
                        self.advance();
                        args.push(self.expression()?);
                    }
                }
                let call = self.checker.check_call(symbol, args);
                self.expect_token(TokenKind::RightParen)?;
                Ok(call)
            }
            _ => self.error(),
        }
    }
}
