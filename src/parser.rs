//! Recursive-descent parser with Pratt-style expression parsing
//! (`spec.md` §4.2).

use crate::ast::*;
use crate::lexer::{Token, TokenKind, lex};
use crate::types::{Const, Type};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Parser, String> {
        let tokens = lex(source)?;
        Ok(Parser { tokens, pos: 0 })
    }

    pub fn parse_program(&mut self) -> Result<Program, String> {
        let mut declarations = Vec::new();
        while !self.check(TokenKind::Eof) {
            declarations.push(self.parse_declaration()?);
        }
        Ok(Program { declarations })
    }

    // -- token stream helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, String> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(format!(
                "line {}: expected {:?}, found {:?} ({} tokens remaining)",
                self.peek().line,
                kind,
                self.peek().kind,
                self.tokens.len() - self.pos
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        if self.check(TokenKind::Identifier) {
            let t = self.advance();
            Ok(t.lexeme.expect("identifier token missing lexeme"))
        } else {
            Err(format!(
                "line {}: expected identifier, found {:?}",
                self.peek().line,
                self.peek().kind
            ))
        }
    }

    fn is_type_or_storage(&self, kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::KwInt
                | TokenKind::KwLong
                | TokenKind::KwSigned
                | TokenKind::KwUnsigned
                | TokenKind::KwStatic
                | TokenKind::KwExtern
        )
    }

    // -- specifiers ------------------------------------------------------------

    /// Consumes a pool of `int|long|signed|unsigned|static|extern` tokens (in
    /// any order) and resolves it to a `Type` plus an optional storage class,
    /// per the validation rules in `spec.md` §4.2.
    fn parse_specifiers(&mut self) -> Result<(Type, Option<StorageClass>), String> {
        let mut type_specs: Vec<&'static str> = Vec::new();
        let mut storage: Option<StorageClass> = None;

        while self.is_type_or_storage(&self.peek().kind) {
            match self.peek().kind {
                TokenKind::KwInt => {
                    type_specs.push("int");
                    self.advance();
                }
                TokenKind::KwLong => {
                    type_specs.push("long");
                    self.advance();
                }
                TokenKind::KwSigned => {
                    type_specs.push("signed");
                    self.advance();
                }
                TokenKind::KwUnsigned => {
                    type_specs.push("unsigned");
                    self.advance();
                }
                TokenKind::KwStatic => {
                    if storage.is_some() {
                        return Err(format!("line {}: at most one storage-class specifier allowed", self.peek().line));
                    }
                    storage = Some(StorageClass::Static);
                    self.advance();
                }
                TokenKind::KwExtern => {
                    if storage.is_some() {
                        return Err(format!("line {}: at most one storage-class specifier allowed", self.peek().line));
                    }
                    storage = Some(StorageClass::Extern);
                    self.advance();
                }
                _ => unreachable!(),
            }
        }

        if type_specs.is_empty() {
            return Err(format!("line {}: expected a type specifier", self.peek().line));
        }
        let count = |s: &str| type_specs.iter().filter(|t| **t == s).count();
        if count("int") > 1 || count("long") > 1 || count("signed") > 1 || count("unsigned") > 1 {
            return Err("duplicate type specifier".to_string());
        }
        if count("signed") > 0 && count("unsigned") > 0 {
            return Err("'signed' and 'unsigned' are mutually exclusive".to_string());
        }

        let ty = if count("unsigned") > 0 && count("long") > 0 {
            Type::ULong
        } else if count("unsigned") > 0 {
            Type::UInt
        } else if count("long") > 0 {
            Type::Long
        } else {
            Type::Int
        };

        Ok((ty, storage))
    }

    // -- declarations ------------------------------------------------------------

    fn parse_declaration(&mut self) -> Result<Declaration, String> {
        let (base_ty, storage_class) = self.parse_specifiers()?;
        let name = self.expect_identifier()?;

        if self.check(TokenKind::OpenParen) {
            self.parse_function_decl_tail(name, base_ty, storage_class)
                .map(Declaration::FunDecl)
        } else {
            self.parse_variable_decl_tail(name, base_ty, storage_class)
                .map(Declaration::VarDecl)
        }
    }

    fn parse_function_decl_tail(
        &mut self,
        name: String,
        ret: Type,
        storage_class: Option<StorageClass>,
    ) -> Result<FunctionDeclaration, String> {
        self.expect(TokenKind::OpenParen)?;
        let mut params = Vec::new();
        let mut param_types = Vec::new();

        if self.check(TokenKind::KwVoid) && self.peek_at(1).kind == TokenKind::CloseParen {
            self.advance();
        } else if !self.check(TokenKind::CloseParen) {
            loop {
                let (pty, pstorage) = self.parse_specifiers()?;
                if pstorage.is_some() {
                    return Err("storage-class specifier not allowed on a parameter".to_string());
                }
                let pname = self.expect_identifier()?;
                param_types.push(pty);
                params.push(pname);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen)?;

        let fun_type = Type::fun(param_types, ret);

        let body = if self.check(TokenKind::OpenBrace) {
            Some(self.parse_block()?)
        } else {
            self.expect(TokenKind::Semicolon)?;
            None
        };

        Ok(FunctionDeclaration { name, params, body, fun_type, storage_class })
    }

    fn parse_variable_decl_tail(
        &mut self,
        name: String,
        var_type: Type,
        storage_class: Option<StorageClass>,
    ) -> Result<VariableDeclaration, String> {
        let init = if self.check(TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(VariableDeclaration { name, init, var_type, storage_class })
    }

    // -- blocks & statements ------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, String> {
        self.expect(TokenKind::OpenBrace)?;
        let mut items = Vec::new();
        while !self.check(TokenKind::CloseBrace) {
            items.push(self.parse_block_item()?);
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> Result<BlockItem, String> {
        if self.starts_declaration() {
            Ok(BlockItem::D(self.parse_declaration()?))
        } else {
            Ok(BlockItem::S(self.parse_statement()?))
        }
    }

    fn starts_declaration(&self) -> bool {
        self.is_type_or_storage(&self.peek().kind)
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        match self.peek().kind {
            TokenKind::KwReturn => {
                self.advance();
                let exp = self.parse_expression(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Return(exp))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Null)
            }
            TokenKind::KwIf => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                let then = Box::new(self.parse_statement()?);
                let otherwise = if self.check(TokenKind::KwElse) {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Statement::If { cond, then, otherwise })
            }
            TokenKind::OpenBrace => Ok(Statement::Compound(self.parse_block()?)),
            TokenKind::KwBreak => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Break(None))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Continue(None))
            }
            TokenKind::KwWhile => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While { cond, body, label: None })
            }
            TokenKind::KwDo => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::KwWhile)?;
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::DoWhile { body, cond, label: None })
            }
            TokenKind::KwFor => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let init = self.parse_for_init()?;
                let cond = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression(0)?)
                };
                self.expect(TokenKind::Semicolon)?;
                let post = if self.check(TokenKind::CloseParen) {
                    None
                } else {
                    Some(self.parse_expression(0)?)
                };
                self.expect(TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::For { init, cond, post, body, label: None })
            }
            _ => {
                let exp = self.parse_expression(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Expression(exp))
            }
        }
    }

    fn parse_for_init(&mut self) -> Result<ForInit, String> {
        if self.starts_declaration() {
            let (ty, storage) = self.parse_specifiers()?;
            if storage.is_some() {
                return Err("storage-class specifier not allowed in a for-init declaration".to_string());
            }
            let name = self.expect_identifier()?;
            let decl = self.parse_variable_decl_tail(name, ty, None)?;
            Ok(ForInit::InitDecl(decl))
        } else if self.check(TokenKind::Semicolon) {
            Ok(ForInit::InitExp(None))
        } else {
            let exp = self.parse_expression(0)?;
            self.expect(TokenKind::Semicolon)?;
            Ok(ForInit::InitExp(Some(exp)))
        }
    }

    // -- expressions: Pratt / precedence-climbing ------------------------------------------------

    fn parse_expression(&mut self, min_precedence: u32) -> Result<Exp, String> {
        let mut left = self.parse_factor()?;
        loop {
            let Some((op_kind, prec)) = binary_precedence(&self.peek().kind) else {
                break;
            };
            if prec < min_precedence {
                break;
            }

            if self.peek().kind == TokenKind::Equal {
                self.advance();
                let right = self.parse_expression(prec)?; // right-assoc: same precedence
                left = Exp::untyped(ExpKind::Assignment(Box::new(left), Box::new(right)));
                continue;
            }
            if self.peek().kind == TokenKind::Question {
                self.advance();
                let then = self.parse_expression(0)?;
                self.expect(TokenKind::Colon)?;
                let otherwise = self.parse_expression(prec)?; // right-assoc
                left = Exp::untyped(ExpKind::Conditional {
                    cond: Box::new(left),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                });
                continue;
            }

            self.advance();
            let right = self.parse_expression(prec + 1)?; // left-assoc: strictly higher
            left = Exp::untyped(ExpKind::Binary(op_kind, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    /// A factor is a constant, a unary operator applied to a factor, a
    /// parenthesized expression, a cast, or a postfix-free primary
    /// (identifier or call).
    fn parse_factor(&mut self) -> Result<Exp, String> {
        match self.peek().kind {
            TokenKind::Constant
            | TokenKind::LongConstant
            | TokenKind::UnsignedIntConstant
            | TokenKind::UnsignedLongConstant => self.parse_constant(),
            TokenKind::Tilde => {
                self.advance();
                let inner = self.parse_factor()?;
                Ok(Exp::untyped(ExpKind::Unary(UnaryOperator::Complement, Box::new(inner))))
            }
            TokenKind::Minus => {
                self.advance();
                let inner = self.parse_factor()?;
                Ok(Exp::untyped(ExpKind::Unary(UnaryOperator::Negate, Box::new(inner))))
            }
            TokenKind::Bang => {
                self.advance();
                let inner = self.parse_factor()?;
                Ok(Exp::untyped(ExpKind::Unary(UnaryOperator::Not, Box::new(inner))))
            }
            TokenKind::OpenParen => {
                // Either `(type) factor` (a cast) or `(expression)`.
                if self.is_type_or_storage(&self.peek_at(1).kind) {
                    self.advance();
                    let (ty, storage) = self.parse_specifiers()?;
                    if storage.is_some() {
                        return Err("storage-class specifier not allowed in a cast".to_string());
                    }
                    self.expect(TokenKind::CloseParen)?;
                    let inner = self.parse_factor()?;
                    Ok(Exp::untyped(ExpKind::Cast(ty, Box::new(inner))))
                } else {
                    self.advance();
                    let inner = self.parse_expression(0)?;
                    self.expect(TokenKind::CloseParen)?;
                    Ok(inner)
                }
            }
            TokenKind::Identifier => {
                let name = self.expect_identifier()?;
                if self.check(TokenKind::OpenParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::CloseParen) {
                        loop {
                            args.push(self.parse_expression(1)?); // above assignment's precedence
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::CloseParen)?;
                    Ok(Exp::untyped(ExpKind::FunctionCall(name, args)))
                } else {
                    Ok(Exp::untyped(ExpKind::Var(name)))
                }
            }
            _ => Err(format!(
                "line {}: expected an expression, found {:?}",
                self.peek().line,
                self.peek().kind
            )),
        }
    }

    fn parse_constant(&mut self) -> Result<Exp, String> {
        let tok = self.advance();
        let line = tok.line;
        let lexeme = tok.lexeme.expect("numeric token missing lexeme");
        let magnitude: i128 = lexeme
            .parse()
            .map_err(|_| format!("line {}: malformed numeric literal '{}'", line, lexeme))?;

        let long_max = i64::MAX as i128;
        let ulong_max = u64::MAX as i128;

        let c = match tok.kind {
            TokenKind::Constant => {
                if magnitude > long_max {
                    return Err(format!("line {}: constant {} exceeds LONG_MAX", line, lexeme));
                }
                if magnitude <= i32::MAX as i128 {
                    Const::Int(magnitude as i32)
                } else {
                    Const::Long(magnitude as i64)
                }
            }
            TokenKind::LongConstant => {
                if magnitude > long_max {
                    return Err(format!("line {}: constant {} exceeds LONG_MAX", line, lexeme));
                }
                Const::Long(magnitude as i64)
            }
            TokenKind::UnsignedIntConstant => {
                if magnitude > ulong_max {
                    return Err(format!("line {}: constant {} exceeds ULONG_MAX", line, lexeme));
                }
                if magnitude <= u32::MAX as i128 {
                    Const::UInt(magnitude as u32)
                } else {
                    Const::ULong(magnitude as u64)
                }
            }
            TokenKind::UnsignedLongConstant => {
                if magnitude > ulong_max {
                    return Err(format!("line {}: constant {} exceeds ULONG_MAX", line, lexeme));
                }
                Const::ULong(magnitude as u64)
            }
            _ => unreachable!(),
        };

        Ok(Exp::untyped(ExpKind::Constant(c)))
    }
}

fn binary_precedence(kind: &TokenKind) -> Option<(BinaryOperator, u32)> {
    use BinaryOperator::*;
    Some(match kind {
        TokenKind::Star => (Multiply, 50),
        TokenKind::Slash => (Divide, 50),
        TokenKind::Percent => (Remainder, 50),
        TokenKind::Plus => (Add, 45),
        TokenKind::Minus => (Subtract, 45),
        TokenKind::Less => (LessThan, 35),
        TokenKind::LessEqual => (LessOrEqual, 35),
        TokenKind::Greater => (GreaterThan, 35),
        TokenKind::GreaterEqual => (GreaterOrEqual, 35),
        TokenKind::EqualEqual => (Equal, 30),
        TokenKind::BangEqual => (NotEqual, 30),
        TokenKind::AmpAmp => (And, 10),
        TokenKind::PipePipe => (Or, 5),
        // Ternary and assignment are handled by dedicated branches in
        // `parse_expression`, but still need a precedence slot so the
        // climbing loop knows when to stop.
        TokenKind::Question => (Equal, 3), // operator tag unused for `?:`
        TokenKind::Equal => (Equal, 1),    // operator tag unused for `=`
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).unwrap().parse_program().unwrap()
    }

    #[test]
    fn parses_minimal_function() {
        let program = parse("int main(void) { return 2; }");
        assert_eq!(program.declarations.len(), 1);
    }

    #[test]
    fn precedence_and_associativity() {
        // 1 + 2 * 3 should parse as 1 + (2 * 3)
        let program = parse("int main(void) { return 1 + 2 * 3; }");
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Return(exp)) = &body.items[0] else { panic!() };
        match &exp.kind {
            ExpKind::Binary(BinaryOperator::Add, _, right) => {
                assert!(matches!(right.kind, ExpKind::Binary(BinaryOperator::Multiply, _, _)));
            }
            _ => panic!("expected addition at the top"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse("int main(void) { int a; int b; a = b = 1; return a; }");
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Expression(exp)) = &body.items[2] else { panic!() };
        let ExpKind::Assignment(_, rhs) = &exp.kind else { panic!() };
        assert!(matches!(rhs.kind, ExpKind::Assignment(_, _)));
    }

    #[test]
    fn cast_vs_parenthesized_expression() {
        let program = parse("int main(void) { int x; return (long) x; }");
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Return(exp)) = &body.items[1] else { panic!() };
        assert!(matches!(exp.kind, ExpKind::Cast(Type::Long, _)));
    }

    #[test]
    fn overflowing_literal_is_rejected() {
        assert!(Parser::new("int main(void) { return 99999999999999999999; }")
            .unwrap()
            .parse_program()
            .is_err());
    }

    #[test]
    fn specifier_pool_validation() {
        assert!(Parser::new("int long x;").unwrap().parse_program().is_ok());
        assert!(Parser::new("signed unsigned int x;").unwrap().parse_program().is_err());
        assert!(Parser::new("int int x;").unwrap().parse_program().is_err());
    }
}
