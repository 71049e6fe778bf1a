//! Type checking (`spec.md` §4.4): populates the symbol table, annotates
//! every `Exp` with a `Type`, and inserts explicit `Cast` nodes wherever an
//! implicit conversion would otherwise be silent.
//!
//! Passes return a freshly-built tree (§9 design note: "immutable
//! construction everywhere") rather than mutating the input in place.

use crate::ast::*;
use crate::context::Context;
use crate::error::{CResult, CompileError};
use crate::symbols::{IdentifierAttr, InitialValue, SymbolEntry};
use crate::types::{Const, FunType, StaticInit, Type};

/// The "common type" used to unify the operands of a binary/relational
/// operator, an assignment's sides, or a conditional's two arms
/// (`spec.md` §4.4): identical types need no widening; otherwise the wider
/// type wins, and equal-width mismatches prefer the unsigned type.
fn common_type(a: Type, b: Type) -> Type {
    if a == b {
        return a;
    }
    if a.bit_width() == b.bit_width() {
        if a.is_signed() { b } else { a }
    } else if a.bit_width() > b.bit_width() {
        a
    } else {
        b
    }
}

fn convert_to(exp: Exp, target: Type) -> Exp {
    if exp.ty() == target {
        exp
    } else {
        Exp::typed(ExpKind::Cast(target.clone(), Box::new(exp)), target)
    }
}

pub struct TypeChecker<'a> {
    ctx: &'a mut Context,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ctx: &'a mut Context) -> TypeChecker<'a> {
        TypeChecker { ctx }
    }

    pub fn check_program(&mut self, program: Program) -> CResult<Program> {
        let mut declarations = Vec::with_capacity(program.declarations.len());
        for decl in program.declarations {
            declarations.push(self.check_file_scope_declaration(decl)?);
        }
        Ok(Program { declarations })
    }

    fn check_file_scope_declaration(&mut self, decl: Declaration) -> CResult<Declaration> {
        match decl {
            Declaration::FunDecl(f) => self.check_function_declaration(f).map(Declaration::FunDecl),
            Declaration::VarDecl(v) => self.check_file_scope_variable(v).map(Declaration::VarDecl),
        }
    }

    fn fun_type_of(ty: &Type) -> CResult<&FunType> {
        match ty {
            Type::Fun(ft) => Ok(ft),
            _ => Err(CompileError::Internal("expected a function type".to_string())),
        }
    }

    fn check_function_declaration(&mut self, decl: FunctionDeclaration) -> CResult<FunctionDeclaration> {
        let has_body = decl.body.is_some();
        let mut global = decl.storage_class != Some(StorageClass::Static);
        let mut already_defined = false;

        if let Some(existing) = self.ctx.symbols.get(&decl.name) {
            if existing.ty != decl.fun_type {
                return Err(CompileError::Type(format!(
                    "conflicting declarations of '{}': {} vs {}",
                    decl.name, existing.ty, decl.fun_type
                )));
            }
            let IdentifierAttr::Fun { defined, global: existing_global } = &existing.attrs else {
                return Err(CompileError::Type(format!("'{}' redeclared as a different kind of symbol", decl.name)));
            };
            let (defined, existing_global) = (*defined, *existing_global);
            already_defined = defined;
            if already_defined && has_body {
                return Err(CompileError::Type(format!("redefinition of function '{}'", decl.name)));
            }
            if existing_global && decl.storage_class == Some(StorageClass::Static) {
                return Err(CompileError::Type(format!(
                    "static declaration of '{}' follows a non-static declaration",
                    decl.name
                )));
            }
            global = existing_global;
        }

        self.ctx.symbols.insert(
            decl.name.clone(),
            SymbolEntry {
                ty: decl.fun_type.clone(),
                attrs: IdentifierAttr::Fun { defined: already_defined || has_body, global },
            },
        );

        let body = if let Some(body) = decl.body {
            let ft = Self::fun_type_of(&decl.fun_type)?.clone();
            for (param, pty) in decl.params.iter().zip(ft.params.iter()) {
                self.ctx.symbols.insert(param.clone(), SymbolEntry { ty: pty.clone(), attrs: IdentifierAttr::Local });
            }
            Some(self.check_block(body, &ft.ret)?)
        } else {
            None
        };

        Ok(FunctionDeclaration { name: decl.name, params: decl.params, body, fun_type: decl.fun_type, storage_class: decl.storage_class })
    }

    fn check_file_scope_variable(&mut self, decl: VariableDeclaration) -> CResult<VariableDeclaration> {
        let mut initial = match &decl.init {
            Some(e) => match &e.kind {
                ExpKind::Constant(c) => {
                    InitialValue::Initial(StaticInit::from_const(Const::convert(c.as_i128(), decl.var_type.clone())))
                }
                _ => return Err(CompileError::Type("file-scope variable initializer must be a constant expression".to_string())),
            },
            None => {
                if decl.storage_class == Some(StorageClass::Extern) {
                    InitialValue::NoInitializer
                } else {
                    InitialValue::Tentative
                }
            }
        };

        let mut global = decl.storage_class != Some(StorageClass::Static);

        if let Some(existing) = self.ctx.symbols.get(&decl.name) {
            if existing.ty != decl.var_type {
                return Err(CompileError::Type(format!("conflicting declarations of '{}'", decl.name)));
            }
            let IdentifierAttr::Static { init: existing_init, global: existing_global } = &existing.attrs else {
                return Err(CompileError::Type(format!("function redeclared as variable: '{}'", decl.name)));
            };
            if decl.storage_class == Some(StorageClass::Extern) {
                global = *existing_global;
            } else if *existing_global != global {
                return Err(CompileError::Type(format!("conflicting linkage for '{}'", decl.name)));
            }

            match existing_init {
                InitialValue::Initial(_) => {
                    if matches!(initial, InitialValue::Initial(_)) {
                        return Err(CompileError::Type(format!(
                            "conflicting file-scope initializers for '{}'",
                            decl.name
                        )));
                    }
                    initial = existing_init.clone();
                }
                InitialValue::Tentative if !matches!(initial, InitialValue::Initial(_)) => {
                    initial = InitialValue::Tentative;
                }
                _ => {}
            }
        }

        self.ctx.symbols.insert(
            decl.name.clone(),
            SymbolEntry { ty: decl.var_type.clone(), attrs: IdentifierAttr::Static { init: initial, global } },
        );

        let init = decl.init.map(|e| self.check_exp(e)).transpose()?.map(|e| convert_to(e, decl.var_type.clone()));
        Ok(VariableDeclaration { name: decl.name, init, var_type: decl.var_type, storage_class: decl.storage_class })
    }

    fn check_block(&mut self, block: Block, return_type: &Type) -> CResult<Block> {
        let mut items = Vec::with_capacity(block.items.len());
        for item in block.items {
            items.push(self.check_block_item(item, return_type)?);
        }
        Ok(Block { items })
    }

    fn check_block_item(&mut self, item: BlockItem, return_type: &Type) -> CResult<BlockItem> {
        match item {
            BlockItem::D(decl) => self.check_local_declaration(decl).map(BlockItem::D),
            BlockItem::S(stmt) => self.check_statement(stmt, return_type).map(BlockItem::S),
        }
    }

    fn check_local_declaration(&mut self, decl: Declaration) -> CResult<Declaration> {
        match decl {
            Declaration::FunDecl(f) => self.check_function_declaration(f).map(Declaration::FunDecl),
            Declaration::VarDecl(v) => self.check_local_variable(v).map(Declaration::VarDecl),
        }
    }

    fn check_local_variable(&mut self, decl: VariableDeclaration) -> CResult<VariableDeclaration> {
        match decl.storage_class {
            Some(StorageClass::Extern) => {
                if decl.init.is_some() {
                    return Err(CompileError::Type(format!("initializer on local extern declaration of '{}'", decl.name)));
                }
                if let Some(existing) = self.ctx.symbols.get(&decl.name) {
                    if existing.ty != decl.var_type {
                        return Err(CompileError::Type(format!("conflicting declarations of '{}'", decl.name)));
                    }
                } else {
                    self.ctx.symbols.insert(
                        decl.name.clone(),
                        SymbolEntry {
                            ty: decl.var_type.clone(),
                            attrs: IdentifierAttr::Static { init: InitialValue::NoInitializer, global: true },
                        },
                    );
                }
                Ok(VariableDeclaration { name: decl.name, init: None, var_type: decl.var_type, storage_class: decl.storage_class })
            }
            Some(StorageClass::Static) => {
                let init_value = match &decl.init {
                    Some(e) => match &e.kind {
                        ExpKind::Constant(c) => StaticInit::from_const(Const::convert(c.as_i128(), decl.var_type.clone())),
                        _ => return Err(CompileError::Type(format!("non-constant initializer on local static '{}'", decl.name))),
                    },
                    None => StaticInit::zero_of(decl.var_type.clone()),
                };
                self.ctx.symbols.insert(
                    decl.name.clone(),
                    SymbolEntry {
                        ty: decl.var_type.clone(),
                        attrs: IdentifierAttr::Static { init: InitialValue::Initial(init_value), global: false },
                    },
                );
                Ok(VariableDeclaration { name: decl.name, init: None, var_type: decl.var_type, storage_class: decl.storage_class })
            }
            None => {
                self.ctx.symbols.insert(decl.name.clone(), SymbolEntry { ty: decl.var_type.clone(), attrs: IdentifierAttr::Local });
                let init = decl.init.map(|e| self.check_exp(e)).transpose()?.map(|e| convert_to(e, decl.var_type.clone()));
                Ok(VariableDeclaration { name: decl.name, init, var_type: decl.var_type, storage_class: None })
            }
        }
    }

    fn check_statement(&mut self, stmt: Statement, return_type: &Type) -> CResult<Statement> {
        Ok(match stmt {
            Statement::Return(e) => {
                let e = self.check_exp(e)?;
                Statement::Return(convert_to(e, return_type.clone()))
            }
            Statement::Expression(e) => Statement::Expression(self.check_exp(e)?),
            Statement::If { cond, then, otherwise } => Statement::If {
                cond: self.check_exp(cond)?,
                then: Box::new(self.check_statement(*then, return_type)?),
                otherwise: otherwise.map(|s| self.check_statement(*s, return_type)).transpose()?.map(Box::new),
            },
            Statement::Compound(block) => Statement::Compound(self.check_block(block, return_type)?),
            Statement::Break(l) => Statement::Break(l),
            Statement::Continue(l) => Statement::Continue(l),
            Statement::While { cond, body, label } => Statement::While {
                cond: self.check_exp(cond)?,
                body: Box::new(self.check_statement(*body, return_type)?),
                label,
            },
            Statement::DoWhile { body, cond, label } => Statement::DoWhile {
                body: Box::new(self.check_statement(*body, return_type)?),
                cond: self.check_exp(cond)?,
                label,
            },
            Statement::For { init, cond, post, body, label } => Statement::For {
                init: self.check_for_init(init)?,
                cond: cond.map(|e| self.check_exp(e)).transpose()?,
                post: post.map(|e| self.check_exp(e)).transpose()?,
                body: Box::new(self.check_statement(*body, return_type)?),
                label,
            },
            Statement::Null => Statement::Null,
        })
    }

    fn check_for_init(&mut self, init: ForInit) -> CResult<ForInit> {
        Ok(match init {
            ForInit::InitDecl(decl) => ForInit::InitDecl(self.check_local_variable(decl)?),
            ForInit::InitExp(e) => ForInit::InitExp(e.map(|e| self.check_exp(e)).transpose()?),
        })
    }

    fn check_exp(&mut self, exp: Exp) -> CResult<Exp> {
        Ok(match exp.kind {
            ExpKind::Constant(c) => Exp::typed(ExpKind::Constant(c), c.ty()),
            ExpKind::Var(name) => {
                let entry = self
                    .ctx
                    .symbols
                    .get(&name)
                    .ok_or_else(|| CompileError::Internal(format!("'{}' missing from the symbol table", name)))?;
                if entry.ty.is_function() {
                    return Err(CompileError::Type(format!("function '{}' used as a variable", name)));
                }
                let ty = entry.ty.clone();
                Exp::typed(ExpKind::Var(name), ty)
            }
            ExpKind::Cast(target, inner) => {
                let inner = self.check_exp(*inner)?;
                Exp::typed(ExpKind::Cast(target.clone(), Box::new(inner)), target)
            }
            ExpKind::Unary(UnaryOperator::Not, inner) => {
                let inner = self.check_exp(*inner)?;
                Exp::typed(ExpKind::Unary(UnaryOperator::Not, Box::new(inner)), Type::Int)
            }
            ExpKind::Unary(op, inner) => {
                let inner = self.check_exp(*inner)?;
                let ty = inner.ty();
                Exp::typed(ExpKind::Unary(op, Box::new(inner)), ty)
            }
            ExpKind::Binary(op, l, r) if op.is_logical() => {
                let l = self.check_exp(*l)?;
                let r = self.check_exp(*r)?;
                Exp::typed(ExpKind::Binary(op, Box::new(l), Box::new(r)), Type::Int)
            }
            ExpKind::Binary(op, l, r) if op.is_relational() => {
                let l = self.check_exp(*l)?;
                let r = self.check_exp(*r)?;
                let common = common_type(l.ty(), r.ty());
                let l = convert_to(l, common.clone());
                let r = convert_to(r, common);
                Exp::typed(ExpKind::Binary(op, Box::new(l), Box::new(r)), Type::Int)
            }
            ExpKind::Binary(op, l, r) => {
                let l = self.check_exp(*l)?;
                let r = self.check_exp(*r)?;
                let common = common_type(l.ty(), r.ty());
                let l = convert_to(l, common.clone());
                let r = convert_to(r, common.clone());
                Exp::typed(ExpKind::Binary(op, Box::new(l), Box::new(r)), common)
            }
            ExpKind::Assignment(lhs, rhs) => {
                let lhs = self.check_exp(*lhs)?;
                let target = lhs.ty();
                let rhs = self.check_exp(*rhs)?;
                let rhs = convert_to(rhs, target.clone());
                Exp::typed(ExpKind::Assignment(Box::new(lhs), Box::new(rhs)), target)
            }
            ExpKind::Conditional { cond, then, otherwise } => {
                let cond = self.check_exp(*cond)?;
                let then = self.check_exp(*then)?;
                let otherwise = self.check_exp(*otherwise)?;
                let common = common_type(then.ty(), otherwise.ty());
                let then = convert_to(then, common.clone());
                let otherwise = convert_to(otherwise, common.clone());
                Exp::typed(
                    ExpKind::Conditional { cond: Box::new(cond), then: Box::new(then), otherwise: Box::new(otherwise) },
                    common,
                )
            }
            ExpKind::FunctionCall(name, args) => {
                let entry = self
                    .ctx
                    .symbols
                    .get(&name)
                    .ok_or_else(|| CompileError::Internal(format!("'{}' missing from the symbol table", name)))?
                    .clone();
                let ft = match &entry.ty {
                    Type::Fun(ft) => ft.clone(),
                    _ => return Err(CompileError::Type(format!("variable '{}' used as a function", name))),
                };
                if ft.params.len() != args.len() {
                    return Err(CompileError::Type(format!(
                        "function '{}' called with {} argument(s), expected {}",
                        name,
                        args.len(),
                        ft.params.len()
                    )));
                }
                let mut checked_args = Vec::with_capacity(args.len());
                for (arg, pty) in args.into_iter().zip(ft.params.iter()) {
                    let arg = self.check_exp(arg)?;
                    checked_args.push(convert_to(arg, pty.clone()));
                }
                Exp::typed(ExpKind::FunctionCall(name, checked_args), ft.ret)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve_program;

    fn check(src: &str) -> CResult<(Program, Context)> {
        let program = Parser::new(src).unwrap().parse_program().unwrap();
        let mut ctx = Context::new();
        let program = resolve_program(&mut ctx, program).unwrap();
        let program = TypeChecker::new(&mut ctx).check_program(program)?;
        Ok((program, ctx))
    }

    #[test]
    fn every_expression_gets_a_type() {
        let (program, _) = check("int main(void) { long x = 1; return x + 2; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Return(e)) = &body.items[1] else { panic!() };
        assert!(e.ty.is_some());
    }

    #[test]
    fn common_type_widens_int_to_long() {
        assert_eq!(common_type(Type::Int, Type::Long), Type::Long);
        assert_eq!(common_type(Type::Int, Type::UInt), Type::UInt);
        assert_eq!(common_type(Type::Long, Type::ULong), Type::ULong);
    }

    #[test]
    fn inserts_cast_for_implicit_conversion() {
        let (program, _) = check("int main(void) { long x = 1; return x; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Return(e)) = &body.items[1] else { panic!() };
        assert!(matches!(e.kind, ExpKind::Cast(Type::Int, _)));
    }

    #[test]
    fn wrong_arity_call_is_rejected() {
        assert!(check("int f(int a) { return a; } int main(void) { return f(1, 2); }").is_err());
    }

    #[test]
    fn variable_used_as_function_is_rejected() {
        assert!(check("int main(void) { int x; return x(); }").is_err());
    }

    #[test]
    fn static_after_non_static_is_rejected() {
        assert!(check("int f(void); static int f(void) { return 0; } int main(void) { return f(); }").is_err());
    }

    #[test]
    fn non_constant_file_scope_initializer_is_rejected() {
        assert!(check("int g(void); int x = g();").is_err());
    }
}
