//! Variable resolution (`spec.md` §4.3): renames local identifiers to
//! globally-unique names, enforces block scoping and linkage rules, and
//! rejects local function *definitions* and assignments to non-lvalues.
//!
//! The identifier map is an immutable-style threading of `HashMap` clones:
//! entering a nested scope clones the current map and marks every inherited
//! entry as "not from this scope", so a duplicate-declaration check only
//! ever looks at entries introduced in the current scope.

use crate::ast::*;
use crate::context::Context;
use crate::error::{CResult, CompileError};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct MapEntry {
    unique_name: String,
    from_current_scope: bool,
    has_linkage: bool,
}

type Scope = HashMap<String, MapEntry>;

fn enter_scope(outer: &Scope) -> Scope {
    outer
        .iter()
        .map(|(k, v)| {
            (
                k.clone(),
                MapEntry { unique_name: v.unique_name.clone(), from_current_scope: false, has_linkage: v.has_linkage },
            )
        })
        .collect()
}

pub fn resolve_program(ctx: &mut Context, program: Program) -> CResult<Program> {
    let mut scope: Scope = HashMap::new();
    let mut declarations = Vec::with_capacity(program.declarations.len());
    for decl in program.declarations {
        declarations.push(resolve_file_scope_declaration(ctx, &mut scope, decl)?);
    }
    Ok(Program { declarations })
}

fn resolve_file_scope_declaration(ctx: &mut Context, scope: &mut Scope, decl: Declaration) -> CResult<Declaration> {
    match decl {
        Declaration::FunDecl(f) => resolve_function_declaration(ctx, scope, f).map(Declaration::FunDecl),
        Declaration::VarDecl(v) => resolve_file_scope_variable(scope, v).map(Declaration::VarDecl),
    }
}

fn resolve_file_scope_variable(scope: &mut Scope, decl: VariableDeclaration) -> CResult<VariableDeclaration> {
    scope.insert(
        decl.name.clone(),
        MapEntry { unique_name: decl.name.clone(), from_current_scope: true, has_linkage: true },
    );
    // File-scope declarations keep their source name; only the init
    // expression (if any) can reference locals, but a file-scope
    // initializer must be constant, so there is nothing further to resolve
    // here (the type checker rejects a non-constant one).
    Ok(decl)
}

fn resolve_function_declaration(ctx: &mut Context, scope: &mut Scope, decl: FunctionDeclaration) -> CResult<FunctionDeclaration> {
    if let Some(existing) = scope.get(&decl.name) {
        if existing.from_current_scope && !existing.has_linkage {
            return Err(CompileError::Resolve(format!(
                "'{}' redeclared as a function after a conflicting non-linkage declaration",
                decl.name
            )));
        }
    }
    scope.insert(
        decl.name.clone(),
        MapEntry { unique_name: decl.name.clone(), from_current_scope: true, has_linkage: true },
    );

    if decl.body.is_none() {
        return Ok(decl);
    }

    let mut fn_scope = enter_scope(scope);
    let mut params = Vec::with_capacity(decl.params.len());
    for param in decl.params {
        if let Some(existing) = fn_scope.get(&param) {
            if existing.from_current_scope {
                return Err(CompileError::Resolve(format!("duplicate parameter name '{}'", param)));
            }
        }
        let unique = ctx.fresh(&param);
        fn_scope.insert(param, MapEntry { unique_name: unique.clone(), from_current_scope: true, has_linkage: false });
        params.push(unique);
    }

    let body = resolve_block_in_scope(ctx, &mut fn_scope, decl.body.unwrap())?;

    Ok(FunctionDeclaration { name: decl.name, params, body: Some(body), fun_type: decl.fun_type, storage_class: decl.storage_class })
}

fn resolve_block(ctx: &mut Context, scope: &Scope, block: Block) -> CResult<Block> {
    let mut inner = enter_scope(scope);
    resolve_block_in_scope(ctx, &mut inner, block)
}

fn resolve_block_in_scope(ctx: &mut Context, scope: &mut Scope, block: Block) -> CResult<Block> {
    let mut items = Vec::with_capacity(block.items.len());
    for item in block.items {
        items.push(resolve_block_item(ctx, scope, item)?);
    }
    Ok(Block { items })
}

fn resolve_block_item(ctx: &mut Context, scope: &mut Scope, item: BlockItem) -> CResult<BlockItem> {
    match item {
        BlockItem::D(decl) => resolve_local_declaration(ctx, scope, decl).map(BlockItem::D),
        BlockItem::S(stmt) => resolve_statement(ctx, scope, stmt).map(BlockItem::S),
    }
}

fn resolve_local_declaration(ctx: &mut Context, scope: &mut Scope, decl: Declaration) -> CResult<Declaration> {
    match decl {
        Declaration::FunDecl(f) => {
            if f.body.is_some() {
                return Err(CompileError::Resolve(format!("nested definition of function '{}' is not allowed", f.name)));
            }
            resolve_function_declaration(ctx, scope, f).map(Declaration::FunDecl)
        }
        Declaration::VarDecl(v) => resolve_local_variable(ctx, scope, v).map(Declaration::VarDecl),
    }
}

fn resolve_local_variable(ctx: &mut Context, scope: &mut Scope, decl: VariableDeclaration) -> CResult<VariableDeclaration> {
    if let Some(existing) = scope.get(&decl.name) {
        if existing.from_current_scope {
            let compatible = existing.has_linkage && decl.storage_class == Some(StorageClass::Extern);
            if !compatible {
                return Err(CompileError::Resolve(format!("'{}' already declared in this scope", decl.name)));
            }
        }
    }

    let unique_name = if decl.storage_class == Some(StorageClass::Extern) {
        decl.name.clone()
    } else {
        ctx.fresh(&decl.name)
    };
    let has_linkage = decl.storage_class == Some(StorageClass::Extern);
    scope.insert(decl.name.clone(), MapEntry { unique_name: unique_name.clone(), from_current_scope: true, has_linkage });

    let init = decl.init.map(|e| resolve_exp(scope, e)).transpose()?;

    Ok(VariableDeclaration { name: unique_name, init, var_type: decl.var_type, storage_class: decl.storage_class })
}

fn resolve_statement(ctx: &mut Context, scope: &mut Scope, stmt: Statement) -> CResult<Statement> {
    Ok(match stmt {
        Statement::Return(e) => Statement::Return(resolve_exp(scope, e)?),
        Statement::Expression(e) => Statement::Expression(resolve_exp(scope, e)?),
        Statement::If { cond, then, otherwise } => Statement::If {
            cond: resolve_exp(scope, cond)?,
            then: Box::new(resolve_statement(ctx, scope, *then)?),
            otherwise: otherwise.map(|s| resolve_statement(ctx, scope, *s)).transpose()?.map(Box::new),
        },
        Statement::Compound(block) => Statement::Compound(resolve_block(ctx, scope, block)?),
        Statement::Break(l) => Statement::Break(l),
        Statement::Continue(l) => Statement::Continue(l),
        Statement::While { cond, body, label } => Statement::While {
            cond: resolve_exp(scope, cond)?,
            body: Box::new(resolve_statement(ctx, scope, *body)?),
            label,
        },
        Statement::DoWhile { body, cond, label } => Statement::DoWhile {
            body: Box::new(resolve_statement(ctx, scope, *body)?),
            cond: resolve_exp(scope, cond)?,
            label,
        },
        Statement::For { init, cond, post, body, label } => {
            let mut for_scope = enter_scope(scope);
            let init = resolve_for_init(ctx, &mut for_scope, init)?;
            let cond = cond.map(|e| resolve_exp(&for_scope, e)).transpose()?;
            let post = post.map(|e| resolve_exp(&for_scope, e)).transpose()?;
            let body = Box::new(resolve_statement(ctx, &mut for_scope, *body)?);
            Statement::For { init, cond, post, body, label }
        }
        Statement::Null => Statement::Null,
    })
}

fn resolve_for_init(ctx: &mut Context, scope: &mut Scope, init: ForInit) -> CResult<ForInit> {
    Ok(match init {
        ForInit::InitDecl(decl) => {
            if decl.storage_class.is_some() {
                return Err(CompileError::Resolve("storage-class specifier not allowed in a for-init declaration".to_string()));
            }
            ForInit::InitDecl(resolve_local_variable(ctx, scope, decl)?)
        }
        ForInit::InitExp(e) => ForInit::InitExp(e.map(|e| resolve_exp(scope, e)).transpose()?),
    })
}

fn resolve_exp(scope: &Scope, exp: Exp) -> CResult<Exp> {
    let kind = match exp.kind {
        ExpKind::Constant(c) => ExpKind::Constant(c),
        ExpKind::Var(name) => {
            let entry = scope
                .get(&name)
                .ok_or_else(|| CompileError::Resolve(format!("undeclared variable '{}'", name)))?;
            ExpKind::Var(entry.unique_name.clone())
        }
        ExpKind::Cast(ty, inner) => ExpKind::Cast(ty, Box::new(resolve_exp(scope, *inner)?)),
        ExpKind::Unary(op, inner) => ExpKind::Unary(op, Box::new(resolve_exp(scope, *inner)?)),
        ExpKind::Binary(op, l, r) => ExpKind::Binary(op, Box::new(resolve_exp(scope, *l)?), Box::new(resolve_exp(scope, *r)?)),
        ExpKind::Assignment(lhs, rhs) => {
            if !matches!(lhs.kind, ExpKind::Var(_)) {
                return Err(CompileError::Resolve("the left-hand side of an assignment must be a variable".to_string()));
            }
            ExpKind::Assignment(Box::new(resolve_exp(scope, *lhs)?), Box::new(resolve_exp(scope, *rhs)?))
        }
        ExpKind::Conditional { cond, then, otherwise } => ExpKind::Conditional {
            cond: Box::new(resolve_exp(scope, *cond)?),
            then: Box::new(resolve_exp(scope, *then)?),
            otherwise: Box::new(resolve_exp(scope, *otherwise)?),
        },
        ExpKind::FunctionCall(name, args) => {
            let entry = scope
                .get(&name)
                .ok_or_else(|| CompileError::Resolve(format!("undeclared function '{}'", name)))?;
            let callee = entry.unique_name.clone();
            let args = args.into_iter().map(|a| resolve_exp(scope, a)).collect::<CResult<Vec<_>>>()?;
            ExpKind::FunctionCall(callee, args)
        }
    };
    Ok(Exp { kind, ty: exp.ty })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn resolve(src: &str) -> CResult<Program> {
        let program = Parser::new(src).unwrap().parse_program().unwrap();
        let mut ctx = Context::new();
        resolve_program(&mut ctx, program)
    }

    #[test]
    fn renames_locals_uniquely() {
        let program = resolve("int main(void) { int x = 1; { int x = 2; } return x; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::D(Declaration::VarDecl(outer)) = &body.items[0] else { panic!() };
        let BlockItem::S(Statement::Compound(inner_block)) = &body.items[1] else { panic!() };
        let BlockItem::D(Declaration::VarDecl(inner)) = &inner_block.items[0] else { panic!() };
        assert_ne!(outer.name, inner.name);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_fails() {
        assert!(resolve("int main(void) { int x; int x; return 0; }").is_err());
    }

    #[test]
    fn undeclared_variable_fails() {
        assert!(resolve("int main(void) { return y; }").is_err());
    }

    #[test]
    fn assignment_to_non_lvalue_fails() {
        assert!(resolve("int main(void) { int x; 1 = x; return 0; }").is_err());
    }

    #[test]
    fn nested_function_definition_fails() {
        assert!(resolve("int main(void) { int f(void) { return 0; } return f(); }").is_err());
    }

    #[test]
    fn extern_local_links_to_file_scope() {
        let program = resolve("int x; int main(void) { extern int x; return x; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[1] else { panic!() };
        let body = f.body.as_ref().unwrap();
        let BlockItem::S(Statement::Return(exp)) = &body.items[1] else { panic!() };
        assert_eq!(exp.kind, ExpKind::Var("x".to_string()));
    }
}
