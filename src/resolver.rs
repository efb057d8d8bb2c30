//! Static resolver pass for the **Wilson** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str, bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, top-level `return`).
//! 3. Record, for *each* variable occurrence bound to a local scope, how many
//!    scopes up its binding lives.  Occurrences with no entry are globals and
//!    are looked up by name at runtime.
//!
//! The global scope is never pushed, so top-level declarations may be
//! repeated and may refer forward to names defined later.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Ident, Stmt};
use crate::error::{Result, WilsonError};
use crate::stack::ensure_sufficient_stack;

/// Side table from variable-referencing expression to scope distance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locals(HashMap<ExprId, usize>);

impl Locals {
    pub fn get(&self, id: ExprId) -> Option<usize> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExprId, usize)> + '_ {
        self.0.iter().map(|(id, distance)| (*id, *distance))
    }

    /// Merge another unit's table into this one.
    pub fn extend(&mut self, other: Locals) {
        self.0.extend(other.0);
    }

    fn insert(&mut self, id: ExprId, distance: usize) {
        self.0.insert(id, distance);
    }
}

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances into a [`Locals`] table.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    locals: Locals,
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            locals: Locals::default(),
        }
    }

    /// Walk all top‑level statements and return the finished distance table.
    /// Stops at the first static error.
    pub fn resolve(mut self, statements: &'a [Stmt]) -> Result<Locals> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements)?;

        info!("Resolved {} local reference(s)", self.locals.len());

        Ok(self.locals)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmts(&mut self, statements: &'a [Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &'a Stmt) -> Result<()> {
        ensure_sufficient_stack(|| self.resolve_stmt_kind(stmt))
    }

    fn resolve_stmt_kind(&mut self, stmt: &'a Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                let result = self.resolve_stmts(statements);
                self.end_scope();
                result?;
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // the name is visible *inside* its own body, so recursion binds
                self.declare(&declaration.name)?;
                self.define(&declaration.name);
                self.resolve_function(declaration)?;
            }

            Stmt::Expression(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::Print { values, .. } => {
                for expr in values {
                    self.resolve_expr(expr)?;
                }
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // one loop scope holding the initializer's bindings; a block
                // body pushes its own scope inside it
                self.begin_scope();
                let result = self.resolve_for(
                    initializer.as_deref(),
                    condition.as_ref(),
                    increment.as_ref(),
                    body,
                );
                self.end_scope();
                result?;
            }

            Stmt::Return { line, value } => {
                if self.current_function == FunctionType::None {
                    return Err(WilsonError::resolve(
                        *line,
                        "return",
                        "Can't return from top-level code.",
                    ));
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_for(
        &mut self,
        initializer: Option<&'a Stmt>,
        condition: Option<&'a Expr>,
        increment: Option<&'a Expr>,
        body: &'a Stmt,
    ) -> Result<()> {
        if let Some(init) = initializer {
            self.resolve_stmt(init)?;
        }
        if let Some(cond) = condition {
            self.resolve_expr(cond)?;
        }
        if let Some(inc) = increment {
            self.resolve_expr(inc)?;
        }
        self.resolve_stmt(body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) -> Result<()> {
        ensure_sufficient_stack(|| self.resolve_expr_kind(expr))
    }

    fn resolve_expr_kind(&mut self, expr: &'a Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.name.as_str()) == Some(&false) {
                        return Err(WilsonError::resolve(
                            name.line,
                            &name.name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// One fresh scope holds the parameters and the body's own declarations,
    /// matching the single environment a call creates.
    fn resolve_function(&mut self, declaration: &'a FunctionDecl) -> Result<()> {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();
        let result = self.resolve_params_and_body(declaration);
        self.end_scope();

        self.current_function = enclosing;
        result
    }

    fn resolve_params_and_body(&mut self, declaration: &'a FunctionDecl) -> Result<()> {
        for param in &declaration.params {
            self.declare(param)?;
            self.define(param);
        }
        self.resolve_stmts(&declaration.body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &'a Ident) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.name.as_str()) {
                return Err(WilsonError::resolve(
                    name.line,
                    &name.name,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(&name.name, false);
        }
        Ok(())
    }

    fn define(&mut self, name: &'a Ident) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(&name.name, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of the
    /// table when no scope on the stack declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Ident) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.name.as_str()) {
                debug!("Resolved '{}' at depth {}", name.name, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens = Scanner::new(source).scan_all().unwrap();
        Parser::new(&tokens).parse().unwrap()
    }

    /// Every `Variable` / `Assign` id in source order, with its name.
    fn references(statements: &[Stmt]) -> Vec<(ExprId, String)> {
        fn walk_expr(expr: &Expr, out: &mut Vec<(ExprId, String)>) {
            match expr {
                Expr::Literal(_) => {}
                Expr::Grouping(inner) | Expr::Unary { right: inner, .. } => walk_expr(inner, out),
                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    walk_expr(left, out);
                    walk_expr(right, out);
                }
                Expr::Variable { id, name } => out.push((*id, name.name.clone())),
                Expr::Assign { id, name, value } => {
                    walk_expr(value, out);
                    out.push((*id, name.name.clone()));
                }
                Expr::Call {
                    callee, arguments, ..
                } => {
                    walk_expr(callee, out);
                    arguments.iter().for_each(|arg| walk_expr(arg, out));
                }
            }
        }

        fn walk_stmt(stmt: &Stmt, out: &mut Vec<(ExprId, String)>) {
            match stmt {
                Stmt::Expression(expr) => walk_expr(expr, out),
                Stmt::Print { values, .. } => values.iter().for_each(|e| walk_expr(e, out)),
                Stmt::Var { initializer, .. } => initializer.iter().for_each(|e| walk_expr(e, out)),
                Stmt::Block(body) => body.iter().for_each(|s| walk_stmt(s, out)),
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    walk_expr(condition, out);
                    walk_stmt(then_branch, out);
                    else_branch.iter().for_each(|s| walk_stmt(s, out));
                }
                Stmt::While { condition, body } => {
                    walk_expr(condition, out);
                    walk_stmt(body, out);
                }
                Stmt::For {
                    initializer,
                    condition,
                    increment,
                    body,
                } => {
                    initializer.iter().for_each(|s| walk_stmt(s, out));
                    condition.iter().for_each(|e| walk_expr(e, out));
                    increment.iter().for_each(|e| walk_expr(e, out));
                    walk_stmt(body, out);
                }
                Stmt::Function(decl) => decl.body.iter().for_each(|s| walk_stmt(s, out)),
                Stmt::Return { value, .. } => value.iter().for_each(|e| walk_expr(e, out)),
            }
        }

        let mut out = Vec::new();
        statements.iter().for_each(|s| walk_stmt(s, &mut out));
        out
    }

    fn distances(source: &str) -> Vec<(String, Option<usize>)> {
        let statements = parse(source);
        let locals = Resolver::new().resolve(&statements).unwrap();

        references(&statements)
            .into_iter()
            .map(|(id, name)| (name, locals.get(id)))
            .collect()
    }

    fn named(entries: &[(&str, Option<usize>)]) -> Vec<(String, Option<usize>)> {
        entries
            .iter()
            .map(|(name, distance)| (name.to_string(), *distance))
            .collect()
    }

    #[test]
    fn globals_are_left_out_of_the_table() {
        assert_eq!(
            distances("var a = 1; print a; a = 2;"),
            named(&[("a", None), ("a", None)])
        );
    }

    #[test]
    fn block_locals_record_hop_counts() {
        assert_eq!(
            distances("{ var a = 1; { var b = a; print a, b; } }"),
            named(&[("a", Some(1)), ("a", Some(1)), ("b", Some(0))])
        );
    }

    #[test]
    fn closures_bind_to_the_declaring_scope() {
        let source = "
            fun outer() {
                var count = 0;
                fun inner() {
                    count = count + 1;
                    return count;
                }
                return inner;
            }";

        assert_eq!(
            distances(source),
            named(&[
                ("count", Some(1)),
                ("count", Some(1)),
                ("count", Some(1)),
                ("inner", Some(0)),
            ])
        );
    }

    #[test]
    fn for_loop_variables_live_in_the_loop_scope() {
        assert_eq!(
            distances("fun f() { for (var i = 0; i < 3; i = i + 1) { print i; } }"),
            named(&[("i", Some(0)), ("i", Some(0)), ("i", Some(0)), ("i", Some(1))])
        );
    }

    #[test]
    fn unused_locals_are_fine() {
        assert!(distances("{ var unused; var other = 1; }").is_empty());
    }

    #[test]
    fn own_initializer_read_is_rejected() {
        let statements = parse("{ var a = a; }");
        let err = Resolver::new().resolve(&statements).unwrap_err();

        assert_eq!(
            err.to_string(),
            "[Line 1] Error at 'a': Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn redeclaration_in_one_block_is_rejected() {
        let statements = parse("{\n var a = 1;\n var a = 2;\n}");
        let err = Resolver::new().resolve(&statements).unwrap_err();

        assert_eq!(
            err.to_string(),
            "[Line 3] Error at 'a': Already a variable with this name in this scope."
        );
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let statements = parse("fun f(a, a) {}");
        assert!(Resolver::new().resolve(&statements).is_err());
    }

    #[test]
    fn top_level_redeclaration_and_return_rules() {
        let statements = parse("var a = 1; var a = a;");
        assert!(Resolver::new().resolve(&statements).is_ok());

        let statements = parse("return 1;");
        let err = Resolver::new().resolve(&statements).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[Line 1] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn resolving_twice_gives_the_same_table() {
        let statements = parse("fun f(x) { var y = x; { print x, y; } } { var z; z = 1; }");

        let first = Resolver::new().resolve(&statements).unwrap();
        let second = Resolver::new().resolve(&statements).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
