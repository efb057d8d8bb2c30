//! Tree-walking evaluator.
//!
//! Statements run against one *current* environment, which starts as the
//! global scope.  Blocks, loops with an initializer, and calls swap in a child
//! scope for their duration and always restore the previous one, whether they
//! finish normally, return, or fail.
//!
//! Variable access takes one of two paths: references the resolver bound to a
//! local scope jump straight to it by distance, everything else is looked up
//! by name in the global scope.

use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{BinaryOp, Expr, ExprId, Ident, LogicalOp, Stmt, UnaryOp};
use crate::callable::{natives, Function};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell through; continue with the next statement.
    Normal,

    /// A `return` is unwinding to the nearest call boundary.
    Return(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// Deepest chain of user-level calls before a call fails with
/// [`RuntimeError::StackOverflow`].
pub const MAX_CALL_DEPTH: usize = 10_000;

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    output: Box<dyn Write>,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an Interpreter whose `print` lines go to `output`.  Native
    /// functions such as `clock` are defined in the fresh global scope.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        for native in natives() {
            debug!("Defining native function '{}'", native.name);
            globals
                .borrow_mut()
                .define(native.name, Value::Callable(Rc::new(native)));
        }

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::default(),
            output,
            call_depth: 0,
        }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Adopt the resolver's distances for a unit about to be interpreted.
    ///
    /// Tables accumulate, since functions from earlier units stay callable.
    /// Entries are never pruned, even once their nodes are dropped, so the
    /// table holds one entry per local reference in all source submitted to
    /// this interpreter.
    pub fn note_locals(&mut self, locals: Locals) {
        debug!("Noting {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        let result = self.execute_all(statements);

        // Lines printed before a failure must reach the sink ahead of the
        // error report.
        let flushed = self.output.flush().map_err(|source| RuntimeError::Output {
            source,
            line: 0,
        });

        result?;
        flushed?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Run `body` with `environment` as the current scope, restoring the
    /// previous scope on every exit path.
    fn in_scope<T>(
        &mut self,
        environment: EnvRef,
        body: impl FnOnce(&mut Self) -> IResult<T>,
    ) -> IResult<T> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);
        let result = body(self);
        self.environment = previous;
        result
    }

    /// Fresh child of the current scope.
    fn child_scope(&self) -> EnvRef {
        Environment::with_enclosing(Rc::clone(&self.environment)).into_ref()
    }

    /// Executes `statements` inside `environment`; used for blocks and
    /// function bodies.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<Flow> {
        debug!("Entering block with {} statements", statements.len());

        self.in_scope(environment, |this| this.execute_all(statements))
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> IResult<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Flow> {
        match stmt {
            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name);

                let function = Function::new(Rc::clone(declaration), Rc::clone(&self.environment));
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.name, Value::Callable(Rc::new(function)));
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print { line, values } => {
                for expr in values {
                    let value: Value = self.evaluate(expr)?;
                    writeln!(self.output, "{}", value).map_err(|source| RuntimeError::Output {
                        source,
                        line: *line,
                    })?;
                }
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name, value);
                self.environment.borrow_mut().define(&name.name, value);
            }

            Stmt::Block(statements) => {
                let scope: EnvRef = self.child_scope();
                return self.execute_block(statements, scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let scope: EnvRef = self.child_scope();
                return self.in_scope(scope, |this| {
                    if let Some(init) = initializer {
                        this.execute(init)?;
                    }

                    loop {
                        if let Some(cond) = condition {
                            if !this.evaluate(cond)?.is_truthy() {
                                break;
                            }
                        }

                        if let Flow::Return(value) = this.execute(body)? {
                            return Ok(Flow::Return(value));
                        }

                        if let Some(inc) = increment {
                            this.evaluate(inc)?;
                        }
                    }

                    Ok(Flow::Normal)
                });
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                line,
                right,
            } => {
                let right: Value = self.evaluate(right)?;

                match (operator, right) {
                    (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Negate, _) => Err(RuntimeError::type_error(
                        *line,
                        "Operand must be a number.",
                    )),
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
                }
            }

            Expr::Binary {
                left,
                operator,
                line,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                binary(*operator, *line, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(*id) {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    values.push(self.evaluate(arg)?);
                }

                let function = match callee {
                    Value::Callable(function) => function,
                    other => {
                        debug!("Attempted to call a {}", other.type_name());
                        return Err(RuntimeError::NotCallable { line: *paren });
                    }
                };

                if values.len() != function.arity() {
                    return Err(RuntimeError::Arity {
                        expected: function.arity(),
                        actual: values.len(),
                        line: *paren,
                    });
                }

                if self.call_depth >= MAX_CALL_DEPTH {
                    debug!("Call depth limit of {} reached", MAX_CALL_DEPTH);
                    return Err(RuntimeError::StackOverflow { line: *paren });
                }

                self.call_depth += 1;
                let result = function.call(self, values, *paren);
                self.call_depth -= 1;

                result
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Ident) -> IResult<Value> {
        match self.locals.get(id) {
            Some(distance) => Ok(Environment::get_at(&self.environment, distance, name)),
            None => self.globals.borrow().get(name),
        }
    }
}

/// Applies a binary operator to two evaluated operands.
fn binary(operator: BinaryOp, line: usize, left: Value, right: Value) -> IResult<Value> {
    match operator {
        BinaryOp::Equal => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => return Ok(Value::Bool(left != right)),
        BinaryOp::Add => {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(RuntimeError::type_error(
                    line,
                    "Operands must be two numbers or two strings.",
                )),
            };
        }
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(RuntimeError::type_error(line, "Operands must be numbers."));
    };

    let value: Value = match operator {
        BinaryOp::Subtract => Value::Number(a - b),
        BinaryOp::Multiply => Value::Number(a * b),
        BinaryOp::Divide => Value::Number(a / b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::Add | BinaryOp::Equal | BinaryOp::NotEqual => unreachable!("handled above"),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LiteralValue;

    fn num(n: f64) -> Expr {
        Expr::Literal(LiteralValue::Number(n))
    }

    fn text(s: &str) -> Expr {
        Expr::Literal(LiteralValue::Str(s.to_string()))
    }

    fn eval(expr: Expr) -> IResult<Value> {
        Interpreter::with_output(Box::new(io::sink())).evaluate(&expr)
    }

    fn bin(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            operator,
            line: 1,
            right: Box::new(right),
        }
    }

    #[test]
    fn plus_is_overloaded_for_numbers_and_text() {
        assert_eq!(eval(bin(num(1.0), BinaryOp::Add, num(2.0))).unwrap(), Value::Number(3.0));
        assert_eq!(
            eval(bin(text("a"), BinaryOp::Add, text("b"))).unwrap(),
            Value::String("ab".into())
        );
        assert!(matches!(
            eval(bin(num(1.0), BinaryOp::Add, text("x"))),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn comparisons_require_numbers() {
        assert_eq!(
            eval(bin(num(1.0), BinaryOp::LessEqual, num(1.0))).unwrap(),
            Value::Bool(true)
        );
        let err = eval(bin(text("a"), BinaryOp::Greater, num(1.0))).unwrap_err();
        assert_eq!(err.to_string(), "Operands must be numbers.");
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(
            eval(bin(num(1.0), BinaryOp::Divide, num(0.0))).unwrap(),
            Value::Number(f64::INFINITY)
        );
    }

    #[test]
    fn equality_never_fails_across_types() {
        assert_eq!(
            eval(bin(Expr::Literal(LiteralValue::Nil), BinaryOp::Equal, num(0.0))).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval(bin(text("1"), BinaryOp::NotEqual, num(1.0))).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn logical_operators_return_operand_values() {
        let or = Expr::Logical {
            left: Box::new(Expr::Literal(LiteralValue::Nil)),
            operator: LogicalOp::Or,
            right: Box::new(text("x")),
        };
        assert_eq!(eval(or).unwrap(), Value::String("x".into()));

        let and = Expr::Logical {
            left: Box::new(num(0.0)),
            operator: LogicalOp::And,
            right: Box::new(Expr::Literal(LiteralValue::Bool(false))),
        };
        assert_eq!(eval(and).unwrap(), Value::Bool(false));
    }

    #[test]
    fn unary_negate_requires_a_number() {
        let negate = Expr::Unary {
            operator: UnaryOp::Negate,
            line: 4,
            right: Box::new(text("x")),
        };
        let err = eval(negate).unwrap_err();
        assert_eq!(err.line(), 4);
        assert_eq!(err.to_string(), "Operand must be a number.");
    }

    #[test]
    fn unresolved_variables_read_globals_by_name() {
        let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
        interpreter
            .globals()
            .borrow_mut()
            .define("g", Value::Number(7.0));

        let read = Expr::variable(Ident::new("g", 1));
        assert_eq!(interpreter.evaluate(&read).unwrap(), Value::Number(7.0));

        let missing = Expr::variable(Ident::new("nope", 2));
        assert!(matches!(
            interpreter.evaluate(&missing),
            Err(RuntimeError::UndefinedVariable { line: 2, .. })
        ));
    }

    #[test]
    fn clock_is_a_global_native() {
        let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
        let call = Expr::Call {
            callee: Box::new(Expr::variable(Ident::new("clock", 1))),
            paren: 1,
            arguments: Vec::new(),
        };

        assert!(matches!(interpreter.evaluate(&call), Ok(Value::Number(n)) if n > 0.0));
    }
}
