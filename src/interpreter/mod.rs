mod builtins;
mod environment;
mod operators;
mod value;

use std::io::Write;

use tracing::{debug, instrument, trace};

use crate::ast::{BinaryOperator, Block, Expression, NodeId, Program, Statement};
use crate::error::{RuntimeError, RuntimeResult};
use crate::resolver::{Resolution, BUILTIN_EXEC, BUILTIN_PRINT, BUILTIN_PRINTF};

pub use environment::Environment;
pub use operators::apply_binary;
pub use value::Value;

/// Nested user function calls allowed before a run is aborted.
pub const MAX_CALL_DEPTH: usize = 128;

/// Tree-walking evaluator over a resolved program.
///
/// Program output goes to `out`. Variables live in one flat environment
/// shared by the top level and every function body.
pub struct Interpreter<'r, 'a, W: Write> {
    resolution: &'r Resolution<'a>,
    env: Environment,
    out: W,
    depth: usize,
}

impl<'r, 'a, W: Write> Interpreter<'r, 'a, W> {
    pub fn new(resolution: &'r Resolution<'a>, out: W) -> Self {
        Self::with_environment(resolution, Environment::new(), out)
    }

    pub fn with_environment(resolution: &'r Resolution<'a>, env: Environment, out: W) -> Self {
        Self {
            resolution,
            env,
            out,
            depth: 0,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn into_parts(self) -> (Environment, W) {
        (self.env, self.out)
    }

    /// Execute every top-level statement; the program's value is the value
    /// of its last statement.
    #[instrument(skip_all)]
    pub fn run(&mut self, program: &Program) -> RuntimeResult<Value> {
        let value = self.execute_all(&program.statements)?;
        self.out.flush()?;
        debug!(%value, variables = self.env.len(), "Program finished");
        Ok(value)
    }

    fn execute_block(&mut self, block: &Block) -> RuntimeResult<Value> {
        self.execute_all(&block.statements)
    }

    fn execute_all(&mut self, statements: &[Statement]) -> RuntimeResult<Value> {
        let mut last = Value::Nil;
        for statement in statements {
            last = self.execute(statement)?;
        }
        Ok(last)
    }

    fn execute(&mut self, statement: &Statement) -> RuntimeResult<Value> {
        match statement {
            Statement::Import { path } => {
                debug!(%path, "Import has no runtime effect");
                Ok(Value::Nil)
            }
            Statement::Function(_) => Ok(Value::Nil),
            Statement::Variable(decl) => match &decl.init {
                Some(init) => {
                    let value = self.evaluate(init)?;
                    trace!(name = %decl.name, %value, "Initialized variable");
                    self.env.set(&decl.name, value.clone());
                    Ok(value)
                }
                None => Ok(Value::Nil),
            },
            Statement::Expression(expression) => self.evaluate(expression),
        }
    }

    /// Evaluate an expression in value position.
    pub fn evaluate(&mut self, expression: &Expression) -> RuntimeResult<Value> {
        match expression {
            Expression::StringLiteral(value) => Ok(Value::Str(value.clone())),
            Expression::IntegerLiteral(value) => Ok(Value::Int(*value)),
            Expression::DecimalLiteral(value) => Ok(Value::Float(*value)),
            Expression::BooleanLiteral(value) => Ok(Value::Bool(*value)),
            Expression::NullLiteral => Ok(Value::Nil),
            Expression::Variable { name, .. } => Ok(self.env.get(name)),
            Expression::FunctionCall { id, name, args } => self.call(*id, name, args),
            Expression::ExternalCall {
                module, function, ..
            } => Err(RuntimeError::ExternalCallUnsupported(format!(
                "{}::{}",
                module, function
            ))),
            Expression::Binary { op, left, right } => self.evaluate_binary(*op, left, right),
        }
    }

    fn evaluate_arguments(&mut self, args: &[Expression]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    fn evaluate_binary(
        &mut self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> RuntimeResult<Value> {
        if !op.is_assignment() {
            let left = self.evaluate(left)?;
            let right = self.evaluate(right)?;
            return apply_binary(op, left, right);
        }

        let name = evaluate_reference(op, left)?;
        let right = self.evaluate(right)?;
        let value = match (op, op.compound_base()) {
            (BinaryOperator::Assign, _) => right,
            (_, Some(base)) => apply_binary(base, self.env.get(name), right)?,
            (_, None) => {
                let current = self.env.get(name);
                return Err(operators::unsupported(
                    op,
                    current.type_name(),
                    right.type_name(),
                ));
            }
        };

        trace!(%name, %value, op = op.symbol(), "Assigned variable");
        self.env.set(name, value.clone());
        Ok(value)
    }

    /// Builtins see their evaluated arguments. User functions take no
    /// parameters, so their arguments are never evaluated.
    fn call(&mut self, id: NodeId, name: &str, args: &[Expression]) -> RuntimeResult<Value> {
        match name {
            BUILTIN_PRINT => {
                let args = self.evaluate_arguments(args)?;
                return builtins::print(&mut self.out, &args);
            }
            BUILTIN_PRINTF => {
                let args = self.evaluate_arguments(args)?;
                return builtins::printf(&mut self.out, &args);
            }
            BUILTIN_EXEC => {
                let args = self.evaluate_arguments(args)?;
                return builtins::exec(&args);
            }
            _ => {}
        }

        let decl = self
            .resolution
            .function_for(id)
            .ok_or_else(|| RuntimeError::UnresolvedCall(name.to_string()))?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                name: name.to_string(),
                limit: MAX_CALL_DEPTH,
            });
        }

        trace!(%name, depth = self.depth, "Calling function");
        self.depth += 1;
        let result = self.execute_block(&decl.body);
        self.depth -= 1;
        result
    }
}

/// The variable name an assignment writes to. Only a bare variable is a
/// valid target.
fn evaluate_reference(op: BinaryOperator, target: &Expression) -> RuntimeResult<&str> {
    match target {
        Expression::Variable { name, .. } => Ok(name),
        _ => Err(RuntimeError::InvalidAssignmentTarget(op.symbol())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve;

    fn run(source: &str) -> RuntimeResult<(Value, Environment, String)> {
        crate::init_test_tracing();
        let program = Parser::new(source).parse().unwrap();
        let resolution = resolve(&program).unwrap();
        let mut interpreter = Interpreter::new(&resolution, Vec::new());
        let value = interpreter.run(&program)?;
        let (env, out) = interpreter.into_parts();
        Ok((value, env, String::from_utf8(out).unwrap()))
    }

    #[test]
    fn test_assignment_and_print() {
        let (_, env, out) = run("let a = 1; a = a + 2; print(a)").unwrap();
        assert_eq!(env.get("a"), Value::Int(3));
        assert_eq!(out, "3\n");
    }

    #[test]
    fn test_uninitialized_variable_reads_nil() {
        let (value, env, _) = run("let x::int; x").unwrap();
        assert_eq!(value, Value::Nil);
        assert!(!env.is_set("x"));
    }

    #[test]
    fn test_function_call_runs_body() {
        let (_, _, out) = run(r#"fn greet() { print("hi"); } greet();"#).unwrap();
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn test_function_declaration_alone_does_nothing() {
        let (value, _, out) = run(r#"fn greet() { print("hi"); }"#).unwrap();
        assert_eq!(value, Value::Nil);
        assert_eq!(out, "");
    }

    #[test]
    fn test_call_yields_last_statement_of_body() {
        let (value, _, _) = run("fn seven() { 3 + 4 } let x = seven(); x").unwrap();
        assert_eq!(value, Value::Int(7));
    }

    #[test]
    fn test_functions_share_the_environment() {
        let (_, env, _) = run("let n = 1; fn bump() { n += 10; } bump(); bump();").unwrap();
        assert_eq!(env.get("n"), Value::Int(21));
    }

    #[test]
    fn test_program_value_is_last_statement() {
        let (value, _, _) = run(r#"let s = "n=" + 5; s"#).unwrap();
        assert_eq!(value, Value::Str("n=5".to_string()));
    }

    #[test]
    fn test_assignment_yields_value() {
        let (value, env, _) = run("let a = 0; let b = 2; a = b + 2").unwrap();
        assert_eq!(value, Value::Int(4));
        assert_eq!(env.get("a"), Value::Int(4));
    }

    #[test]
    fn test_compound_assignments() {
        let source = r#"let a = 6; a *= 7; a -= 2; a %= 7; let s = "x"; s += "y";"#;
        let (_, env, _) = run(source).unwrap();
        assert_eq!(env.get("a"), Value::Int(5));
        assert_eq!(env.get("s"), Value::Str("xy".to_string()));
    }

    #[test]
    fn test_tilde_assign_is_unsupported() {
        let err = run("let a = 1; a ~= 2").unwrap_err();
        assert!(matches!(err, RuntimeError::UnsupportedBinaryOperation { op: "~=", .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = run("let a = 1; 3 = a").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidAssignmentTarget("=")));
    }

    #[test]
    fn test_external_call_is_unsupported() {
        let err = run("io::write(1)").unwrap_err();
        match err {
            RuntimeError::ExternalCallUnsupported(name) => assert_eq!(name, "io::write"),
            other => panic!("Expected external call error, got {:?}", other),
        }
    }

    #[test]
    fn test_division_by_zero_stops_the_run() {
        let err = run("let a = 1 / 0; print(a)").unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_int_plus_string_stops_the_run() {
        let err = run(r#"let s = 5 + "n=";"#).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UnsupportedBinaryOperation { op: "+", left: "int", right: "string" }
        ));
    }

    #[test]
    fn test_builtin_wins_over_user_function() {
        let (_, _, out) = run(r#"fn print() { 1 } print("builtin")"#).unwrap();
        assert_eq!(out, "builtin\n");
    }

    #[test]
    fn test_exec_result_is_stored() {
        let (_, env, _) = run(r#"let who = exec("echo duang");"#).unwrap();
        assert_eq!(env.get("who"), Value::Str("duang".to_string()));
    }

    #[test]
    fn test_user_function_arguments_are_not_evaluated() {
        let (value, env, out) = run(r#"let n = 0; fn f() { 1 } f(print("x"), n = 5)"#).unwrap();
        assert_eq!(value, Value::Int(1));
        assert_eq!(out, "");
        assert_eq!(env.get("n"), Value::Int(0));
    }

    #[test]
    fn test_builtin_arguments_are_evaluated_in_order() {
        let (_, env, out) = run("let n = 1; print(n += 1, n *= 10, n)").unwrap();
        assert_eq!(out, "2 20 20\n");
        assert_eq!(env.get("n"), Value::Int(20));
    }

    #[test]
    fn test_runaway_recursion_is_an_error() {
        let err = run("fn f() { f() } f()").unwrap_err();
        match err {
            RuntimeError::CallDepthExceeded { name, limit } => {
                assert_eq!(name, "f");
                assert_eq!(limit, MAX_CALL_DEPTH);
            }
            other => panic!("Expected call depth error, got {:?}", other),
        }
    }

    #[test]
    fn test_call_depth_recovers_after_returning() {
        let (_, env, _) = run("let n = 0; fn bump() { n += 1 } bump(); bump(); bump();").unwrap();
        assert_eq!(env.get("n"), Value::Int(3));
    }

    #[test]
    fn test_runs_against_a_prepared_environment() {
        crate::init_test_tracing();
        let program = Parser::new("greeting + \"!\"").parse().unwrap();
        let mut env = Environment::new();
        env.set("greeting", Value::Str("hi".to_string()));

        // greeting is not declared, so resolution has to be bypassed
        let empty = Program { statements: vec![] };
        let resolution = resolve(&empty).unwrap();
        let mut interpreter = Interpreter::with_environment(&resolution, env, Vec::new());
        assert_eq!(interpreter.environment().len(), 1);
        let value = interpreter.run(&program).unwrap();
        assert_eq!(value, Value::Str("hi!".to_string()));
        assert_eq!(interpreter.environment().get("greeting"), Value::Str("hi".to_string()));
    }
}
