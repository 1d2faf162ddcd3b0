//! Tree-walking interpreter.
//!
//! The interpreter reduces a [`SpannedExpr`] to a [`Value`] by dispatching
//! every operator and call through the runtime's registries on the kinds of
//! the evaluated operands. It also tracks whether everything it invoked was
//! idempotent, so callers can decide whether a result may be cached.
//!
//! `&&` and `||` are not plain dispatches: the left operand is evaluated
//! first and a determinate `false` (for `&&`) or `true` (for `||`) settles
//! the result without evaluating the right operand. When the left operand
//! fails, the right one still gets a chance to settle the result, and the
//! left error is reported only if it does not.

use cel_runtime_ast::{BinaryOp, Expr, MapEntry, Span, SpannedExpr, StructField, UnaryOp};
use num_traits::ToPrimitive;

use crate::environment::Environment;
use crate::error::{Error, EvalError, Result};
use crate::operators::Dispatched;
use crate::runtime::Runtime;
use crate::value::{Kind, MapKey, MessageFields, Value, ValueMap};

/// Default cap on expression nesting during evaluation.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Interpreter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Deepest AST nesting evaluated before failing with `RecursionLimit`.
    pub max_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Whether a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Evaluating,
}

/// Evaluates expressions against an [`Environment`].
///
/// An interpreter may run any number of expressions in sequence; each
/// [`run`](Self::run) starts with the idempotency flag set.
#[derive(Debug)]
pub struct Interpreter {
    runtime: Runtime,
    options: InterpreterOptions,
    state: State,
    idempotent: bool,
    depth: usize,
    /// Accumulators of the comprehensions in progress, innermost last. `Some`
    /// while the accumulator holds an error a later step may still absorb.
    accumulators: Vec<(String, Option<Error>)>,
}

impl Interpreter {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            options: InterpreterOptions::default(),
            state: State::Idle,
            idempotent: true,
            depth: 0,
            accumulators: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Evaluate `expr` with the variables in `env`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&mut self, expr: &SpannedExpr, env: &Environment) -> Result<Value> {
        self.reset();
        self.state = State::Evaluating;
        let result = self.eval(expr, env);
        self.state = State::Idle;
        self.depth = 0;
        if let Err(err) = &result {
            tracing::debug!(error = %err, "evaluation failed");
        }
        result
    }

    /// True if the last run invoked only idempotent functions and operators.
    pub fn was_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Clear per-run state.
    pub fn reset(&mut self) {
        self.idempotent = true;
        self.depth = 0;
        self.accumulators.clear();
        self.state = State::Idle;
    }

    fn eval(&mut self, expr: &SpannedExpr, env: &Environment) -> Result<Value> {
        if self.depth >= self.options.max_depth {
            return Err(EvalError::recursion_limit(self.options.max_depth)
                .with_span(expr.span.clone())
                .into());
        }
        self.depth += 1;
        let result = self.eval_node(expr, env);
        self.depth -= 1;
        result.map_err(|e| e.located(&expr.span))
    }

    fn eval_node(&mut self, expr: &SpannedExpr, env: &Environment) -> Result<Value> {
        let span = &expr.span;
        match &expr.node {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::UInt(u) => Ok(Value::uint(*u)),
            Expr::Float(f) => Ok(Value::Double(*f)),
            Expr::String(s) => Ok(Value::string(s.as_str())),
            Expr::Bytes(b) => Ok(Value::bytes(b.as_slice())),

            Expr::Ident(name) => {
                let failed = self.accumulators.iter().rev().find(|(accu, _)| accu == name);
                if let Some((_, Some(err))) = failed {
                    return Err(err.clone());
                }
                env.get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::unknown_identifier(name).into())
            }

            Expr::List(elements) => {
                let values = elements
                    .iter()
                    .map(|e| self.eval(e, env))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            Expr::Map(entries) => self.eval_map(entries, env),

            Expr::Unary { op, expr: operand } => self.eval_unary(*op, span, operand, env),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => self.eval_logical(true, span, left, right, env),
                BinaryOp::Or => self.eval_logical(false, span, left, right, env),
                _ => {
                    let left = self.eval(left, env)?;
                    let right = self.eval(right, env)?;
                    let out = self
                        .runtime
                        .operators()
                        .dispatch_binary(*op, span, &left, &right)?;
                    Ok(self.track(out))
                }
            },
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => match self.eval(cond, env)? {
                Value::Bool(true) => self.eval(then_expr, env),
                Value::Bool(false) => self.eval(else_expr, env),
                other => Err(EvalError::no_matching_operator("_?_:_", &[other.kind()]).into()),
            },

            Expr::Member { expr: base, field } => {
                let base = self.eval(base, env)?;
                select_field(&base, field)
            }
            Expr::Index { expr: base, index } => {
                let base = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                index_value(&base, &index)
            }
            Expr::Call {
                target,
                function,
                args,
            } => self.eval_call(span, target.as_deref(), function, args, env),
            Expr::Struct { type_name, fields } => self.eval_struct(type_name, fields, env),
            Expr::Has { expr: base, field } => {
                let base = self.eval(base, env)?;
                match &base {
                    Value::Map(map) => Ok(Value::Bool(map.contains_key(&MapKey::from(field.as_str())))),
                    Value::Message(msg) => Ok(Value::Bool(msg.fields().contains(field))),
                    other => Err(EvalError::type_mismatch("map or message", &other.kind()).into()),
                }
            }
            Expr::Comprehension {
                iter_var,
                iter_range,
                accu_var,
                accu_init,
                loop_condition,
                loop_step,
                result,
            } => {
                let range = self.eval(iter_range, env)?;
                let items: Vec<Value> = match &range {
                    Value::List(list) => list.to_vec(),
                    Value::Map(map) => map.keys().map(MapKey::to_value).collect(),
                    other => {
                        return Err(EvalError::type_mismatch("list or map", &other.kind()).into())
                    }
                };
                let accu = self.eval(accu_init, env)?;

                let mut scope = env.fork();
                scope.add(accu_var.as_str(), accu);
                self.accumulators.push((accu_var.clone(), None));
                let out = self.fold(items, iter_var, accu_var, loop_condition, loop_step, &mut scope);
                let out = out.and_then(|()| self.eval(result, &scope));
                self.accumulators.pop();
                out
            }
        }
    }

    /// Runs the loop of a comprehension whose accumulator is bound in `scope`.
    ///
    /// A failed step leaves the error in the accumulator. The loop goes on
    /// while the condition fails too, so a later step such as `false && __result__`
    /// can still settle the result.
    fn fold(
        &mut self,
        items: Vec<Value>,
        iter_var: &str,
        accu_var: &str,
        loop_condition: &SpannedExpr,
        loop_step: &SpannedExpr,
        scope: &mut Environment,
    ) -> Result<()> {
        for item in items {
            scope.add(iter_var, item);
            match self.eval(loop_condition, scope) {
                Ok(Value::Bool(true)) => {}
                Ok(Value::Bool(false)) => break,
                Ok(other) => {
                    return Err(EvalError::type_mismatch("bool", &other.kind())
                        .with_span(loop_condition.span.clone())
                        .into())
                }
                Err(_) if self.accumulator_failed() => {}
                Err(err) => return Err(err),
            }
            let failure = match self.eval(loop_step, scope) {
                Ok(next) => {
                    scope.add(accu_var, next);
                    None
                }
                Err(err) => Some(err),
            };
            if let Some((_, slot)) = self.accumulators.last_mut() {
                *slot = failure;
            }
        }
        Ok(())
    }

    fn accumulator_failed(&self) -> bool {
        matches!(self.accumulators.last(), Some((_, Some(_))))
    }

    fn track(&mut self, out: Dispatched) -> Value {
        self.idempotent &= out.idempotent;
        out.value
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        span: &Span,
        operand: &SpannedExpr,
        env: &Environment,
    ) -> Result<Value> {
        let value = self.eval(operand, env)?;
        let out = self.runtime.operators().dispatch_unary(op, span, &value)?;
        Ok(self.track(out))
    }

    /// `&&` when `is_and`, `||` otherwise.
    fn eval_logical(
        &mut self,
        is_and: bool,
        span: &Span,
        left: &SpannedExpr,
        right: &SpannedExpr,
        env: &Environment,
    ) -> Result<Value> {
        let op = if is_and { BinaryOp::And } else { BinaryOp::Or };
        // The value that settles the result on its own.
        let absorbing = !is_and;

        let left = self.eval(left, env);
        if let Ok(Value::Bool(b)) = &left {
            if *b == absorbing {
                return Ok(Value::Bool(absorbing));
            }
        }

        let right = self.eval(right, env);
        if let Ok(Value::Bool(b)) = &right {
            if *b == absorbing {
                return Ok(Value::Bool(absorbing));
            }
        }

        match (left, right) {
            (Ok(left), Ok(right)) => {
                let out = self
                    .runtime
                    .operators()
                    .dispatch_binary(op, span, &left, &right)?;
                Ok(self.track(out))
            }
            (Err(err), _) => Err(err),
            (Ok(left), Err(err)) => match left {
                Value::Bool(_) => Err(err),
                other => Err(EvalError::no_matching_operator(op.symbol(), &[other.kind()])
                    .with_span(span.clone())
                    .into()),
            },
        }
    }

    fn eval_call(
        &mut self,
        span: &Span,
        target: Option<&SpannedExpr>,
        function: &str,
        args: &[SpannedExpr],
        env: &Environment,
    ) -> Result<Value> {
        let mut values = Vec::with_capacity(args.len() + usize::from(target.is_some()));
        if let Some(target) = target {
            values.push(self.eval(target, env)?);
        }
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        let out = self.runtime.functions().call(function, span, &values)?;
        Ok(self.track(out))
    }

    fn eval_map(&mut self, entries: &[MapEntry], env: &Environment) -> Result<Value> {
        let mut map = ValueMap::new();
        for entry in entries {
            let key = self.eval(&entry.key, env)?;
            let value = self.eval(&entry.value, env)?;
            let Some(map_key) = MapKey::from_value(&key) else {
                return Err(EvalError::type_mismatch("bool, int, uint or string", &key.kind())
                    .with_span(entry.key.span.clone())
                    .into());
            };
            if map.lookup(&key).is_some() {
                return Err(EvalError::invalid_argument(format!("duplicate map key: {}", map_key))
                    .with_span(entry.key.span.clone())
                    .into());
            }
            map.insert(map_key, value);
        }
        Ok(Value::Map(map.into()))
    }

    fn eval_struct(
        &mut self,
        type_name: &str,
        fields: &[StructField],
        env: &Environment,
    ) -> Result<Value> {
        let Some(message_type) = self.runtime.message_type(type_name).cloned() else {
            return Err(EvalError::unknown_type(type_name).into());
        };
        let mut values = MessageFields::new();
        for field in fields {
            let value = self.eval(&field.value, env)?;
            if values.insert(field.name.as_str(), value).is_some() {
                return Err(EvalError::invalid_message_fields(
                    type_name,
                    format!("duplicate field '{}'", field.name),
                )
                .with_span(field.value.span.clone())
                .into());
            }
        }
        message_type
            .construct(&values)
            .map_err(|e| EvalError::invalid_message_fields(message_type.type_name(), e).into())
    }
}

fn select_field(base: &Value, field: &str) -> Result<Value> {
    match base {
        Value::Map(map) => map
            .get(&MapKey::from(field))
            .cloned()
            .ok_or_else(|| EvalError::key_not_found(field).into()),
        Value::Message(msg) => msg
            .field(field)
            .cloned()
            .ok_or_else(|| EvalError::field_not_found(msg.type_name(), field).into()),
        other => Err(EvalError::type_mismatch("map or message", &other.kind()).into()),
    }
}

fn index_value(base: &Value, index: &Value) -> Result<Value> {
    match base {
        Value::List(list) => {
            let position = match index {
                Value::Int(i) => usize::try_from(*i).ok(),
                Value::UInt(u) => u.to_usize(),
                other => return Err(EvalError::type_mismatch("int or uint", &other.kind()).into()),
            };
            position
                .and_then(|i| list.get(i))
                .cloned()
                .ok_or_else(|| EvalError::index_out_of_bounds(index, list.len()).into())
        }
        Value::Map(map) => match index.kind() {
            Kind::Bool | Kind::Int | Kind::UInt | Kind::Double | Kind::String => map
                .lookup(index)
                .cloned()
                .ok_or_else(|| EvalError::key_not_found(index).into()),
            other => Err(EvalError::type_mismatch("bool, int, uint, double or string", &other).into()),
        },
        other => Err(EvalError::type_mismatch("list or map", &other.kind()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, EvalErrorKind};
    use crate::ext::ClockExtension;
    use crate::RuntimeBuilder;
    use cel_runtime_ast::AstBuilder;
    use pretty_assertions::assert_eq;

    fn run(expr: &SpannedExpr, env: &Environment) -> Result<Value> {
        Runtime::standard().unwrap().interpreter().run(expr, env)
    }

    fn kind_of(err: Error) -> EvalErrorKind {
        err.as_eval().map(|e| e.kind).unwrap()
    }

    #[test]
    fn test_identifiers_and_arithmetic() {
        let b = AstBuilder::new();
        let expr = b.binary(BinaryOp::Mul, b.ident("x"), b.int(3));
        let env = Environment::new().with("x", 7i64);
        assert_eq!(run(&expr, &env).unwrap(), Value::Int(21));
    }

    #[test]
    fn test_unbound_identifier() {
        let b = AstBuilder::new();
        let expr = b.ident("missing").at(4..11);
        let err = run(&expr, &Environment::new()).unwrap_err();
        let eval = err.as_eval().unwrap();
        assert_eq!(eval.kind, EvalErrorKind::UnknownIdentifier);
        assert_eq!(eval.span, Some(4..11));
    }

    #[test]
    fn test_and_short_circuits_on_false() {
        let b = AstBuilder::new();
        let boom = b.binary(BinaryOp::Div, b.int(1), b.int(0));
        let expr = b.binary(BinaryOp::And, b.bool(false), boom);
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_and_error_absorbed_by_false_right() {
        let b = AstBuilder::new();
        let expr = b.binary(BinaryOp::And, b.ident("nope"), b.bool(false));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(false));

        let expr = b.binary(BinaryOp::And, b.ident("nope"), b.bool(true));
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::UnknownIdentifier);
    }

    #[test]
    fn test_or_is_the_dual() {
        let b = AstBuilder::new();
        let expr = b.binary(BinaryOp::Or, b.bool(true), b.ident("nope"));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(true));

        let expr = b.binary(BinaryOp::Or, b.ident("nope"), b.bool(true));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(true));

        let expr = b.binary(BinaryOp::Or, b.bool(false), b.bool(false));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_logical_operands_must_be_bool() {
        let b = AstBuilder::new();
        let expr = b.binary(BinaryOp::And, b.int(1), b.bool(true));
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::NoMatchingOverload);
    }

    #[test]
    fn test_ternary_evaluates_one_branch() {
        let b = AstBuilder::new();
        let expr = b.ternary(b.bool(true), b.string("yes"), b.ident("never"));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::string("yes"));

        let expr = b.ternary(b.int(0), b.int(1), b.int(2));
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::NoMatchingOverload);
    }

    #[test]
    fn test_list_and_map_access() {
        let b = AstBuilder::new();
        let list = b.list(vec![b.int(10), b.int(20)]);
        let expr = b.index(list.clone(), b.uint(1));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Int(20));

        let expr = b.index(list, b.int(-1));
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::IndexOutOfBounds);

        let map = b.map(vec![(b.string("a"), b.int(1)), (b.int(2), b.string("two"))]);
        let expr = b.member(map.clone(), "a");
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Int(1));

        let expr = b.index(map.clone(), b.float(2.0));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::string("two"));

        let expr = b.member(map, "b");
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::KeyNotFound);
    }

    #[test]
    fn test_map_literal_rejects_duplicates_and_bad_keys() {
        let b = AstBuilder::new();
        let expr = b.map(vec![(b.int(1), b.null()), (b.uint(1), b.null())]);
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::InvalidArgument);

        let expr = b.map(vec![(b.list(vec![]), b.null())]);
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_has_on_maps() {
        let b = AstBuilder::new();
        let map = b.map(vec![(b.string("a"), b.int(1))]);
        let expr = b.has(map.clone(), "a");
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(true));
        let expr = b.has(map, "z");
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_comprehension_macros() {
        let b = AstBuilder::new();
        let nums = || b.list(vec![b.int(1), b.int(2), b.int(3)]);
        let gt = |n| b.binary(BinaryOp::Gt, b.ident("x"), b.int(n));

        let env = Environment::new();
        assert_eq!(run(&b.all(nums(), "x", gt(0)), &env).unwrap(), Value::Bool(true));
        assert_eq!(run(&b.exists(nums(), "x", gt(2)), &env).unwrap(), Value::Bool(true));
        assert_eq!(run(&b.exists_one(nums(), "x", gt(1)), &env).unwrap(), Value::Bool(false));

        let doubled = b.map_macro(nums(), "x", b.binary(BinaryOp::Mul, b.ident("x"), b.int(2)));
        assert_eq!(
            run(&doubled, &env).unwrap(),
            Value::list(vec![Value::Int(2), Value::Int(4), Value::Int(6)])
        );

        let filtered = b.filter(nums(), "x", gt(1));
        assert_eq!(
            run(&filtered, &env).unwrap(),
            Value::list(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_comprehension_scope_does_not_leak() {
        let b = AstBuilder::new();
        let env = Environment::new().with("x", "outer");
        let expr = b.list(vec![
            b.all(b.list(vec![b.int(1)]), "x", b.bool(true)),
            b.ident("x"),
        ]);
        assert_eq!(
            run(&expr, &env).unwrap(),
            Value::list(vec![Value::Bool(true), Value::string("outer")])
        );
    }

    #[test]
    fn test_comprehension_step_errors_can_be_absorbed() {
        let b = AstBuilder::new();
        let env = Environment::new();
        let list = |items: &[i64]| b.list(items.iter().map(|i| b.int(*i)).collect());
        let positive_ratio = || {
            b.binary(
                BinaryOp::Gt,
                b.binary(BinaryOp::Div, b.int(10), b.ident("x")),
                b.int(0),
            )
        };

        let all = b.all(list(&[0, -1]), "x", positive_ratio());
        assert_eq!(run(&all, &env).unwrap(), Value::Bool(false));

        let all = b.all(list(&[0, 1]), "x", positive_ratio());
        assert_eq!(kind_of(run(&all, &env).unwrap_err()), EvalErrorKind::DivisionByZero);

        let exists = b.exists(list(&[0, 1]), "x", positive_ratio());
        assert_eq!(run(&exists, &env).unwrap(), Value::Bool(true));

        let mapped = b.map_macro(list(&[0, 1]), "x", b.binary(BinaryOp::Div, b.int(10), b.ident("x")));
        assert_eq!(kind_of(run(&mapped, &env).unwrap_err()), EvalErrorKind::DivisionByZero);
    }

    #[test]
    fn test_comprehension_over_map_keys() {
        let b = AstBuilder::new();
        let map = b.map(vec![(b.string("a"), b.int(1)), (b.string("b"), b.int(2))]);
        let expr = b.exists(map, "k", b.binary(BinaryOp::Eq, b.ident("k"), b.string("b")));
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_recursion_limit() {
        let b = AstBuilder::new();
        let mut expr = b.int(0);
        for _ in 0..10 {
            expr = b.unary(UnaryOp::Neg, expr);
        }
        let mut interpreter = Runtime::standard()
            .unwrap()
            .interpreter()
            .with_options(InterpreterOptions { max_depth: 5 });
        let err = interpreter.run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::RecursionLimit);
        assert_eq!(interpreter.state(), State::Idle);

        let shallow = b.unary(UnaryOp::Neg, b.int(1));
        assert_eq!(
            interpreter.run(&shallow, &Environment::new()).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_idempotency_tracking_across_runs() {
        let runtime = RuntimeBuilder::new()
            .with_standard_library()
            .with_extension(ClockExtension)
            .build()
            .unwrap();
        let b = AstBuilder::new();
        let mut interpreter = runtime.interpreter();

        interpreter
            .run(&b.call("now", vec![]), &Environment::new())
            .unwrap();
        assert!(!interpreter.was_idempotent());

        interpreter
            .run(&b.binary(BinaryOp::Add, b.int(1), b.int(2)), &Environment::new())
            .unwrap();
        assert!(interpreter.was_idempotent());
    }

    #[test]
    fn test_call_passes_target_first() {
        let b = AstBuilder::new();
        let expr = b.method(b.string("hello"), "startsWith", vec![b.string("he")]);
        assert_eq!(run(&expr, &Environment::new()).unwrap(), Value::Bool(true));

        let expr = b.call("nope", vec![]);
        let err = run(&expr, &Environment::new()).unwrap_err();
        assert_eq!(kind_of(err), EvalErrorKind::UnknownFunction);
    }
}
