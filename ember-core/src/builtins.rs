//! Host functions installed as the default global bindings.
//!
//! Operators are ordinary bindings: `a + b` parses to a call of the
//! function bound to `+`, so embedders can replace any of them.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use num_traits::Zero;

use crate::environment::Environment;
use crate::error::EvalError;
use crate::evaluator::CallContext;
use crate::value::Value;

pub type BuiltinFn = fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value, EvalError>;

/// Number of arguments a builtin accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, given: usize) -> bool {
        match self {
            Arity::Exact(n) => given == n,
            Arity::Between(min, max) => (min..=max).contains(&given),
            Arity::AtLeast(min) => given >= min,
        }
    }
}

/// Metadata about a single builtin binding.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub arity: Arity,
    pub func: BuiltinFn,
}

/// Every builtin bound by [`standard_environment`].
pub const BUILTINS: &[BuiltinDescriptor] = &[
    builtin("print", Arity::AtLeast(0), print),
    builtin("+", Arity::Exact(2), add),
    builtin("-", Arity::Exact(2), sub),
    builtin("*", Arity::Exact(2), mul),
    builtin("/", Arity::Exact(2), div),
    builtin("<", Arity::Exact(2), lt),
    builtin("<=", Arity::Exact(2), le),
    builtin(">", Arity::Exact(2), gt),
    builtin(">=", Arity::Exact(2), ge),
    builtin("==", Arity::Exact(2), eq),
    builtin("!=", Arity::Exact(2), ne),
    builtin("if", Arity::Between(2, 3), if_),
    builtin("push", Arity::AtLeast(2), push),
    builtin("pop", Arity::Exact(1), pop),
    builtin("get", Arity::Exact(2), get),
    builtin("set", Arity::Exact(3), set),
    builtin("each", Arity::Exact(2), each),
    builtin("range", Arity::Between(1, 2), range),
    builtin("len", Arity::Exact(1), len),
    builtin("object", Arity::Exact(0), object),
    builtin("keys", Arity::Exact(1), keys),
];

const fn builtin(name: &'static str, arity: Arity, func: BuiltinFn) -> BuiltinDescriptor {
    BuiltinDescriptor { name, arity, func }
}

pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// A fresh frame holding every builtin.
pub fn standard_environment() -> Environment {
    let env = Environment::new();
    install(&env);
    env
}

/// Bind every builtin into `env`, replacing same-named bindings.
pub fn install(env: &Environment) {
    for descriptor in BUILTINS {
        env.set(descriptor.name, host_value(*descriptor));
    }
}

/// Wrap a descriptor as a callable value that checks its arity first.
pub fn host_value(descriptor: BuiltinDescriptor) -> Value {
    Value::host(descriptor.name, move |ctx, args| {
        expect_arity(ctx, &descriptor, args.len())?;
        (descriptor.func)(ctx, args)
    })
}

fn expect_arity(ctx: &CallContext<'_>, descriptor: &BuiltinDescriptor, given: usize) -> Result<(), EvalError> {
    if descriptor.arity.accepts(given) {
        return Ok(());
    }
    let expected = match descriptor.arity {
        Arity::Exact(n) => format!("{n}"),
        Arity::Between(min, max) => format!("{min} to {max}"),
        Arity::AtLeast(min) => format!("at least {min}"),
    };
    Err(ctx.error(format!(
        "`{}` expects {expected} arguments but received {given}",
        descriptor.name
    )))
}

// ---------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------

fn print(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(ctx.output(), "{line}").map_err(|err| ctx.error(format!("print failed: {err}")))?;
    Ok(Value::Nothing)
}

// ---------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
        }
    }
}

fn add(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        return Ok(Value::string(format!("{left}{right}")));
    }
    arithmetic(ctx, Arith::Add, &left, &right)
}

fn sub(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    arithmetic(ctx, Arith::Sub, &left, &right)
}

fn mul(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    arithmetic(ctx, Arith::Mul, &left, &right)
}

fn div(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    arithmetic(ctx, Arith::Div, &left, &right)
}

/// Integers stay exact (promoting to `BigInt` on overflow); any float
/// operand makes the result a float.
fn arithmetic(ctx: &CallContext<'_>, op: Arith, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let checked = match op {
            Arith::Add => a.checked_add(*b),
            Arith::Sub => a.checked_sub(*b),
            Arith::Mul => a.checked_mul(*b),
            Arith::Div if *b == 0 => return Err(ctx.error("division by zero")),
            Arith::Div => a.checked_div(*b),
        };
        if let Some(value) = checked {
            return Ok(Value::Int(value));
        }
    }

    if let (Some(a), Some(b)) = (left.as_bigint(), right.as_bigint()) {
        let value = match op {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div if b.is_zero() => return Err(ctx.error("division by zero")),
            Arith::Div => a / b,
        };
        return Ok(Value::from_bigint(value));
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Float(match op {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div => a / b,
        })),
        _ => Err(ctx.error(format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------

fn lt(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    compare(ctx, "<", args, Ordering::is_lt)
}

fn le(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    compare(ctx, "<=", args, Ordering::is_le)
}

fn gt(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    compare(ctx, ">", args, Ordering::is_gt)
}

fn ge(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    compare(ctx, ">=", args, Ordering::is_ge)
}

fn eq(_ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    Ok(Value::Bool(left.equals(&right)))
}

fn ne(_ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    Ok(Value::Bool(!left.equals(&right)))
}

fn compare(
    ctx: &CallContext<'_>,
    name: &str,
    args: Vec<Value>,
    predicate: impl FnOnce(Ordering) -> bool,
) -> Result<Value, EvalError> {
    let (left, right) = pair(args);
    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Float(_), _) | (_, Value::Float(_)) => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(incomparable(ctx, name, &left, &right)),
        },
        _ => match (left.as_bigint(), right.as_bigint()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => return Err(incomparable(ctx, name, &left, &right)),
        },
    };
    // NaN compares false under every operator.
    Ok(Value::Bool(ordering.is_some_and(predicate)))
}

fn incomparable(ctx: &CallContext<'_>, name: &str, left: &Value, right: &Value) -> EvalError {
    ctx.error(format!(
        "cannot compare {} and {} with `{name}`",
        left.type_name(),
        right.type_name()
    ))
}

// ---------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------

/// `if(cond, then, else?)`: calls exactly one branch with no arguments.
fn if_(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let mut args = args.into_iter();
    let cond = args.next().unwrap_or_default();
    let then = args.next().unwrap_or_default();
    let otherwise = args.next();
    if cond.is_truthy() {
        ctx.call(&then, Vec::new())
    } else if let Some(otherwise) = otherwise {
        ctx.call(&otherwise, Vec::new())
    } else {
        Ok(Value::Nothing)
    }
}

// ---------------------------------------------------------------------
// Arrays and objects
// ---------------------------------------------------------------------

type ArrayRef = Rc<RefCell<Vec<Value>>>;
type ObjectRef = Rc<RefCell<BTreeMap<String, Value>>>;

fn array_arg(ctx: &CallContext<'_>, name: &str, value: &Value) -> Result<ArrayRef, EvalError> {
    match value {
        Value::Array(items) => Ok(Rc::clone(items)),
        other => Err(ctx.error(format!(
            "`{name}` expects an array, found {}",
            other.type_name()
        ))),
    }
}

fn push(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let mut args = args.into_iter();
    let target = args.next().unwrap_or_default();
    let items = array_arg(ctx, "push", &target)?;
    let mut items = items.borrow_mut();
    items.extend(args);
    Ok(Value::Int(items.len() as i64))
}

fn pop(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg(ctx, "pop", &args[0])?;
    let last = items.borrow_mut().pop();
    Ok(last.unwrap_or_default())
}

/// `get(array, index)` or `get(object, key)`; absent entries are `nothing`.
fn get(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (container, key) = pair(args);
    match (&container, &key) {
        (Value::Array(items), Value::Int(index)) => Ok(usize::try_from(*index)
            .ok()
            .and_then(|i| items.borrow().get(i).cloned())
            .unwrap_or_default()),
        (Value::Object(entries), Value::Str(key)) => {
            Ok(entries.borrow().get(key.as_ref()).cloned().unwrap_or_default())
        }
        _ => Err(ctx.error(format!(
            "cannot index {} with {}",
            container.type_name(),
            key.type_name()
        ))),
    }
}

/// `set(object, key, value)` or `set(array, index, value)` for an index
/// inside the array. Returns the stored value.
fn set(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let mut args = args.into_iter();
    let container = args.next().unwrap_or_default();
    let key = args.next().unwrap_or_default();
    let value = args.next().unwrap_or_default();
    match (&container, &key) {
        (Value::Object(entries), Value::Str(key)) => {
            entries.borrow_mut().insert(key.to_string(), value.clone());
        }
        (Value::Array(items), Value::Int(index)) => {
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = usize::try_from(*index)
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| ctx.error(format!("index {index} out of range for array of length {len}")))?;
            *slot = value.clone();
        }
        _ => {
            return Err(ctx.error(format!(
                "cannot index {} with {}",
                container.type_name(),
                key.type_name()
            )));
        }
    }
    Ok(value)
}

/// `each(array, f)` calls `f(item, index)` for every item present when
/// the call starts.
fn each(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let (target, func) = pair(args);
    let items = array_arg(ctx, "each", &target)?.borrow().clone();
    for (index, item) in items.into_iter().enumerate() {
        ctx.call(&func, vec![item, Value::Int(index as i64)])?;
    }
    Ok(Value::Nothing)
}

/// `range(end)` or `range(start, end)`: integers in `[start, end)`.
fn range(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let bounds: Vec<i64> = args
        .iter()
        .map(|arg| match arg {
            Value::Int(i) => Ok(*i),
            other => Err(ctx.error(format!(
                "`range` expects integer bounds, found {}",
                other.type_name()
            ))),
        })
        .collect::<Result<_, _>>()?;
    let (start, end) = match bounds.as_slice() {
        [end] => (0, *end),
        [start, end] => (*start, *end),
        _ => (0, 0),
    };
    Ok(Value::array((start..end).map(Value::Int).collect()))
}

fn len(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let n = match &args[0] {
        Value::Array(items) => items.borrow().len(),
        Value::Object(entries) => entries.borrow().len(),
        Value::Str(s) => s.chars().count(),
        other => {
            return Err(ctx.error(format!("`len` is not defined for {}", other.type_name())));
        }
    };
    Ok(Value::Int(n as i64))
}

fn object(_ctx: &mut CallContext<'_>, _args: Vec<Value>) -> Result<Value, EvalError> {
    Ok(Value::object(BTreeMap::new()))
}

fn object_arg(ctx: &CallContext<'_>, name: &str, value: &Value) -> Result<ObjectRef, EvalError> {
    match value {
        Value::Object(entries) => Ok(Rc::clone(entries)),
        other => Err(ctx.error(format!(
            "`{name}` expects an object, found {}",
            other.type_name()
        ))),
    }
}

fn keys(ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let entries = object_arg(ctx, "keys", &args[0])?;
    let keys = entries.borrow().keys().map(Value::string).collect();
    Ok(Value::array(keys))
}

/// First two arguments; callers have checked the arity.
fn pair(args: Vec<Value>) -> (Value, Value) {
    let mut args = args.into_iter();
    (args.next().unwrap_or_default(), args.next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::*;
    use crate::error::CoreError;
    use crate::interpreter::Interpreter;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn eval(text: &str) -> Result<Value, CoreError> {
        Interpreter::new().run_str("test", text, &standard_environment())
    }

    fn eval_str(text: &str) -> String {
        eval(text).expect("eval").to_string()
    }

    fn printed(text: &str) -> String {
        let out = Captured::default();
        Interpreter::new()
            .with_output(out.clone())
            .run_str("test", text, &standard_environment())
            .expect("run");
        let bytes = out.0.borrow().clone();
        String::from_utf8(bytes).expect("utf8")
    }

    #[test]
    fn every_builtin_is_installed() {
        let env = standard_environment();
        for descriptor in BUILTINS {
            assert!(env.lookup(descriptor.name).is_callable(), "{}", descriptor.name);
        }
        assert!(find_builtin("each").is_some());
        assert!(find_builtin("missing").is_none());
    }

    #[test]
    fn print_joins_arguments_with_spaces() {
        assert_eq!(printed("print(1, 'a', [true], 2.5); print();"), "1 a [true] 2.5\n\n");
    }

    #[test]
    fn integer_arithmetic_promotes_on_overflow() {
        assert_eq!(eval_str("9223372036854775807 + 1;"), "9223372036854775808");
        assert_eq!(eval_str("99999999999999999999 - 99999999999999999990;"), "9");
        assert!(matches!(
            eval("9223372036854775808 - 1;").expect("eval"),
            Value::Int(i64::MAX)
        ));
    }

    #[test]
    fn mixed_arithmetic_and_division() {
        assert_eq!(eval_str("7 / 2;"), "3");
        assert_eq!(eval_str("7.0 / 2;"), "3.5");
        assert_eq!(eval_str("1 + .5;"), "1.5");
        assert_eq!(eval_str("'n=' + 4;"), "n=4");
        assert_eq!(eval("1 / 0;").unwrap_err().to_string(), "division by zero");
        assert_eq!(
            eval("1 - 'a';").unwrap_err().to_string(),
            "cannot apply `-` to int and string"
        );
    }

    #[test]
    fn operators_chain_to_the_right() {
        assert_eq!(eval_str("10 - 4 - 3;"), "9");
        assert_eq!(eval_str("2 * 3 + 4;"), "14");
    }

    #[test]
    fn long_concatenation_chains_evaluate() {
        let text = format!("{};", vec!["'ab'"; 300].join(" + "));
        assert_eq!(eval_str(&text), "ab".repeat(300));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval_str("1 < 2;"), "true");
        assert_eq!(eval_str("2.5 >= 3;"), "false");
        assert_eq!(eval_str("'a' < 'b';"), "true");
        assert_eq!(eval_str("1 == 1.0;"), "true");
        assert_eq!(eval_str("'1' != 1;"), "true");
        assert_eq!(eval_str("99999999999999999999 > 1;"), "true");
        assert!(eval("[] < 1;").is_err());
    }

    #[test]
    fn if_calls_exactly_one_branch() {
        assert_eq!(
            printed("if(1 < 2, () => print('yes'), () => print('no'));"),
            "yes\n"
        );
        assert_eq!(printed("if(0, () => print('yes'), () => print('no'));"), "no\n");
        assert_eq!(eval_str("if(false, () => 1);"), "nothing");
    }

    #[test]
    fn arity_is_checked() {
        let err = eval("if(true);").unwrap_err();
        assert_eq!(err.to_string(), "`if` expects 2 to 3 arguments but received 1");
        assert_eq!(err.location().map(|l| l.text()), Some("if(true)"));
    }

    #[test]
    fn array_helpers() {
        assert_eq!(
            eval_str("xs = range(3); push(xs, 10, 11); xs;"),
            "[0, 1, 2, 10, 11]"
        );
        assert_eq!(eval_str("xs = [1, 2]; pop(xs); xs;"), "[1]");
        assert_eq!(eval_str("pop([]);"), "nothing");
        assert_eq!(eval_str("get([5, 6], 1);"), "6");
        assert_eq!(eval_str("get([5, 6], 9);"), "nothing");
        assert_eq!(eval_str("range(2, 5);"), "[2, 3, 4]");
        assert_eq!(eval_str("len(range(4));"), "4");
        assert_eq!(eval_str("xs = [1, 2]; set(xs, 0, 9); xs;"), "[9, 2]");
        assert!(eval("set([1], 3, 0);").is_err());
        assert!(eval("push(1, 2);").is_err());
    }

    #[test]
    fn each_passes_item_and_index() {
        assert_eq!(
            printed("each(['a', 'b'], (item, i) => print(i, item));"),
            "0 a\n1 b\n"
        );
    }

    #[test]
    fn each_commits_closure_locals_into_defining_scope() {
        let env = standard_environment();
        Interpreter::new()
            .run_str("test", "total = 0; each([1, 2, 3], (x) => { total = total + x; });", &env)
            .expect("run");
        assert!(env.lookup("total").equals(&Value::Int(6)));
    }

    #[test]
    fn object_helpers() {
        assert_eq!(
            eval_str("o = object(); set(o, 'b', 2); set(o, 'a', [1]); o;"),
            "{a: [1], b: 2}"
        );
        assert_eq!(eval_str("o = object(); set(o, 'k', 'v'); get(o, 'k');"), "v");
        assert_eq!(eval_str("get(object(), 'k');"), "nothing");
        assert_eq!(eval_str("o = object(); set(o, 'z', 1); set(o, 'y', 1); keys(o);"), r#"["y", "z"]"#);
        assert_eq!(eval_str("len('héllo');"), "5");
    }
}
