//! Runtime values.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::ast::FunctionDef;
use crate::environment::Environment;
use crate::error::EvalError;
use crate::evaluator::CallContext;
use crate::lexer::Literal;
use crate::span::Location;

/// Signature of a host-provided function.
pub type HostFn = dyn Fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value, EvalError>;

#[derive(Clone, Default)]
pub enum Value {
    /// Result of looking up an unbound name, and of calls that return
    /// nothing.
    #[default]
    Nothing,
    Bool(bool),
    Int(i64),
    /// Only holds values outside the `i64` range; see [`Value::from_bigint`].
    BigInt(BigInt),
    Float(f64),
    Str(Rc<str>),
    /// Shared by reference: every holder sees mutations.
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Closure(Rc<Closure>),
    Host(Rc<HostFunction>),
}

/// A function value together with the frame it was defined in.
pub struct Closure {
    pub def: Rc<FunctionDef>,
    /// Captured frame, and the commit target of every call.
    pub env: Environment,
    pub location: Location,
}

pub struct HostFunction {
    pub name: String,
    pub func: Box<HostFn>,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        HostFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: BTreeMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn host(
        name: impl Into<String>,
        func: impl Fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value, EvalError> + 'static,
    ) -> Value {
        Value::Host(Rc::new(HostFunction::new(name, func)))
    }

    /// Integer value, narrowed to `Int` when it fits.
    pub fn from_bigint(value: BigInt) -> Value {
        match value.to_i64() {
            Some(small) => Value::Int(small),
            None => Value::BigInt(value),
        }
    }

    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::BigInt(i) => Value::from_bigint(i.clone()),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::string(s),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Closure(_) | Value::Host(_) => "function",
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Host(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nothing => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(i) => !i.is_zero(),
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Closure(_) | Value::Host(_) => true,
        }
    }

    /// `==` semantics: numeric across integer and float kinds, by value for
    /// scalars and strings, by identity for arrays, objects and functions.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Int(a), Value::BigInt(b)) | (Value::BigInt(b), Value::Int(a)) => {
                BigInt::from(*a) == *b
            }
            (Value::Float(a), other) | (other, Value::Float(a)) => {
                other.as_f64().is_some_and(|b| *a == b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::BigInt(i) => i.to_f64(),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Int(i) => Some(BigInt::from(*i)),
            Value::BigInt(i) => Some(i.clone()),
            _ => None,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, nested: bool, seen: &mut Vec<usize>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "nothing"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::BigInt(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) if nested => write!(f, "{s:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                let id = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&id) {
                    return write!(f, "[...]");
                }
                seen.push(id);
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write(f, true, seen)?;
                }
                seen.pop();
                write!(f, "]")
            }
            Value::Object(entries) => {
                let id = Rc::as_ptr(entries) as *const () as usize;
                if seen.contains(&id) {
                    return write!(f, "{{...}}");
                }
                seen.push(id);
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: ")?;
                    value.write(f, true, seen)?;
                }
                seen.pop();
                write!(f, "}}")
            }
            Value::Closure(c) => write!(f, "<function({})>", c.def.params.join(", ")),
            Value::Host(h) => write!(f, "<host {}>", h.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigints_narrow_when_they_fit() {
        assert!(matches!(Value::from_bigint(BigInt::from(7)), Value::Int(7)));
        let huge = BigInt::from(i64::MAX) + 1;
        assert!(matches!(Value::from_bigint(huge), Value::BigInt(_)));
    }

    #[test]
    fn truthiness() {
        for falsy in [
            Value::Nothing,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::Float(f64::NAN),
            Value::string(""),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
        }
        for truthy in [Value::Int(-1), Value::string("0"), Value::array(vec![])] {
            assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn equality_is_numeric_across_kinds_and_by_identity_for_arrays() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).equals(&Value::string("2")));
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
    }

    #[test]
    fn display_formats() {
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), Value::string("v"));
        let value = Value::array(vec![
            Value::Int(1),
            Value::Float(2.0),
            Value::Float(0.5),
            Value::string("s"),
            Value::Nothing,
            Value::object(entries),
        ]);
        assert_eq!(value.to_string(), r#"[1, 2.0, 0.5, "s", nothing, {k: "v"}]"#);
        assert_eq!(Value::string("raw").to_string(), "raw");
    }

    #[test]
    fn self_referencing_arrays_display_finitely() {
        let value = Value::array(vec![]);
        if let Value::Array(items) = &value {
            items.borrow_mut().push(value.clone());
        }
        assert_eq!(value.to_string(), "[[...]]");
    }
}
