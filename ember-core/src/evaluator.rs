//! Tree-walking evaluator.
//!
//! Calling a closure runs its body in a working copy of the captured frame
//! (see [`crate::environment::Transaction`]). A normal return commits the
//! working frame back onto the captured frame, so parameters and locals
//! become visible where the function was *defined*. An error drops the
//! working frame and leaves the captured frame untouched.

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use crate::ast::{Node, NodeKind};
use crate::environment::Environment;
use crate::error::{CoreError, EvalError};
use crate::interpreter::Interpreter;
use crate::span::Location;
use crate::value::{Closure, Value};

/// Name of the call form that evaluates another file in the caller's scope.
pub const INCLUDE: &str = "include";

/// What a host function sees of the call it is serving.
pub struct CallContext<'a> {
    interpreter: &'a mut Interpreter,
    location: &'a Location,
}

impl CallContext<'_> {
    /// Location of the calling node.
    pub fn location(&self) -> &Location {
        self.location
    }

    /// An error anchored at the calling node.
    pub fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::new(message, self.location.clone())
    }

    /// Invoke a callable value, e.g. a thunk passed to `if`.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        self.interpreter.call(callee, args, self.location)
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.interpreter.output()
    }
}

/// Evaluate `node` against `env` with a default interpreter.
pub fn evaluate(node: &Node, env: &Environment) -> Result<Value, EvalError> {
    Interpreter::new().evaluate(node, env)
}

impl Interpreter {
    pub fn evaluate(&mut self, node: &Node, env: &Environment) -> Result<Value, EvalError> {
        match &node.kind {
            NodeKind::Comment(_) => Ok(Value::Nothing),
            NodeKind::Literal(literal) => Ok(Value::from_literal(literal)),
            NodeKind::Identifier(name) => Ok(env.lookup(name)),
            NodeKind::Assignment { name, value } => {
                let value = self.evaluate(value, env)?;
                env.set(name.clone(), value.clone());
                Ok(value)
            }
            NodeKind::Block(body) => self.evaluate(body, env),
            NodeKind::StatementList(statements) => {
                let mut last = Value::Nothing;
                for statement in statements {
                    last = self.evaluate(statement, env)?;
                }
                Ok(last)
            }
            NodeKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item, env)?);
                }
                Ok(Value::array(values))
            }
            NodeKind::Function(def) => Ok(Value::Closure(Rc::new(Closure {
                def: Rc::clone(def),
                env: env.clone(),
                location: node.location.clone(),
            }))),
            NodeKind::Call { callee, args } if callee == INCLUDE => self.include(node, args, env),
            NodeKind::Call { callee, args } => {
                let target = env.lookup(callee);
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg, env)?);
                }
                if !target.is_callable() {
                    return Err(not_callable(callee, &target, &node.location));
                }
                self.call(&target, values, &node.location)
            }
        }
    }

    /// Invoke any callable value on behalf of the node at `location`.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>, location: &Location) -> Result<Value, EvalError> {
        match callee {
            Value::Closure(closure) => self.call_closure(closure, args, location),
            Value::Host(host) => {
                let mut ctx = CallContext {
                    interpreter: self,
                    location,
                };
                (host.func)(&mut ctx, args)
            }
            other => Err(not_callable(&other.to_string(), other, location)),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>, location: &Location) -> Result<Value, EvalError> {
        let tx = closure.env.begin();
        let mut args = args.into_iter();
        for param in &closure.def.params {
            tx.working().set(param.clone(), args.next().unwrap_or_default());
        }

        let result = self.descend(location, |this| this.evaluate(&closure.def.body, tx.working()));
        match result {
            Ok(value) => {
                tx.commit();
                log::debug!("call at {location} committed");
                Ok(value)
            }
            Err(err) => {
                log::debug!("call at {location} rolled back: {}", err.message);
                Err(err)
            }
        }
    }

    /// `include(path)`: run another file in the caller's frame.
    fn include(&mut self, node: &Node, args: &[Node], env: &Environment) -> Result<Value, EvalError> {
        let [arg] = args else {
            return Err(EvalError::new(
                format!("{INCLUDE} expects one path argument, got {}", args.len()),
                node.location.clone(),
            ));
        };
        let path = match self.evaluate(arg, env)? {
            Value::Str(path) => path,
            other => {
                return Err(EvalError::new(
                    format!("{INCLUDE} path must be a string, found {}", other.type_name()),
                    arg.location.clone(),
                ));
            }
        };

        let result = match self.loader.load(&path) {
            Ok(source) => self.descend(&node.location, |this| {
                this.run(source, env)
                    .map_err(|err| wrap_include_error(&path, err, &node.location))
            }),
            Err(source) => Err(wrap_include_error(
                &path,
                CoreError::SourceIo {
                    path: PathBuf::from(&*path),
                    source,
                },
                &node.location,
            )),
        };
        if result.is_ok() {
            log::debug!("included {path} into {}", node.location);
        }
        result
    }

    /// Run `f` one call level deeper, failing once the configured call
    /// depth is reached.
    fn descend<T>(
        &mut self,
        location: &Location,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= self.options.max_call_depth {
            return Err(EvalError::new(
                format!("{DEPTH_EXCEEDED} ({})", self.options.max_call_depth),
                location.clone(),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

const DEPTH_EXCEEDED: &str = "maximum call depth exceeded";

fn not_callable(name: &str, value: &Value, location: &Location) -> EvalError {
    let message = if value.is_nothing() {
        format!("`{name}` is not a function (it has no value)")
    } else {
        format!("`{name}` is not a function (found {})", value.type_name())
    };
    EvalError::new(message, location.clone())
}

fn wrap_include_error(path: &str, cause: CoreError, location: &Location) -> EvalError {
    let message = match cause.location() {
        Some(at) => format!("failed to include \"{path}\": {cause} (at {at})"),
        None => format!("failed to include \"{path}\": {cause}"),
    };
    EvalError::new(message, location.clone()).with_cause(cause)
}
