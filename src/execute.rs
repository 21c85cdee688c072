use thiserror::Error;

use crate::example::Example;
use crate::formula::Formula;
use crate::value::Value;

/// A formula failed to execute. Never propagated out of the parser: the chart
/// folds it into a canonical error denotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

impl ExecutionError {
  pub fn new(msg: impl Into<String>) -> Self {
    Self(msg.into())
  }
}

/// Runs a formula against whatever world the example lives in. Must be a pure
/// function of `(formula, example)`; the parser may call it from a worker thread.
pub trait Executor: Send + Sync {
  fn execute(&self, formula: &Formula, ex: &Example) -> Result<Value, ExecutionError>;
}

/// Evaluates calls to a fixed set of arithmetic and list builtins.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallExecutor;

impl CallExecutor {
  pub fn new() -> Self {
    Self
  }

  /// Numeric arguments, either given directly or as a single list argument
  fn numbers(name: &str, args: &[Value]) -> Result<Vec<i64>, ExecutionError> {
    let args = match args {
      [Value::List(vs)] => vs.as_slice(),
      _ => args,
    };
    args
      .iter()
      .map(|v| {
        v.number().ok_or_else(|| {
          ExecutionError::new(format!("{}: expected number, got {} {}", name, v.type_name(), v))
        })
      })
      .collect()
  }

  fn fold(
    name: &str,
    args: &[Value],
    f: impl Fn(i64, i64) -> Option<i64>,
  ) -> Result<Value, ExecutionError> {
    let ns = Self::numbers(name, args)?;
    let (first, rest) = ns
      .split_first()
      .ok_or_else(|| ExecutionError::new(format!("{}: no arguments", name)))?;
    rest
      .iter()
      .try_fold(*first, |acc, n| f(acc, *n))
      .map(Value::Number)
      .ok_or_else(|| ExecutionError::new(format!("{}: arithmetic overflow", name)))
  }

  fn apply(&self, name: &str, args: Vec<Value>) -> Result<Value, ExecutionError> {
    match name {
      "+" => Self::fold(name, &args, i64::checked_add),
      "*" => Self::fold(name, &args, i64::checked_mul),
      "-" => match Self::numbers(name, &args)?.as_slice() {
        [n] => n
          .checked_neg()
          .map(Value::Number)
          .ok_or_else(|| ExecutionError::new("-: arithmetic overflow")),
        [a, b] => a
          .checked_sub(*b)
          .map(Value::Number)
          .ok_or_else(|| ExecutionError::new("-: arithmetic overflow")),
        ns => Err(ExecutionError::new(format!("-: expected 1 or 2 arguments, got {}", ns.len()))),
      },
      "/" => match Self::numbers(name, &args)?.as_slice() {
        [_, 0] => Err(ExecutionError::new("/: division by zero")),
        [a, b] => a
          .checked_div(*b)
          .map(Value::Number)
          .ok_or_else(|| ExecutionError::new("/: arithmetic overflow")),
        ns => Err(ExecutionError::new(format!("/: expected 2 arguments, got {}", ns.len()))),
      },
      "max" => Self::fold(name, &args, |a, b| Some(a.max(b))),
      "min" => Self::fold(name, &args, |a, b| Some(a.min(b))),
      "count" => match args.as_slice() {
        [Value::List(vs)] => Ok(Value::Number(vs.len() as i64)),
        [v] => Err(ExecutionError::new(format!("count: expected list, got {}", v.type_name()))),
        _ => Err(ExecutionError::new(format!("count: expected 1 argument, got {}", args.len()))),
      },
      "list" => Ok(Value::List(args)),
      "=" => match args.as_slice() {
        [a, b] => Ok(Value::Bool(a == b)),
        _ => Err(ExecutionError::new(format!("=: expected 2 arguments, got {}", args.len()))),
      },
      _ => Err(ExecutionError::new(format!("unknown function {}", name))),
    }
  }
}

impl Executor for CallExecutor {
  fn execute(&self, formula: &Formula, ex: &Example) -> Result<Value, ExecutionError> {
    match formula {
      Formula::Value(v) => Ok(v.clone()),
      Formula::Call(name, args) => {
        let args = args
          .iter()
          .map(|a| self.execute(a, ex))
          .collect::<Result<Vec<_>, _>>()?;
        self.apply(name, args)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(f: &Formula) -> Result<Value, ExecutionError> {
    CallExecutor::new().execute(f, &Example::new("test", "five"))
  }

  #[test]
  fn test_arithmetic() {
    let f = Formula::call(
      "+",
      vec![Formula::number(5), Formula::call("*", vec![Formula::number(2), Formula::number(3)])],
    );
    assert_eq!(run(&f), Ok(Value::Number(11)));

    let f = Formula::call("-", vec![Formula::number(5)]);
    assert_eq!(run(&f), Ok(Value::Number(-5)));

    let list = Formula::call("list", vec![Formula::number(4), Formula::number(9)]);
    assert_eq!(run(&Formula::call("max", vec![list.clone()])), Ok(Value::Number(9)));
    assert_eq!(run(&Formula::call("count", vec![list])), Ok(Value::Number(2)));
  }

  #[test]
  fn test_errors() {
    let f = Formula::call("/", vec![Formula::number(5), Formula::number(0)]);
    assert_eq!(run(&f), Err(ExecutionError::new("/: division by zero")));

    let f = Formula::call("+", vec![Formula::number(5), Formula::Value(Value::Bool(true))]);
    assert!(run(&f).is_err());

    let f = Formula::call("frobnicate", vec![]);
    assert_eq!(run(&f), Err(ExecutionError::new("unknown function frobnicate")));

    let f = Formula::call("*", vec![Formula::number(i64::MAX), Formula::number(2)]);
    assert!(run(&f).is_err());
  }
}
