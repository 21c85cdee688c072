use std::fmt;

use crate::value::Value;

/// A minimal logical form: constants, and named function applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
  Value(Value),
  Call(String, Vec<Formula>),
}

impl Formula {
  pub fn number(n: i64) -> Self {
    Self::Value(Value::Number(n))
  }

  pub fn call(name: impl Into<String>, args: Vec<Formula>) -> Self {
    Self::Call(name.into(), args)
  }

  pub fn args(&self) -> &[Formula] {
    match self {
      Self::Call(_, args) => args,
      Self::Value(_) => &[],
    }
  }

  /// Number of nodes in the formula tree
  pub fn size(&self) -> usize {
    1 + self.args().iter().map(Formula::size).sum::<usize>()
  }
}

impl From<Value> for Formula {
  fn from(v: Value) -> Self {
    Self::Value(v)
  }
}

impl fmt::Display for Formula {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Value(v) => write!(f, "{}", v),
      Self::Call(name, args) => {
        write!(f, "({}", name)?;
        for a in args.iter() {
          write!(f, " {}", a)?;
        }
        write!(f, ")")
      }
    }
  }
}

#[test]
fn test_formula_display() {
  let f = Formula::call("+", vec![Formula::number(5), Formula::call("max", vec![])]);
  assert_eq!(f.to_string(), "(+ 5 (max))");
  assert_eq!(f.size(), 3);
}
