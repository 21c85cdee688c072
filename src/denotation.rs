use std::collections::HashMap;
use std::fmt;

use crate::execute::ExecutionError;
use crate::rules::RuleId;
use crate::value::Value;

/// Interned denotation key. Equal keys always get the same id, for the whole
/// parse request (both passes share one table).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DenotationId(pub u32);

/// What a chart entry is keyed by inside its cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DenotationKey {
  Value(Value),
  /// Every failure of the same rule over the same child denotations is the
  /// same failure, whatever formula produced it and whatever the message said.
  Error {
    rule: RuleId,
    child1: Option<DenotationId>,
    child2: Option<DenotationId>,
  },
}

impl DenotationKey {
  pub fn is_error(&self) -> bool {
    matches!(self, Self::Error { .. })
  }

  pub fn value(&self) -> Option<&Value> {
    match self {
      Self::Value(v) => Some(v),
      Self::Error { .. } => None,
    }
  }
}

impl fmt::Display for DenotationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Value(v) => write!(f, "{}", v),
      Self::Error {
        rule,
        child1,
        child2,
      } => {
        write!(f, "error(rule {}", rule.0)?;
        for c in child1.iter().chain(child2.iter()) {
          write!(f, ", #{}", c.0)?;
        }
        write!(f, ")")
      }
    }
  }
}

/// Interns denotation keys for one parse request
#[derive(Debug, Default, Clone)]
pub struct DenotationTable {
  ids: HashMap<DenotationKey, DenotationId>,
  keys: Vec<DenotationKey>,
}

impl DenotationTable {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn intern(&mut self, key: DenotationKey) -> DenotationId {
    if let Some(id) = self.ids.get(&key) {
      return *id;
    }
    let id = DenotationId(self.keys.len() as u32);
    self.keys.push(key.clone());
    self.ids.insert(key, id);
    id
  }

  /// Maps an execution outcome to its denotation id. Successful values are
  /// keyed by the value itself; failures only by `(rule, child1, child2)`.
  pub fn canonicalize(
    &mut self,
    outcome: &Result<Value, ExecutionError>,
    rule: RuleId,
    child1: Option<DenotationId>,
    child2: Option<DenotationId>,
  ) -> DenotationId {
    let key = match outcome {
      Ok(v) => DenotationKey::Value(v.clone()),
      Err(_) => DenotationKey::Error {
        rule,
        child1,
        child2,
      },
    };
    self.intern(key)
  }

  /// Get a key. Assumes valid, panics on ids from another table
  pub fn key(&self, id: DenotationId) -> &DenotationKey {
    self.keys.get(id.0 as usize).expect("Invalid DenotationId")
  }

  pub fn get(&self, key: &DenotationKey) -> Option<DenotationId> {
    self.ids.get(key).copied()
  }

  pub fn is_error(&self, id: DenotationId) -> bool {
    self.key(id).is_error()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fail(msg: &str) -> Result<Value, ExecutionError> {
    Err(ExecutionError::new(msg))
  }

  #[test]
  fn test_values_are_idempotent() {
    let mut table = DenotationTable::new();
    let a = table.canonicalize(&Ok(Value::Number(10)), RuleId(0), None, None);
    let b = table.canonicalize(&Ok(Value::Number(10)), RuleId(7), Some(a), None);
    assert_eq!(a, b);
    assert_eq!(table.key(a), &DenotationKey::Value(Value::Number(10)));

    let c = table.canonicalize(&Ok(Value::Number(11)), RuleId(0), None, None);
    assert_ne!(a, c);
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn test_errors_collapse_by_cause() {
    let mut table = DenotationTable::new();
    let five = table.canonicalize(&Ok(Value::Number(5)), RuleId(0), None, None);
    let zero = table.canonicalize(&Ok(Value::Number(0)), RuleId(0), None, None);

    // two different formulas failing in the same rule over the same children
    let e1 = table.canonicalize(&fail("/: division by zero"), RuleId(3), Some(five), Some(zero));
    let e2 = table.canonicalize(&fail("overflow"), RuleId(3), Some(five), Some(zero));
    assert_eq!(e1, e2);
    assert!(table.is_error(e1));

    // different rule, or different children, is a different failure
    let e3 = table.canonicalize(&fail("/: division by zero"), RuleId(4), Some(five), Some(zero));
    let e4 = table.canonicalize(&fail("/: division by zero"), RuleId(3), Some(zero), Some(five));
    let e5 = table.canonicalize(&fail("/: division by zero"), RuleId(3), Some(five), None);
    assert_ne!(e1, e3);
    assert_ne!(e1, e4);
    assert_ne!(e1, e5);
    assert_eq!(table.len(), 6);
  }
}
