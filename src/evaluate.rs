use crate::value::Value;

/// How well a predicted value answers the target, in `[0, 1]`. Only an exact
/// `1.0` counts as reaching the oracle.
pub trait ValueEvaluator: Send + Sync {
  fn compatibility(&self, target: &Value, pred: &Value) -> f64;
}

/// 1 for equal values, 0 otherwise. A singleton list matches its element.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatchEvaluator;

impl ValueEvaluator for ExactMatchEvaluator {
  fn compatibility(&self, target: &Value, pred: &Value) -> f64 {
    let unwrap = |v: &Value| match v {
      Value::List(vs) if vs.len() == 1 => vs[0].clone(),
      _ => v.clone(),
    };
    if target == pred || unwrap(target) == unwrap(pred) {
      1.0
    } else {
      0.0
    }
  }
}

#[test]
fn test_exact_match() {
  let e = ExactMatchEvaluator;
  assert_eq!(e.compatibility(&Value::Number(10), &Value::Number(10)), 1.0);
  assert_eq!(e.compatibility(&Value::Number(10), &Value::Number(11)), 0.0);
  assert_eq!(
    e.compatibility(&Value::List(vec![Value::Number(10)]), &Value::Number(10)),
    1.0
  );
  assert_eq!(
    e.compatibility(
      &Value::List(vec![Value::Number(1), Value::Number(2)]),
      &Value::Number(1)
    ),
    0.0
  );
}
