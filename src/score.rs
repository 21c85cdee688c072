use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::derivation::Derivation;
use crate::error::{Error, Result};

/// Ranks derivations inside the beam. Never sees or changes learning state
/// beyond what it was built with.
pub trait Scorer: Send + Sync {
  fn score(&self, deriv: &Derivation) -> f64;
}

/// Linear model over sparse features. A derivation's features are its own rule
/// plus everything its children contributed, so its score is the sum of the
/// children's scores and the weight of its rule.
#[derive(Debug, Default, Clone)]
pub struct Params {
  weights: HashMap<String, f64>,
}

impl Params {
  pub fn new() -> Self {
    Default::default()
  }

  /// `rule=` followed by the rule as written in a grammar file
  pub fn rule_feature(deriv: &Derivation) -> String {
    format!("rule={}", deriv.rule)
  }

  pub fn weight(&self, feature: &str) -> f64 {
    self.weights.get(feature).copied().unwrap_or(0.0)
  }

  pub fn set_weight(&mut self, feature: impl Into<String>, weight: f64) {
    self.weights.insert(feature.into(), weight);
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }

  /// Reads `feature<TAB>weight` lines. Blank lines and `#` comments are skipped.
  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
    fs::read_to_string(path)?.parse()
  }
}

impl std::str::FromStr for Params {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let mut params = Self::new();
    for (lineno, line) in s.lines().enumerate() {
      let line = line.trim_end();
      if line.trim().is_empty() || line.starts_with('#') {
        continue;
      }
      let (feature, weight) = line.rsplit_once('\t').ok_or_else(|| {
        Error::Config(format!("params line {}: expected feature<TAB>weight", lineno + 1))
      })?;
      let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::Config(format!("params line {}: {}", lineno + 1, e)))?;
      params.set_weight(feature, weight);
    }
    Ok(params)
  }
}

impl Scorer for Params {
  fn score(&self, deriv: &Derivation) -> f64 {
    deriv.children.iter().map(|c| c.score).sum::<f64>() + self.weight(&Self::rule_feature(deriv))
  }
}

#[test]
fn test_params() {
  use crate::derivation::Span;
  use crate::formula::Formula;
  use crate::grammar::Grammar;
  use std::sync::Arc;

  let g: Grammar = r#"
    $Num -> five => const 5;
    $ROOT -> $Num => identity;
  "#
  .parse()
  .unwrap();

  let params: Params = concat!(
    "# weights\n",
    "rule=$Num -> five => const 5\t0.5\n",
    "rule=$ROOT -> $Num => identity\t-2\n",
  )
  .parse()
  .unwrap();
  assert_eq!(params.len(), 2);

  let mut num = Derivation::new(
    g.rules()[0].clone(),
    Span::Anchored { start: 0, end: 1 },
    Formula::number(5),
    vec![],
  );
  num.score = params.score(&num);
  assert_eq!(num.score, 0.5);

  let root = Derivation::new(
    g.rules()[1].clone(),
    Span::Anchored { start: 0, end: 1 },
    Formula::number(5),
    vec![Arc::new(num)],
  );
  assert_eq!(params.score(&root), -1.5);

  assert!("rule=x 1.0".parse::<Params>().is_err());
}
