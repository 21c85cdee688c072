use std::fmt;

use crate::error::{Error, Result};
use crate::example::Example;
use crate::derivation::Derivation;

/// A heuristic for discarding derivations before they enter the chart
pub trait PruningStrategy: fmt::Debug + Send + Sync {
  fn name(&self) -> &str;

  /// Only called on executed derivations
  fn is_pruned(&self, ex: &Example, deriv: &Derivation) -> bool;
}

/// Prunes derivations that denote the empty list. This never depends on which
/// formula is chosen, so it's safe to apply while looking for the oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDenotation;

impl PruningStrategy for EmptyDenotation {
  fn name(&self) -> &str {
    "emptyDenotation"
  }

  fn is_pruned(&self, _ex: &Example, deriv: &Derivation) -> bool {
    deriv.value().is_some_and(|v| v.is_empty_list())
  }
}

/// Prunes calls with two formula-identical arguments, like `(+ x x)` or
/// `(and p p)`
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateArguments;

impl PruningStrategy for DuplicateArguments {
  fn name(&self) -> &str {
    "duplicateArguments"
  }

  fn is_pruned(&self, _ex: &Example, deriv: &Derivation) -> bool {
    let args = deriv.formula.args();
    args
      .iter()
      .enumerate()
      .any(|(i, a)| args[i + 1..].contains(a))
  }
}

/// An ordered set of pruning strategies
#[derive(Debug, Default)]
pub struct DerivationPruner {
  strategies: Vec<Box<dyn PruningStrategy>>,
}

impl DerivationPruner {
  pub fn new() -> Self {
    Default::default()
  }

  /// Strategy names this crate knows how to build
  pub const BUILTIN: [&'static str; 2] = ["emptyDenotation", "duplicateArguments"];

  fn builtin(name: &str) -> Option<Box<dyn PruningStrategy>> {
    match name {
      "emptyDenotation" => Some(Box::new(EmptyDenotation)),
      "duplicateArguments" => Some(Box::new(DuplicateArguments)),
      _ => None,
    }
  }

  /// Builds a pruner out of builtin strategies
  pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
    let mut pruner = Self::new();
    for name in names {
      let name = name.as_ref();
      let strategy = Self::builtin(name)
        .ok_or_else(|| Error::Config(format!("unknown pruning strategy {}", name)))?;
      pruner = pruner.with_strategy(strategy);
    }
    Ok(pruner)
  }

  pub fn with_strategy(mut self, strategy: Box<dyn PruningStrategy>) -> Self {
    self.strategies.push(strategy);
    self
  }

  pub fn has_strategy(&self, name: &str) -> bool {
    self.strategies.iter().any(|s| s.name() == name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.strategies.iter().map(|s| s.name())
  }

  /// Runs every strategy, or only the ones named in `only`
  pub fn is_pruned(&self, ex: &Example, deriv: &Derivation, only: Option<&[String]>) -> bool {
    self
      .strategies
      .iter()
      .filter(|s| only.is_none_or(|names| names.iter().any(|n| n == s.name())))
      .any(|s| s.is_pruned(ex, deriv))
  }
}
