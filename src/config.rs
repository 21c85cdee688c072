use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::prune::DerivationPruner;

/// Parser options. Every field has a default, so config files only need to
/// mention what they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
  /// Deepest floating cell that gets built
  pub max_depth: usize,
  /// Derivations kept per (cell, denotation) in the second pass
  pub beam_size: usize,
  /// Denotations kept per cell in the first pass
  pub first_pass_beam_size: Option<usize>,
  /// Floating construction stops once the chart holds more entries than this
  pub max_num_cell_denotations: usize,
  /// Deadline for each pass
  pub max_parsing_time_seconds: u64,
  /// Binary floating children have depths summing to `d - 1`, instead of the
  /// deeper one being at exactly `d - 1`
  pub use_size_instead_of_depth: bool,
  pub ignore_first_pass: bool,
  /// Run the first pass even when not computing expected counts, as long as
  /// the example has a target value
  pub cheat: bool,
  /// Merge in candidates from a plain single-pass beam parse
  pub use_backoff: bool,
  /// In the first pass, apply every pruning strategy to derivations whose
  /// children are all unambiguous
  pub aggressive_single_formula_pruning: bool,
  pub pruning_strategies: Vec<String>,
  /// Strategies that are safe to apply while searching for the oracle
  pub first_pass_pruners: Vec<String>,
  /// Second pass only: most token positions two children may share
  pub max_anchor_overlap: Option<usize>,
  pub shuffle_seed: u64,
  /// How long to wait for a worker to notice it was cancelled
  pub cancellation_grace_millis: u64,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      max_depth: 4,
      beam_size: 200,
      first_pass_beam_size: None,
      max_num_cell_denotations: 100_000,
      max_parsing_time_seconds: 60,
      use_size_instead_of_depth: false,
      ignore_first_pass: false,
      cheat: false,
      use_backoff: false,
      aggressive_single_formula_pruning: true,
      pruning_strategies: vec!["emptyDenotation".to_string()],
      first_pass_pruners: vec!["emptyDenotation".to_string()],
      max_anchor_overlap: None,
      shuffle_seed: 1,
      cancellation_grace_millis: 1000,
    }
  }
}

impl ParserConfig {
  pub fn deadline(&self) -> Duration {
    Duration::from_secs(self.max_parsing_time_seconds)
  }

  pub fn grace(&self) -> Duration {
    Duration::from_millis(self.cancellation_grace_millis)
  }

  /// Checks the options against each other and against the pruner the parser
  /// will run with
  pub fn validate(&self, pruner: &DerivationPruner) -> Result<()> {
    if self.beam_size == 0 {
      return Err(Error::Config("beam_size must be positive".into()));
    }
    if self.first_pass_beam_size == Some(0) {
      return Err(Error::Config("first_pass_beam_size must be positive".into()));
    }
    if self.max_parsing_time_seconds == 0 {
      return Err(Error::Config("max_parsing_time_seconds must be positive".into()));
    }
    for name in self.first_pass_pruners.iter() {
      if !pruner.has_strategy(name) {
        return Err(Error::Config(format!(
          "first pass pruner {} is not one of the active strategies",
          name
        )));
      }
    }
    Ok(())
  }
}
