//! Drives a parse request through its passes: an oracle-finding first pass, a
//! provenance closure over what reached the target, and a second pass
//! restricted to that closure.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info_span};

use crate::builder::{PassOutput, build_chart};
use crate::cell::Cell;
use crate::chart::{BackPointer, Ingredient};
use crate::closure::provenance_closure;
use crate::config::ParserConfig;
use crate::denotation::DenotationTable;
use crate::derivation::Derivation;
use crate::engine::Pass;
use crate::error::Result;
use crate::evaluate::{ExactMatchEvaluator, ValueEvaluator};
use crate::example::Example;
use crate::execute::{CallExecutor, Executor};
use crate::grammar::Grammar;
use crate::prune::DerivationPruner;
use crate::rules::CategoryId;
use crate::score::{Params, Scorer};
use crate::stats::{ParseStats, PassStats};
use crate::supervisor::run_with_deadline;
use crate::value::Value;

/// The collaborators a parser calls out to
#[derive(Clone)]
pub struct Services {
  pub executor: Arc<dyn Executor>,
  pub evaluator: Arc<dyn ValueEvaluator>,
  pub pruner: Arc<DerivationPruner>,
  pub scorer: Arc<dyn Scorer>,
}

impl Services {
  /// The builtin executor and evaluator, the configured pruning strategies,
  /// and `scorer`
  pub fn from_config(config: &ParserConfig, scorer: Arc<dyn Scorer>) -> Result<Self> {
    Ok(Self {
      executor: Arc::new(CallExecutor),
      evaluator: Arc::new(ExactMatchEvaluator),
      pruner: Arc::new(DerivationPruner::from_names(config.pruning_strategies.as_slice())?),
      scorer,
    })
  }
}

impl fmt::Debug for Services {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Services")
      .field("pruner", &self.pruner)
      .finish_non_exhaustive()
  }
}

/// Read-only state shared by every pass worker of every request
pub(crate) struct ParserCore {
  pub grammar: Arc<Grammar>,
  pub config: ParserConfig,
  pub executor: Arc<dyn Executor>,
  pub evaluator: Arc<dyn ValueEvaluator>,
  pub pruner: Arc<DerivationPruner>,
  pub scorer: Arc<dyn Scorer>,
  /// deepest useful floating depth per category, see
  /// [`Grammar::floating_depth_bounds`]
  pub depth_bounds: HashMap<CategoryId, usize>,
}

/// What a parse request produced
#[derive(Debug)]
pub struct ParseResult {
  /// Root derivations of the second pass, then of the backoff parse if any
  pub candidates: Vec<Arc<Derivation>>,
  pub state: Pass,
  pub stats: ParseStats,
  /// `None` when the first pass didn't run and everything was allowed
  pub allowed_ingredients: Option<Arc<HashSet<Ingredient>>>,
  /// The second pass's chart, unless its worker had to be abandoned
  pub second_pass: Option<PassOutput>,
}

impl ParseResult {
  /// Highest-scoring candidate, the earliest one on ties
  pub fn best(&self) -> Option<&Arc<Derivation>> {
    self
      .candidates
      .iter()
      .reduce(|best, d| if d.score > best.score { d } else { best })
  }
}

/// A two-pass parser for one grammar and configuration. Cheap to clone, and
/// safe to share between threads.
#[derive(Clone)]
pub struct Parser {
  core: Arc<ParserCore>,
}

impl Parser {
  pub fn new(grammar: Arc<Grammar>, config: ParserConfig, services: Services) -> Result<Self> {
    config.validate(&services.pruner)?;
    let depth_bounds = grammar.floating_depth_bounds(config.max_depth);
    debug!(
      rules = grammar.rules().len(),
      categories = grammar.num_categories(),
      floating_categories = depth_bounds.len(),
      "parser ready"
    );

    Ok(Self {
      core: Arc::new(ParserCore {
        grammar,
        config,
        executor: services.executor,
        evaluator: services.evaluator,
        pruner: services.pruner,
        scorer: services.scorer,
        depth_bounds,
      }),
    })
  }

  /// A parser with the builtin services, ranking with `params`
  pub fn with_params(grammar: Arc<Grammar>, config: ParserConfig, params: Params) -> Result<Self> {
    let services = Services::from_config(&config, Arc::new(params))?;
    Self::new(grammar, config, services)
  }

  pub fn grammar(&self) -> &Grammar {
    &self.core.grammar
  }

  pub fn config(&self) -> &ParserConfig {
    &self.core.config
  }

  #[cfg(test)]
  pub(crate) fn core(&self) -> &ParserCore {
    &self.core
  }

  /// How well a derivation's value answers `target`; 0 for failed executions
  pub fn compatibility(&self, target: &Value, deriv: &Derivation) -> f64 {
    deriv
      .value()
      .map_or(0.0, |v| self.core.evaluator.compatibility(target, v))
  }

  /// Parses one example. The first pass only runs with a target value, and
  /// only when expected counts are wanted (or `cheat` is set).
  pub fn parse(&self, ex: &Example, compute_expected_counts: bool) -> Result<ParseResult> {
    let config = &self.core.config;
    let span = info_span!("parse", example = %ex.id);
    let _enter = span.enter();

    let ex = Arc::new(ex.clone());
    let mut stats = ParseStats::default();

    let run_first = !config.ignore_first_pass
      && ex.target_value.is_some()
      && (compute_expected_counts || config.cheat);

    let (table, allowed) = if run_first {
      let (table, allowed) = self.find_oracle(&ex, &span, &mut stats)?;
      (table, Some(Arc::new(allowed)))
    } else {
      (DenotationTable::new(), None)
    };

    let (second, second_stats) =
      self.run_pass("second", Pass::Second, &ex, &span, table, allowed.clone())?;
    stats.second = second_stats;
    let mut candidates = second
      .as_ref()
      .map(|out| self.root_derivations(out, ex.num_tokens()))
      .unwrap_or_default();

    if config.use_backoff {
      let (backoff, backoff_stats) =
        self.run_pass("backoff", Pass::Second, &ex, &span, DenotationTable::new(), None)?;
      stats.backoff = Some(backoff_stats);
      if let Some(out) = backoff {
        candidates.extend(self.root_derivations(&out, ex.num_tokens()));
      }
      candidates.shuffle(&mut StdRng::seed_from_u64(config.shuffle_seed));
    }

    stats.candidates = candidates.len();
    debug!(candidates = candidates.len(), timed_out = stats.timed_out(), "parse done");

    Ok(ParseResult {
      candidates,
      state: Pass::Done,
      stats,
      allowed_ingredients: allowed,
      second_pass: second,
    })
  }

  /// Runs the first pass and closes over every root entry that matches the
  /// target. Hands back the first pass's denotation table so the second pass
  /// keys its entries the same way.
  fn find_oracle(
    &self,
    ex: &Arc<Example>,
    span: &tracing::Span,
    stats: &mut ParseStats,
  ) -> Result<(DenotationTable, HashSet<Ingredient>)> {
    let (first, first_stats) =
      self.run_pass("first", Pass::First, ex, span, DenotationTable::new(), None)?;
    stats.first = Some(first_stats);

    let (Some(out), Some(target)) = (first, ex.target_value.as_ref()) else {
      return Ok((DenotationTable::new(), HashSet::new()));
    };

    let roots = self.oracle_roots(&out, ex.num_tokens(), target);
    let allowed = provenance_closure(&out.chart, roots.iter().copied())?;
    debug!(roots = roots.len(), allowed = allowed.len(), "provenance closure");
    stats.oracle_roots = roots.len();
    stats.allowed_ingredients = allowed.len();

    Ok((out.table, allowed))
  }

  /// Runs one chart-building pass on a supervised worker. The output is
  /// `None` only if the worker ignored cancellation and was abandoned.
  fn run_pass(
    &self,
    label: &'static str,
    pass: Pass,
    ex: &Arc<Example>,
    parent: &tracing::Span,
    table: DenotationTable,
    allowed: Option<Arc<HashSet<Ingredient>>>,
  ) -> Result<(Option<PassOutput>, PassStats)> {
    let config = &self.core.config;
    let core = self.core.clone();
    let ex = ex.clone();
    let parent = parent.clone();

    let supervised = run_with_deadline(label, config.deadline(), config.grace(), move |cancel| {
      let span = info_span!(parent: &parent, "pass", pass = label);
      let _enter = span.enter();
      build_chart(&core, &ex, pass, table, allowed.as_deref(), &cancel)
    })?;

    let mut output = supervised.output;
    let stats = match output.as_mut() {
      Some(out) => {
        out.stats.timed_out = supervised.timed_out;
        out.stats.clone()
      }
      None => PassStats {
        timed_out: true,
        abandoned: true,
        ..Default::default()
      },
    };
    if stats.timed_out {
      debug!(pass = label, abandoned = stats.abandoned, "pass timed out");
    }

    Ok((output, stats))
  }

  /// The full-span anchored root cell, then the floating root cell of every
  /// depth
  fn root_cells(&self, num_tokens: usize) -> Vec<Cell> {
    let root = self.core.grammar.root();
    let anchored = (num_tokens > 0).then(|| Cell::anchored(root, 0, num_tokens));
    anchored
      .into_iter()
      .chain((0..=self.core.config.max_depth).map(|d| Cell::floating(root, d)))
      .collect()
  }

  fn root_derivations(&self, out: &PassOutput, num_tokens: usize) -> Vec<Arc<Derivation>> {
    self
      .root_cells(num_tokens)
      .into_iter()
      .flat_map(|cell| out.chart.derivations(cell).cloned())
      .collect()
  }

  fn oracle_roots(&self, out: &PassOutput, num_tokens: usize, target: &Value) -> Vec<BackPointer> {
    let evaluator = &self.core.evaluator;
    let mut roots = Vec::new();
    for cell in self.root_cells(num_tokens) {
      for meta in out.chart.entries(cell) {
        let matches = out
          .table
          .key(meta.denotation)
          .value()
          .is_some_and(|v| evaluator.compatibility(target, v) == 1.0);
        if matches {
          roots.push(BackPointer::new(cell, meta.denotation));
        }
      }
    }
    roots
  }
}

impl fmt::Debug for Parser {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Parser")
      .field("config", &self.core.config)
      .finish_non_exhaustive()
  }
}
