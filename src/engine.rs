//! Applies one rule to concrete children and files the results in the chart.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::cell::Cell;
use crate::chart::{BackPointer, Chart, Ingredient, Retention};
use crate::denotation::{DenotationId, DenotationTable};
use crate::derivation::Derivation;
use crate::example::Example;
use crate::parser::ParserCore;
use crate::rules::Rule;
use crate::semantics::Callable;
use crate::stats::PassStats;
use crate::supervisor::CancellationToken;

/// Which pass a parse request is in
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Pass {
  /// Find every way of reaching the target denotation, one witness per entry
  First,
  /// Re-parse restricted to what the first pass found, with the full beam
  Second,
  Done,
}

impl Pass {
  pub fn name(&self) -> &'static str {
    match self {
      Self::First => "first",
      Self::Second => "second",
      Self::Done => "done",
    }
  }
}

impl fmt::Display for Pass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// A chart entry's derivation, offered as a child to a rule
#[derive(Debug, Clone)]
pub struct Child {
  pub cell: Cell,
  pub denotation: DenotationId,
  pub deriv: Arc<Derivation>,
}

impl Child {
  fn back_pointer(&self) -> BackPointer {
    BackPointer::new(self.cell, self.denotation)
  }
}

/// Owns the chart of one pass while it's being built
pub struct RuleApplier<'a> {
  core: &'a ParserCore,
  ex: &'a Example,
  pass: Pass,
  /// `None` means every ingredient is allowed
  allowed: Option<&'a HashSet<Ingredient>>,
  cancel: &'a CancellationToken,
  chart: Chart,
  table: DenotationTable,
  touched: HashSet<Cell>,
  stats: PassStats,
}

impl<'a> RuleApplier<'a> {
  pub fn new(
    core: &'a ParserCore,
    ex: &'a Example,
    pass: Pass,
    table: DenotationTable,
    allowed: Option<&'a HashSet<Ingredient>>,
    cancel: &'a CancellationToken,
  ) -> Self {
    Self {
      core,
      ex,
      pass,
      allowed,
      cancel,
      chart: Chart::new(),
      table,
      touched: HashSet::new(),
      stats: PassStats::default(),
    }
  }

  pub fn core(&self) -> &'a ParserCore {
    self.core
  }

  pub fn example(&self) -> &'a Example {
    self.ex
  }

  pub fn chart(&self) -> &Chart {
    &self.chart
  }

  pub fn stats_mut(&mut self) -> &mut PassStats {
    &mut self.stats
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Every derivation of every visible entry in a cell, with its provenance key
  pub fn children(&self, cell: Cell) -> Vec<Child> {
    self
      .chart
      .entries(cell)
      .flat_map(|m| {
        m.derivations.iter().map(move |d| Child {
          cell,
          denotation: m.denotation,
          deriv: d.clone(),
        })
      })
      .collect()
  }

  fn is_allowed(&self, ingredient: &Ingredient) -> bool {
    self.pass == Pass::First || self.allowed.is_none_or(|a| a.contains(ingredient))
  }

  fn retention(&self) -> Retention {
    match self.pass {
      Pass::First => Retention::Representative,
      _ => Retention::All,
    }
  }

  /// Applies `rule` to `children`, putting whatever survives into `target`.
  /// Breaks only when the pass has been cancelled and `target` isn't a root
  /// cell; rejections and pruning just continue.
  pub fn apply(&mut self, rule: &Arc<Rule>, target: Cell, children: &[Child]) -> ControlFlow<()> {
    let core = self.core;
    let config = &core.config;

    if target.category() != core.grammar.root() && self.cancel.is_cancelled() {
      return ControlFlow::Break(());
    }
    self.stats.rule_applications += 1;

    let ingredient = Ingredient {
      cell: target,
      rule: rule.id,
      child1: children.first().map(|c| c.denotation),
      child2: children.get(1).map(|c| c.denotation),
    };

    if self.pass != Pass::First {
      if !self.is_allowed(&ingredient) {
        self.stats.disallowed += 1;
        return ControlFlow::Continue(());
      }
      if let (Some(limit), [a, b]) = (config.max_anchor_overlap, children) {
        if a.deriv.anchor_overlap(&b.deriv) > limit {
          self.stats.anchor_overlaps += 1;
          return ControlFlow::Continue(());
        }
      }
    }

    let back_pointers = children.iter().map(Child::back_pointer).collect::<Vec<_>>();
    let children_single_formula = back_pointers
      .iter()
      .all(|bp| self.chart.is_single_formula(*bp));

    // While looking for the oracle, only formula-independent strategies may
    // prune, unless there's just one formula to lose anyway.
    let prune_only = match self.pass {
      Pass::First
        if !(config.aggressive_single_formula_pruning && children_single_formula) =>
      {
        Some(config.first_pass_pruners.as_slice())
      }
      _ => None,
    };

    let callable = Callable {
      rule: rule.clone(),
      span: target.span(),
      children: children.iter().map(|c| c.deriv.clone()).collect(),
    };

    for mut deriv in rule.sem.call(self.ex, &callable) {
      let outcome = core.executor.execute(&deriv.formula, self.ex);
      let denotation =
        self
          .table
          .canonicalize(&outcome, rule.id, ingredient.child1, ingredient.child2);
      deriv.value = Some(outcome);

      if core.pruner.is_pruned(self.ex, &deriv, prune_only) {
        self.stats.pruned += 1;
        continue;
      }
      if self.pass != Pass::First {
        deriv.score = core.scorer.score(&deriv);
      }

      self.add_to_chart(
        target,
        denotation,
        Arc::new(deriv),
        ingredient,
        &back_pointers,
        children_single_formula,
      );
    }

    ControlFlow::Continue(())
  }

  fn add_to_chart(
    &mut self,
    cell: Cell,
    denotation: DenotationId,
    deriv: Arc<Derivation>,
    ingredient: Ingredient,
    back_pointers: &[BackPointer],
    children_single_formula: bool,
  ) {
    let retention = self.retention();
    self.chart.add(
      cell,
      denotation,
      deriv.clone(),
      ingredient,
      back_pointers,
      children_single_formula,
      retention,
    );
    self.touched.insert(cell);

    // anchored results are what floating rules start from
    let grammar = &self.core.grammar;
    let cat = cell.category();
    if !cell.is_anchored() || cat == grammar.root() || !grammar.is_floating_child(cat) {
      return;
    }

    let lifted = Cell::floating(cat, 0);
    let lift = Ingredient {
      cell: lifted,
      ..ingredient
    };
    if !self.is_allowed(&lift) {
      self.stats.disallowed += 1;
      return;
    }
    let bp = BackPointer::new(cell, denotation);
    let single = self.chart.is_single_formula(bp);
    self.chart.add(lifted, denotation, deriv, lift, &[bp], single, retention);
    self.touched.insert(lifted);
  }

  /// Applies the pass's beam to every cell touched since the last call
  pub fn prune_touched(&mut self) {
    let config = &self.core.config;
    for cell in self.touched.drain() {
      match self.pass {
        Pass::First => {
          if let Some(k) = config.first_pass_beam_size {
            self.stats.beam_dropped += self.chart.truncate_denotations(cell, k);
          }
        }
        _ => {
          self.stats.beam_dropped += self.chart.prune_derivations(cell, config.beam_size);
        }
      }
    }
  }

  /// Hands over the chart, the denotation table and the counters
  pub fn finish(mut self) -> (Chart, DenotationTable, PassStats) {
    self.prune_touched();

    let mut stats = self.stats;
    stats.cells = self.chart.num_cells();
    for meta in self.chart.all_entries().filter(|m| !m.hidden) {
      stats.denotations += 1;
      stats.derivations += meta.derivations.len();
      if self.table.is_error(meta.denotation) {
        stats.error_denotations += 1;
      }
    }

    (self.chart, self.table, stats)
  }
}
