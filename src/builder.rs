//! Fills a chart bottom-up: anchored cells by increasing span length, then
//! floating cells by increasing depth.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::cell::Cell;
use crate::chart::{Chart, Ingredient};
use crate::denotation::DenotationTable;
use crate::engine::{Child, Pass, RuleApplier};
use crate::example::Example;
use crate::parser::ParserCore;
use crate::rules::{Production, Rule};
use crate::stats::PassStats;
use crate::supervisor::CancellationToken;

/// A finished (or cancelled) pass: its chart, the denotation table it added
/// to, and what it cost
#[derive(Debug)]
pub struct PassOutput {
  pub chart: Chart,
  pub table: DenotationTable,
  pub stats: PassStats,
}

/// Builds the whole chart for one pass. `table` carries denotation ids over
/// from an earlier pass of the same request; `allowed` gates the second pass.
pub fn build_chart(
  core: &ParserCore,
  ex: &Example,
  pass: Pass,
  table: DenotationTable,
  allowed: Option<&HashSet<Ingredient>>,
  cancel: &CancellationToken,
) -> PassOutput {
  let start = Instant::now();

  let mut engine = RuleApplier::new(core, ex, pass, table, allowed, cancel);
  build_anchored(&mut engine);
  build_floating(&mut engine);

  let (chart, table, mut stats) = engine.finish();
  stats.elapsed = start.elapsed();
  debug!(%stats, "chart built");

  PassOutput { chart, table, stats }
}

/// Applies `rule` once per child, stopping early if the pass was cancelled
fn apply_each(engine: &mut RuleApplier, rule: &Arc<Rule>, target: Cell, children: Vec<Child>) {
  for child in children {
    if engine.apply(rule, target, &[child]).is_break() {
      return;
    }
  }
}

/// Applies `rule` to every pair of children, stopping early if the pass was
/// cancelled
fn apply_pairs(
  engine: &mut RuleApplier,
  rule: &Arc<Rule>,
  target: Cell,
  lefts: Vec<Child>,
  rights: Vec<Child>,
) -> ControlFlow<()> {
  if rights.is_empty() {
    return ControlFlow::Continue(());
  }
  for left in lefts {
    for right in rights.iter() {
      if engine.apply(rule, target, &[left.clone(), right.clone()]).is_break() {
        return ControlFlow::Break(());
      }
    }
  }
  ControlFlow::Continue(())
}

fn build_anchored(engine: &mut RuleApplier) {
  let grammar = &engine.core().grammar;
  let ex = engine.example();
  let n = ex.num_tokens();

  for len in 1..=n {
    for start in 0..=(n - len) {
      let end = start + len;

      if len == 1 {
        for rule in grammar.lexical_rules(&ex.tokens[start]) {
          let _ = engine.apply(rule, Cell::anchored(rule.lhs(), start, end), &[]);
        }
      }

      for mid in (start + 1)..end {
        build_split(engine, start, mid, end);
      }

      for rule in grammar.unary_promotions() {
        let Some(child_cat) = rule.child_categories().next() else {
          continue;
        };
        let children = engine.children(Cell::anchored(child_cat, start, end));
        apply_each(engine, rule, Cell::anchored(rule.lhs(), start, end), children);
      }
    }
    engine.prune_touched();
    trace!(len, entries = engine.chart().num_entries(), "spans finished");
  }
}

/// Binary anchored rules over `[start, mid)` and `[mid, end)`. Token sides must
/// match a single input token exactly.
fn build_split(engine: &mut RuleApplier, start: usize, mid: usize, end: usize) {
  let grammar = &engine.core().grammar;
  let tokens = &engine.example().tokens;
  let left_token = |t: &str| mid == start + 1 && tokens[start] == t;
  let right_token = |t: &str| end == mid + 1 && tokens[mid] == t;

  for rule in grammar.anchored_binary_rules() {
    let target = Cell::anchored(rule.lhs(), start, end);
    match (&rule.productions[0], &rule.productions[1]) {
      (Production::Terminal(a), Production::Terminal(b)) => {
        if left_token(a.as_str()) && right_token(b.as_str()) {
          let _ = engine.apply(rule, target, &[]);
        }
      }
      (Production::Terminal(a), Production::Nonterminal(right)) => {
        if left_token(a.as_str()) {
          let children = engine.children(Cell::anchored(right.id, mid, end));
          apply_each(engine, rule, target, children);
        }
      }
      (Production::Nonterminal(left), Production::Terminal(b)) => {
        if right_token(b.as_str()) {
          let children = engine.children(Cell::anchored(left.id, start, mid));
          apply_each(engine, rule, target, children);
        }
      }
      (Production::Nonterminal(left), Production::Nonterminal(right)) => {
        let rights = engine.children(Cell::anchored(right.id, mid, end));
        let lefts = engine.children(Cell::anchored(left.id, start, mid));
        let _ = apply_pairs(engine, rule, target, lefts, rights);
      }
    }
  }
}

/// Depth pairs `(left, right)` a binary floating rule at `depth` reads from.
/// By depth, the deeper child sits at exactly `depth - 1`; by size, the
/// children's sizes add up to `depth - 1`.
pub fn child_depth_pairs(depth: usize, by_size: bool) -> Vec<(usize, usize)> {
  if depth == 0 {
    return vec![];
  }
  let below = depth - 1;
  if by_size {
    (0..=below).map(|left| (left, below - left)).collect()
  } else {
    (0..=below)
      .map(|right| (below, right))
      .chain((0..below).map(|left| (left, below)))
      .collect()
  }
}

fn build_floating(engine: &mut RuleApplier) {
  let core = engine.core();
  let grammar = &core.grammar;
  let config = &core.config;
  // a rule is only worth applying at depths from which it can still reach a
  // floating root
  let useful = |rule: &Rule, depth: usize| {
    core
      .depth_bounds
      .get(&rule.lhs())
      .is_some_and(|&bound| depth <= bound)
  };

  for depth in 0..=config.max_depth {
    if engine.chart().num_entries() > config.max_num_cell_denotations {
      warn!(
        depth,
        entries = engine.chart().num_entries(),
        limit = config.max_num_cell_denotations,
        "chart too large, stopping floating construction"
      );
      engine.stats_mut().hit_chart_ceiling = true;
      break;
    }
    if engine.is_cancelled() {
      debug!(depth, "cancelled, only root rules still apply");
    }

    if depth == 0 {
      for rule in grammar.floating_nullary_rules() {
        if useful(rule, 0) {
          let _ = engine.apply(rule, Cell::floating(rule.lhs(), 0), &[]);
        }
      }
    } else {
      for rule in grammar.floating_unary_rules() {
        if !useful(rule, depth) {
          continue;
        }
        let Some(child_cat) = rule.child_categories().next() else {
          continue;
        };
        let children = engine.children(Cell::floating(child_cat, depth - 1));
        apply_each(engine, rule, Cell::floating(rule.lhs(), depth), children);
      }

      for rule in grammar.floating_binary_rules() {
        if !useful(rule, depth) {
          continue;
        }
        let mut cats = rule.child_categories();
        let (Some(left_cat), Some(right_cat)) = (cats.next(), cats.next()) else {
          continue;
        };
        let target = Cell::floating(rule.lhs(), depth);
        let by_size = config.use_size_instead_of_depth;
        for (left_depth, right_depth) in child_depth_pairs(depth, by_size) {
          let rights = engine.children(Cell::floating(right_cat, right_depth));
          let lefts = engine.children(Cell::floating(left_cat, left_depth));
          if apply_pairs(engine, rule, target, lefts, rights).is_break() {
            break;
          }
        }
      }
    }

    engine.prune_touched();
    trace!(depth, entries = engine.chart().num_entries(), "depth finished");
  }
}
