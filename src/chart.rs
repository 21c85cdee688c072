//! The provenance store: per cell, one [`Metadata`] record per distinct
//! denotation, saying which derivations have it, and how it can be produced.
//!
//! Records live in an arena and refer to each other only through
//! [`BackPointer`] value keys, so the provenance graph can share
//! sub-results freely without any reference cycles.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cell::Cell;
use crate::denotation::DenotationId;
use crate::derivation::Derivation;
use crate::rules::RuleId;

/// One way to obtain a denotation in a cell: this rule, over children with
/// these denotations. Compared by value, never by derivation identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ingredient {
  pub cell: Cell,
  pub rule: RuleId,
  pub child1: Option<DenotationId>,
  pub child2: Option<DenotationId>,
}

/// Edge from a chart entry to a child entry it was built from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackPointer {
  pub cell: Cell,
  pub denotation: DenotationId,
}

impl BackPointer {
  pub fn new(cell: Cell, denotation: DenotationId) -> Self {
    Self { cell, denotation }
  }
}

/// Index type for the metadata arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MetaIdx(pub u32);

/// How many derivations an entry holds on to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Retention {
  /// The first derivation seen is a witness for the whole entry
  Representative,
  /// Keep everything; the beam prunes later
  All,
}

#[derive(Debug, Clone)]
pub struct Metadata {
  pub cell: Cell,
  pub denotation: DenotationId,
  pub ingredients: HashSet<Ingredient>,
  pub back_pointers: HashSet<BackPointer>,
  pub derivations: Vec<Arc<Derivation>>,
  /// Every child entry is single-formula and every derivation seen here had
  /// the same formula: there's no ambiguity to lose by pruning.
  pub single_formula: bool,
  /// Cut by the first-pass denotation beam. Still part of the provenance graph,
  /// but nothing reads it as a child anymore.
  pub hidden: bool,
}

#[derive(Debug, Default)]
struct CellEntries {
  /// visible denotations, in the order they were first seen
  order: Vec<DenotationId>,
  index: HashMap<DenotationId, MetaIdx>,
}

#[derive(Debug, Default)]
pub struct Chart {
  arena: Vec<Metadata>,
  cells: HashMap<Cell, CellEntries>,
  num_visible: usize,
}

impl Chart {
  pub fn new() -> Self {
    Default::default()
  }

  /// Number of visible (cell, denotation) entries
  pub fn num_entries(&self) -> usize {
    self.num_visible
  }

  pub fn num_cells(&self) -> usize {
    self.cells.len()
  }

  pub fn cells(&self) -> impl Iterator<Item = &Cell> {
    self.cells.keys()
  }

  /// Get a record. Assumes valid, panics on OOB
  pub fn get(&self, idx: MetaIdx) -> &Metadata {
    self.arena.get(idx.0 as usize).expect("Invalid MetaIdx")
  }

  fn get_mut(&mut self, idx: MetaIdx) -> &mut Metadata {
    self.arena.get_mut(idx.0 as usize).expect("Invalid MetaIdx")
  }

  /// Looks up an entry, hidden or not
  pub fn metadata(&self, cell: Cell, denotation: DenotationId) -> Option<&Metadata> {
    self
      .cells
      .get(&cell)
      .and_then(|c| c.index.get(&denotation))
      .map(|idx| self.get(*idx))
  }

  pub fn lookup(&self, bp: BackPointer) -> Option<&Metadata> {
    self.metadata(bp.cell, bp.denotation)
  }

  pub fn is_single_formula(&self, bp: BackPointer) -> bool {
    self.lookup(bp).is_some_and(|m| m.single_formula)
  }

  /// Visible entries of a cell, in first-seen order
  pub fn entries(&self, cell: Cell) -> impl Iterator<Item = &Metadata> {
    self
      .cells
      .get(&cell)
      .into_iter()
      .flat_map(move |c| c.order.iter().map(move |d| self.get(c.index[d])))
  }

  /// All derivations of the visible entries of a cell
  pub fn derivations(&self, cell: Cell) -> impl Iterator<Item = &Arc<Derivation>> {
    self.entries(cell).flat_map(|m| m.derivations.iter())
  }

  /// Every record ever created, hidden ones included
  pub fn all_entries(&self) -> impl Iterator<Item = &Metadata> {
    self.arena.iter()
  }

  pub fn num_denotations(&self, cell: Cell) -> usize {
    self.cells.get(&cell).map_or(0, |c| c.order.len())
  }

  /// Records a derivation of `denotation` in `cell`, unioning in the way it
  /// was produced. Creates the entry on first sight.
  #[allow(clippy::too_many_arguments)]
  pub fn add(
    &mut self,
    cell: Cell,
    denotation: DenotationId,
    deriv: Arc<Derivation>,
    ingredient: Ingredient,
    back_pointers: &[BackPointer],
    children_single_formula: bool,
    retention: Retention,
  ) -> MetaIdx {
    let existing = self.cells.get(&cell).and_then(|c| c.index.get(&denotation)).copied();

    let idx = match existing {
      Some(idx) => {
        let meta = self.get_mut(idx);
        let same_formula = meta
          .derivations
          .first()
          .is_none_or(|first| first.formula == deriv.formula);
        meta.single_formula &= children_single_formula && same_formula;
        if !meta.hidden && (retention == Retention::All || meta.derivations.is_empty()) {
          meta.derivations.push(deriv);
        }
        idx
      }
      None => {
        let idx = MetaIdx(self.arena.len() as u32);
        self.arena.push(Metadata {
          cell,
          denotation,
          ingredients: HashSet::new(),
          back_pointers: HashSet::new(),
          derivations: vec![deriv],
          single_formula: children_single_formula,
          hidden: false,
        });
        let entries = self.cells.entry(cell).or_default();
        entries.order.push(denotation);
        entries.index.insert(denotation, idx);
        self.num_visible += 1;
        idx
      }
    };

    let meta = self.get_mut(idx);
    meta.ingredients.insert(ingredient);
    meta.back_pointers.extend(back_pointers.iter().copied());
    idx
  }

  /// Keeps only the first `k` denotations of a cell, in first-seen order.
  /// Returns how many were hidden.
  pub fn truncate_denotations(&mut self, cell: Cell, k: usize) -> usize {
    let Some(entries) = self.cells.get_mut(&cell) else {
      return 0;
    };
    if entries.order.len() <= k {
      return 0;
    }

    let cut = entries.order.split_off(k);
    let cut = cut.iter().map(|d| entries.index[d]).collect::<Vec<_>>();
    for idx in cut.iter() {
      let meta = self.get_mut(*idx);
      meta.hidden = true;
      meta.derivations.clear();
    }
    self.num_visible -= cut.len();
    cut.len()
  }

  /// Keeps the `beam_size` best-scoring derivations of every entry in a cell.
  /// Ties keep their insertion order. Returns how many were dropped.
  pub fn prune_derivations(&mut self, cell: Cell, beam_size: usize) -> usize {
    let Some(entries) = self.cells.get(&cell) else {
      return 0;
    };
    let idxs = entries.order.iter().map(|d| entries.index[d]).collect::<Vec<_>>();

    let mut dropped = 0;
    for idx in idxs {
      let derivs = &mut self.get_mut(idx).derivations;
      if derivs.len() > beam_size {
        derivs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        dropped += derivs.len() - beam_size;
        derivs.truncate(beam_size);
      }
    }
    dropped
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::derivation::Span;
  use crate::formula::Formula;
  use crate::grammar::Grammar;
  use crate::rules::CategoryId;

  fn grammar() -> Grammar {
    r#"
      $Num -> five => const 5;
      floating $ROOT -> $Num $Num => call +;
    "#
    .parse()
    .unwrap()
  }

  fn deriv(g: &Grammar, formula: Formula, score: f64) -> Arc<Derivation> {
    let mut d = Derivation::new(
      g.rules()[0].clone(),
      Span::Anchored { start: 0, end: 1 },
      formula,
      vec![],
    );
    d.score = score;
    Arc::new(d)
  }

  fn ingredient(cell: Cell) -> Ingredient {
    Ingredient {
      cell,
      rule: RuleId(0),
      child1: None,
      child2: None,
    }
  }

  #[test]
  fn test_representative_and_single_formula() {
    let g = grammar();
    let cell = Cell::anchored(CategoryId(0), 0, 1);
    let d = DenotationId(0);
    let mut chart = Chart::new();

    let five = || deriv(&g, Formula::number(5), 0.0);
    chart.add(cell, d, five(), ingredient(cell), &[], true, Retention::Representative);
    chart.add(cell, d, five(), ingredient(cell), &[], true, Retention::Representative);
    let meta = chart.metadata(cell, d).unwrap();
    assert_eq!(meta.derivations.len(), 1);
    assert_eq!(meta.ingredients.len(), 1);
    assert!(meta.single_formula);

    // same denotation, different formula: no longer unambiguous
    let other = Formula::call("+", vec![Formula::number(2), Formula::number(3)]);
    let other = deriv(&g, other, 0.0);
    chart.add(cell, d, other, ingredient(cell), &[], true, Retention::Representative);
    let meta = chart.metadata(cell, d).unwrap();
    assert_eq!(meta.derivations.len(), 1);
    assert!(!meta.single_formula);
    assert_eq!(chart.num_entries(), 1);
  }

  #[test]
  fn test_truncate_keeps_provenance() {
    let g = grammar();
    let cell = Cell::floating(CategoryId(1), 1);
    let mut chart = Chart::new();
    for i in 0..5 {
      let n = deriv(&g, Formula::number(i as i64), 0.0);
      let d = DenotationId(i);
      chart.add(cell, d, n, ingredient(cell), &[], true, Retention::Representative);
    }

    assert_eq!(chart.truncate_denotations(cell, 2), 3);
    assert_eq!(chart.num_denotations(cell), 2);
    assert_eq!(chart.num_entries(), 2);
    let seen = chart.entries(cell).map(|m| m.denotation).collect::<Vec<_>>();
    assert_eq!(seen, vec![DenotationId(0), DenotationId(1)]);

    let hidden = chart.metadata(cell, DenotationId(4)).unwrap();
    assert!(hidden.hidden);
    assert!(hidden.derivations.is_empty());
    assert_eq!(hidden.ingredients.len(), 1);
  }

  #[test]
  fn test_prune_by_score() {
    let g = grammar();
    let cell = Cell::anchored(CategoryId(0), 0, 1);
    let d = DenotationId(0);
    let mut chart = Chart::new();
    for (n, score) in [(1, 0.5), (2, 2.0), (3, 0.5), (4, 1.0)] {
      let n = deriv(&g, Formula::number(n), score);
      chart.add(cell, d, n, ingredient(cell), &[], false, Retention::All);
    }

    assert_eq!(chart.prune_derivations(cell, 3), 1);
    let kept = chart
      .derivations(cell)
      .map(|d| d.formula.to_string())
      .collect::<Vec<_>>();
    assert_eq!(kept, vec!["2", "4", "1"]);
  }
}
