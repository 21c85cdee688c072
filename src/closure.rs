//! Walks the provenance graph backwards from the entries that reached the
//! target, collecting every ingredient that can take part in a correct parse.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::chart::{BackPointer, Chart, Ingredient};
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mark {
  /// expanded, and still on the current path
  Open,
  Closed,
}

/// Union of the ingredients of every entry reachable from `roots` through
/// back-pointers. Each entry is expanded once. Back-pointers to entries that
/// don't exist are ignored; a back-pointer into the current path is a cycle,
/// which the bottom-up construction never produces.
pub fn provenance_closure<I>(chart: &Chart, roots: I) -> Result<HashSet<Ingredient>>
where
  I: IntoIterator<Item = BackPointer>,
{
  let mut marks: HashMap<BackPointer, Mark> = HashMap::new();
  let mut allowed = HashSet::new();

  for root in roots {
    // (entry, children already pushed)
    let mut stack = vec![(root, false)];

    while let Some((bp, expanded)) = stack.pop() {
      if expanded {
        marks.insert(bp, Mark::Closed);
        continue;
      }

      match marks.get(&bp) {
        Some(Mark::Closed) => continue,
        Some(Mark::Open) => {
          return Err(Error::ProvenanceCycle {
            cell: bp.cell.to_string(),
            denotation: bp.denotation.0,
          });
        }
        None => {}
      }

      let Some(meta) = chart.lookup(bp) else {
        trace!(cell = %bp.cell, denotation = bp.denotation.0, "no entry behind back-pointer");
        marks.insert(bp, Mark::Closed);
        continue;
      };

      marks.insert(bp, Mark::Open);
      allowed.extend(meta.ingredients.iter().copied());
      stack.push((bp, true));
      stack.extend(meta.back_pointers.iter().map(|child| (*child, false)));
    }
  }

  Ok(allowed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cell::Cell;
  use crate::chart::Retention;
  use crate::denotation::DenotationId;
  use crate::derivation::{Derivation, Span};
  use crate::formula::Formula;
  use crate::grammar::Grammar;
  use crate::rules::{CategoryId, RuleId};
  use std::sync::Arc;

  fn witness() -> Arc<Derivation> {
    let g: Grammar = "$ROOT -> five => const 5;".parse().unwrap();
    Arc::new(Derivation::new(
      g.rules()[0].clone(),
      Span::Anchored { start: 0, end: 1 },
      Formula::number(5),
      vec![],
    ))
  }

  fn ingredient(cell: Cell, rule: u32, children: &[BackPointer]) -> Ingredient {
    Ingredient {
      cell,
      rule: RuleId(rule),
      child1: children.first().map(|c| c.denotation),
      child2: children.get(1).map(|c| c.denotation),
    }
  }

  fn add(
    chart: &mut Chart,
    cell: Cell,
    d: u32,
    rule: u32,
    children: &[BackPointer],
  ) -> BackPointer {
    chart.add(
      cell,
      DenotationId(d),
      witness(),
      ingredient(cell, rule, children),
      children,
      true,
      Retention::Representative,
    );
    BackPointer::new(cell, DenotationId(d))
  }

  #[test]
  fn test_shared_subresults() {
    let mut chart = Chart::new();
    let a = add(&mut chart, Cell::anchored(CategoryId(0), 0, 1), 0, 0, &[]);
    let b = add(&mut chart, Cell::anchored(CategoryId(0), 1, 2), 1, 0, &[]);
    // an unrelated entry that mustn't show up
    add(&mut chart, Cell::anchored(CategoryId(0), 2, 3), 2, 0, &[]);

    let mid = add(&mut chart, Cell::floating(CategoryId(1), 1), 3, 1, &[a, b]);
    // a second way to the same entry, also sharing `a`
    add(&mut chart, Cell::floating(CategoryId(1), 1), 3, 2, &[a, a]);
    let root = add(&mut chart, Cell::floating(CategoryId(2), 2), 4, 3, &[mid, a]);

    let allowed = provenance_closure(&chart, [root]).unwrap();
    assert_eq!(allowed.len(), 5);
    assert!(allowed.contains(&ingredient(mid.cell, 2, &[a, a])));
    assert!(!allowed.iter().any(|i| i.cell == Cell::anchored(CategoryId(0), 2, 3)));
  }

  #[test]
  fn test_missing_entries_and_empty_roots() {
    let chart = Chart::new();
    assert!(provenance_closure(&chart, []).unwrap().is_empty());

    let ghost = BackPointer::new(Cell::floating(CategoryId(0), 0), DenotationId(7));
    assert!(provenance_closure(&chart, [ghost]).unwrap().is_empty());
  }

  #[test]
  fn test_cycle() {
    let mut chart = Chart::new();
    let x = BackPointer::new(Cell::floating(CategoryId(0), 1), DenotationId(0));
    let y = add(&mut chart, Cell::floating(CategoryId(1), 1), 1, 0, &[x]);
    add(&mut chart, x.cell, 0, 1, &[y]);

    let err = provenance_closure(&chart, [y]).unwrap_err();
    assert!(matches!(err, Error::ProvenanceCycle { .. }));
  }
}
