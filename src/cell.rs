use std::fmt;

use crate::derivation::Span;
use crate::grammar::Grammar;
use crate::rules::CategoryId;

/// A dynamic-programming coordinate. Anchored and floating cells share one
/// keyspace but never collide.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cell {
  Anchored {
    cat: CategoryId,
    start: usize,
    end: usize,
  },
  Floating {
    cat: CategoryId,
    depth: usize,
  },
}

impl Cell {
  pub fn anchored(cat: CategoryId, start: usize, end: usize) -> Self {
    Self::Anchored { cat, start, end }
  }

  pub fn floating(cat: CategoryId, depth: usize) -> Self {
    Self::Floating { cat, depth }
  }

  pub fn category(&self) -> CategoryId {
    match self {
      Self::Anchored { cat, .. } | Self::Floating { cat, .. } => *cat,
    }
  }

  pub fn is_anchored(&self) -> bool {
    matches!(self, Self::Anchored { .. })
  }

  pub fn span(&self) -> Span {
    match *self {
      Self::Anchored { start, end, .. } => Span::Anchored { start, end },
      Self::Floating { depth, .. } => Span::Floating { depth },
    }
  }

  /// Display with category names resolved
  pub fn display<'a>(&self, grammar: &'a Grammar) -> CellDisplay<'a> {
    CellDisplay { cell: *self, grammar }
  }
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}:{}", self.category().0, self.span())
  }
}

pub struct CellDisplay<'a> {
  cell: Cell,
  grammar: &'a Grammar,
}

impl fmt::Display for CellDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}:{}",
      self.grammar.category_name(self.cell.category()),
      self.cell.span()
    )
  }
}
