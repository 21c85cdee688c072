use std::fmt;
use std::sync::Arc;

use crate::semantics::SemanticFn;

/// Interned grammar category (`$Num`, `$ROOT`, ...)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub u32);

/// Dense rule index, assigned by the grammar in insertion order
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  pub id: CategoryId,
}

impl Symbol {
  pub fn new(name: String, id: CategoryId) -> Self {
    Self { name, id }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
  /// A literal input token
  Terminal(String),
  /// A category, filled by a child derivation
  Nonterminal(Symbol),
}

impl Production {
  pub fn symbol_str(&self) -> &str {
    match self {
      Self::Terminal(s) => s,
      Self::Nonterminal(s) => &s.name,
    }
  }

  pub fn category(&self) -> Option<CategoryId> {
    match self {
      Self::Nonterminal(s) => Some(s.id),
      Self::Terminal(_) => None,
    }
  }
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.symbol_str())
  }
}

/// A grammar rule. Anchored rules consume a token span; floating rules are
/// placed by derivation depth (or size) instead.
#[derive(Debug)]
pub struct Rule {
  pub id: RuleId,
  pub symbol: Symbol,
  pub productions: Vec<Production>,
  pub floating: bool,
  pub sem: Arc<dyn SemanticFn>,
}

impl Rule {
  pub fn len(&self) -> usize {
    self.productions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_anchored(&self) -> bool {
    !self.floating
  }

  pub fn lhs(&self) -> CategoryId {
    self.symbol.id
  }

  pub fn symbol_str(&self) -> &str {
    &self.symbol.name
  }

  /// Categories of the right-hand side, in order, skipping terminals
  pub fn child_categories(&self) -> impl Iterator<Item = CategoryId> + '_ {
    self.productions.iter().filter_map(Production::category)
  }

  /// `$Lhs -> rhs...`, without placement or semantics. Used as a feature name.
  pub fn signature(&self) -> String {
    let mut s = format!("{} ->", self.symbol);
    for p in self.productions.iter() {
      s.push(' ');
      s.push_str(p.symbol_str());
    }
    s
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.floating {
      write!(f, "floating ")?;
    }
    write!(f, "{} => {}", self.signature(), self.sem)
  }
}
