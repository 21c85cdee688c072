use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::execute::ExecutionError;
use crate::formula::Formula;
use crate::rules::{Production, Rule};
use crate::syntree::{Constituent, SynTree, Word};
use crate::value::Value;

/// Where a derivation sits in the chart: on a token span, or at a floating depth
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Span {
  Anchored { start: usize, end: usize },
  Floating { depth: usize },
}

impl Span {
  pub fn is_anchored(&self) -> bool {
    matches!(self, Self::Anchored { .. })
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Anchored { start, end } => write!(f, "{}..{}", start, end),
      Self::Floating { depth } => write!(f, "@{}", depth),
    }
  }
}

/// A formula together with how it was built. Derivations are immutable once
/// they enter the chart and are shared between parents through `Arc`.
#[derive(Debug, Clone)]
pub struct Derivation {
  pub rule: Arc<Rule>,
  pub span: Span,
  pub formula: Formula,
  pub children: Vec<Arc<Derivation>>,
  /// `None` until the engine executes the formula
  pub value: Option<Result<Value, ExecutionError>>,
  pub score: f64,
  /// Token positions this derivation (transitively) consumed
  pub anchors: BTreeSet<usize>,
}

impl Derivation {
  pub fn new(
    rule: Arc<Rule>,
    span: Span,
    formula: Formula,
    children: Vec<Arc<Derivation>>,
  ) -> Self {
    let anchors = match span {
      Span::Anchored { start, end } => (start..end).collect(),
      Span::Floating { .. } => children
        .iter()
        .flat_map(|c| c.anchors.iter().copied())
        .collect(),
    };

    Self {
      rule,
      span,
      formula,
      children,
      value: None,
      score: 0.0,
      anchors,
    }
  }

  pub fn category(&self) -> &str {
    self.rule.symbol_str()
  }

  /// The successful value, if execution succeeded
  pub fn value(&self) -> Option<&Value> {
    self.value.as_ref().and_then(|v| v.as_ref().ok())
  }

  pub fn is_error(&self) -> bool {
    matches!(self.value, Some(Err(_)))
  }

  /// Number of token positions consumed by both derivations
  pub fn anchor_overlap(&self, other: &Derivation) -> usize {
    self.anchors.intersection(&other.anchors).count()
  }

  fn denotation_str(&self) -> String {
    match &self.value {
      None => "?".to_string(),
      Some(Ok(v)) => v.to_string(),
      Some(Err(e)) => format!("error: {}", e),
    }
  }

  pub fn to_tree(&self) -> SynTree<String, String> {
    let mut children = self.children.iter();
    let mut subtrees = Vec::with_capacity(self.rule.len());
    for (idx, prod) in self.rule.productions.iter().enumerate() {
      match prod {
        Production::Terminal(word) => {
          let position = match self.span {
            Span::Anchored { start, .. } if idx == 0 => start,
            Span::Anchored { end, .. } => end - 1,
            Span::Floating { .. } => 0,
          };
          subtrees.push(SynTree::Leaf(Word {
            value: word.clone(),
            position,
          }))
        }
        Production::Nonterminal(_) => {
          if let Some(child) = children.next() {
            subtrees.push(child.to_tree());
          }
        }
      }
    }

    SynTree::Branch(
      Constituent {
        value: format!(
          "{} {} = {}",
          self.category(),
          self.formula,
          self.denotation_str()
        ),
        span: self.span,
      },
      subtrees,
    )
  }
}

impl fmt::Display for Derivation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {}: {} = {} [score {:.3}]",
      self.category(),
      self.span,
      self.formula,
      self.denotation_str(),
      self.score
    )
  }
}
