//! Semantic functions turn a rule's matched children into candidate formulas.
//!
//! The parser only ever sees them through [`SemanticFn`]. A handful of
//! general-purpose ones are provided and registered by name in
//! [`SemanticRegistry::default`], which is what the grammar file reader uses to
//! resolve the `=> name args...` part of a rule.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::derivation::{Derivation, Span};
use crate::error::{Error, Result};
use crate::example::Example;
use crate::formula::Formula;
use crate::rules::Rule;
use crate::value::Value;

/// Everything a semantic function gets to look at for one rule application
#[derive(Debug, Clone)]
pub struct Callable {
  pub rule: Arc<Rule>,
  pub span: Span,
  pub children: Vec<Arc<Derivation>>,
}

impl Callable {
  pub fn child(&self, idx: usize) -> Option<&Arc<Derivation>> {
    self.children.get(idx)
  }

  /// The tokens under an anchored span
  pub fn phrase(&self, ex: &Example) -> Option<String> {
    match self.span {
      Span::Anchored { start, end } => Some(ex.phrase(start, end)),
      Span::Floating { .. } => None,
    }
  }

  /// A new derivation for this application, carrying the given formula
  pub fn derive(&self, formula: Formula) -> Derivation {
    Derivation::new(self.rule.clone(), self.span, formula, self.children.clone())
  }
}

/// Produces a finite stream of candidate derivations for one rule application.
/// Streams are drained completely before the chart moves on.
pub trait SemanticFn: fmt::Debug + fmt::Display + Send + Sync {
  fn call<'a>(
    &'a self,
    ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a>;
}

/// Always yields the same formula
#[derive(Debug, Clone)]
pub struct ConstantFn {
  formula: Formula,
}

impl ConstantFn {
  pub fn new(formula: Formula) -> Self {
    Self { formula }
  }
}

impl fmt::Display for ConstantFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "const {}", self.formula)
  }
}

impl SemanticFn for ConstantFn {
  fn call<'a>(
    &'a self,
    _ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a> {
    Box::new(std::iter::once(c.derive(self.formula.clone())))
  }
}

/// Yields one derivation per alternative. Mostly useful on nullary floating
/// rules, to conjure predicates that no token mentions.
#[derive(Debug, Clone)]
pub struct ChoiceFn {
  alternatives: Vec<Formula>,
}

impl ChoiceFn {
  pub fn new(alternatives: Vec<Formula>) -> Self {
    Self { alternatives }
  }
}

impl fmt::Display for ChoiceFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "choice")?;
    for a in self.alternatives.iter() {
      write!(f, " {}", a)?;
    }
    Ok(())
  }
}

impl SemanticFn for ChoiceFn {
  fn call<'a>(
    &'a self,
    _ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a> {
    Box::new(self.alternatives.iter().map(move |f| c.derive(f.clone())))
  }
}

/// Passes the first child's formula through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFn;

impl fmt::Display for IdentityFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "identity")
  }
}

impl SemanticFn for IdentityFn {
  fn call<'a>(
    &'a self,
    _ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a> {
    Box::new(c.child(0).map(|child| c.derive(child.formula.clone())).into_iter())
  }
}

/// Applies a named function to the children's formulas: `(name c0 c1)`
#[derive(Debug, Clone)]
pub struct CallFn {
  name: String,
}

impl CallFn {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl fmt::Display for CallFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "call {}", self.name)
  }
}

impl SemanticFn for CallFn {
  fn call<'a>(
    &'a self,
    _ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a> {
    let args = c.children.iter().map(|d| d.formula.clone()).collect();
    Box::new(std::iter::once(c.derive(Formula::call(self.name.clone(), args))))
  }
}

/// Reads the anchored phrase as a number, written either in digits or as an
/// English number word. Yields nothing if the phrase isn't a number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberFn;

impl NumberFn {
  const WORDS: [&'static str; 21] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen", "twenty",
  ];

  pub fn parse_number(phrase: &str) -> Option<i64> {
    lazy_static! {
      static ref DIGITS: Regex = Regex::new(r"^-?[0-9]+$").unwrap();
    }

    if DIGITS.is_match(phrase) {
      phrase.parse().ok()
    } else {
      Self::WORDS
        .iter()
        .position(|w| *w == phrase)
        .map(|n| n as i64)
    }
  }
}

impl fmt::Display for NumberFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "number")
  }
}

impl SemanticFn for NumberFn {
  fn call<'a>(
    &'a self,
    ex: &'a Example,
    c: &'a Callable,
  ) -> Box<dyn Iterator<Item = Derivation> + 'a> {
    let n = c.phrase(ex).as_deref().and_then(Self::parse_number);
    Box::new(n.map(|n| c.derive(Formula::number(n))).into_iter())
  }
}

/// Builds a semantic function from the arguments written after its name
pub type SemanticFnConstructor = fn(&[String]) -> Result<Arc<dyn SemanticFn>>;

/// Name -> constructor table used when reading grammar files
#[derive(Clone)]
pub struct SemanticRegistry {
  constructors: HashMap<String, SemanticFnConstructor>,
}

impl fmt::Debug for SemanticRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names = self.constructors.keys().collect::<Vec<_>>();
    names.sort();
    f.debug_struct("SemanticRegistry").field("names", &names).finish()
  }
}

fn no_args(name: &str, args: &[String]) -> Result<()> {
  if args.is_empty() {
    Ok(())
  } else {
    Err(Error::Config(format!("{} takes no arguments, got {:?}", name, args)))
  }
}

impl Default for SemanticRegistry {
  fn default() -> Self {
    let mut registry = Self::empty();
    registry.register("const", |args| match args {
      [atom] => Ok(Arc::new(ConstantFn::new(Value::parse_atom(atom).into()))),
      _ => Err(Error::Config(format!("const takes one argument, got {:?}", args))),
    });
    registry.register("choice", |args| {
      if args.is_empty() {
        return Err(Error::Config("choice needs at least one alternative".into()));
      }
      let alternatives = args.iter().map(|a| Value::parse_atom(a).into()).collect();
      Ok(Arc::new(ChoiceFn::new(alternatives)))
    });
    registry.register("identity", |args| {
      no_args("identity", args)?;
      Ok(Arc::new(IdentityFn))
    });
    registry.register("call", |args| match args {
      [name] => Ok(Arc::new(CallFn::new(name.clone()))),
      _ => Err(Error::Config(format!("call takes one function name, got {:?}", args))),
    });
    registry.register("number", |args| {
      no_args("number", args)?;
      Ok(Arc::new(NumberFn))
    });
    registry
  }
}

impl SemanticRegistry {
  pub fn empty() -> Self {
    Self {
      constructors: HashMap::new(),
    }
  }

  pub fn register(&mut self, name: &str, constructor: SemanticFnConstructor) {
    self.constructors.insert(name.to_string(), constructor);
  }

  pub fn resolve(&self, name: &str, args: &[String]) -> Result<Arc<dyn SemanticFn>> {
    let constructor = self
      .constructors
      .get(name)
      .ok_or_else(|| Error::Config(format!("unknown semantic function {}", name)))?;
    constructor(args)
  }
}
