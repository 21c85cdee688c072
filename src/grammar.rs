use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::rules::{CategoryId, Production, Rule, RuleId, Symbol};
use crate::semantics::SemanticFn;

/// Category every complete parse must end up in
pub const ROOT: &str = "$ROOT";

/// An immutable, indexed set of rules. Built with [`GrammarBuilder`], which
/// rejects rule shapes the chart builder can't apply.
#[derive(Debug)]
pub struct Grammar {
  rules: Vec<Arc<Rule>>,
  categories: Vec<String>,
  category_ids: HashMap<String, CategoryId>,
  root: CategoryId,
  /// anchored rules whose whole right-hand side is a single token
  lexical: HashMap<String, Vec<Arc<Rule>>>,
  anchored_binary: Vec<Arc<Rule>>,
  /// anchored `$A -> $B` rules, producers before consumers
  unary_promotions: Vec<Arc<Rule>>,
  floating_nullary: Vec<Arc<Rule>>,
  floating_unary: Vec<Arc<Rule>>,
  floating_binary: Vec<Arc<Rule>>,
  floating_children: HashSet<CategoryId>,
}

impl std::fmt::Display for Grammar {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "//** root: {}", ROOT)?;
    write!(f, "//** categories:")?;
    for c in self.categories.iter() {
      write!(f, " {}", c)?;
    }
    writeln!(f)?;

    for rule in self.rules.iter() {
      writeln!(f, "{};", rule)?;
    }

    Ok(())
  }
}

impl Grammar {
  pub fn builder() -> GrammarBuilder {
    GrammarBuilder::default()
  }

  pub fn rules(&self) -> &[Arc<Rule>] {
    &self.rules
  }

  pub fn rule(&self, id: RuleId) -> &Arc<Rule> {
    &self.rules[id.0 as usize]
  }

  pub fn root(&self) -> CategoryId {
    self.root
  }

  pub fn category(&self, name: &str) -> Option<CategoryId> {
    self.category_ids.get(name).copied()
  }

  pub fn category_name(&self, id: CategoryId) -> &str {
    &self.categories[id.0 as usize]
  }

  pub fn num_categories(&self) -> usize {
    self.categories.len()
  }

  pub fn lexical_rules(&self, token: &str) -> &[Arc<Rule>] {
    self.lexical.get(token).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn anchored_binary_rules(&self) -> &[Arc<Rule>] {
    &self.anchored_binary
  }

  pub fn unary_promotions(&self) -> &[Arc<Rule>] {
    &self.unary_promotions
  }

  pub fn floating_nullary_rules(&self) -> &[Arc<Rule>] {
    &self.floating_nullary
  }

  pub fn floating_unary_rules(&self) -> &[Arc<Rule>] {
    &self.floating_unary
  }

  pub fn floating_binary_rules(&self) -> &[Arc<Rule>] {
    &self.floating_binary
  }

  /// Is this category read by some floating rule? Anchored entries of such
  /// categories are also made available to floating rules at depth 0.
  pub fn is_floating_child(&self, cat: CategoryId) -> bool {
    self.floating_children.contains(&cat)
  }

  /// The deepest floating cell of each category that can still contribute to a
  /// root derivation within `max_depth`. Categories that can't feed a floating
  /// root at all are absent.
  pub fn floating_depth_bounds(&self, max_depth: usize) -> HashMap<CategoryId, usize> {
    let mut bounds = HashMap::new();
    bounds.insert(self.root, max_depth);

    let mut changed = true;
    while changed {
      changed = false;
      for rule in self.floating_unary.iter().chain(self.floating_binary.iter()) {
        let parent = match bounds.get(&rule.lhs()) {
          Some(&d) if d >= 1 => d,
          _ => continue,
        };
        for child in rule.child_categories() {
          match bounds.get(&child) {
            Some(&b) if b >= parent - 1 => {}
            _ => {
              bounds.insert(child, parent - 1);
              changed = true;
            }
          }
        }
      }
    }

    bounds
  }
}

#[derive(Debug, Default)]
pub struct GrammarBuilder {
  categories: Vec<String>,
  category_ids: HashMap<String, CategoryId>,
  rules: Vec<Rule>,
}

impl GrammarBuilder {
  pub fn intern(&mut self, name: &str) -> CategoryId {
    if let Some(id) = self.category_ids.get(name) {
      return *id;
    }
    let id = CategoryId(self.categories.len() as u32);
    self.categories.push(name.to_string());
    self.category_ids.insert(name.to_string(), id);
    id
  }

  fn symbol(&mut self, name: &str) -> Symbol {
    let id = self.intern(name);
    Symbol::new(name.to_string(), id)
  }

  /// Adds a rule. Right-hand side symbols starting with `$` are categories,
  /// everything else is a literal token.
  pub fn add_rule(
    &mut self,
    lhs: &str,
    rhs: &[&str],
    floating: bool,
    sem: Arc<dyn SemanticFn>,
  ) -> Result<RuleId> {
    let describe = || format!("{} -> {}", lhs, rhs.join(" "));

    if !lhs.starts_with('$') {
      return Err(Error::Grammar(format!(
        "rule left-hand side must be a category: {}",
        describe()
      )));
    }
    if rhs.len() > 2 {
      return Err(Error::Grammar(format!(
        "rules can have at most two right-hand side symbols: {}",
        describe()
      )));
    }
    if floating && rhs.iter().any(|s| !s.starts_with('$')) {
      return Err(Error::Grammar(format!(
        "floating rules can't consume tokens: {}",
        describe()
      )));
    }
    if !floating && rhs.is_empty() {
      return Err(Error::Grammar(format!(
        "anchored rules must consume at least one symbol: {}",
        describe()
      )));
    }

    let symbol = self.symbol(lhs);
    let productions = rhs
      .iter()
      .map(|s| {
        if s.starts_with('$') {
          Production::Nonterminal(self.symbol(s))
        } else {
          Production::Terminal(s.to_string())
        }
      })
      .collect();

    let id = RuleId(self.rules.len() as u32);
    self.rules.push(Rule {
      id,
      symbol,
      productions,
      floating,
      sem,
    });
    Ok(id)
  }

  /// Orders anchored unary promotions so that a rule producing `$B` runs
  /// before any `$A -> $B`. Errors on promotion cycles.
  fn sort_unary_promotions(rules: Vec<Arc<Rule>>) -> Result<Vec<Arc<Rule>>> {
    let rhs_of = |r: &Rule| r.child_categories().next();

    let mut consumers: HashMap<CategoryId, Vec<usize>> = HashMap::new();
    let mut producers: HashMap<CategoryId, usize> = HashMap::new();
    for (idx, r) in rules.iter().enumerate() {
      if let Some(rhs) = rhs_of(r) {
        consumers.entry(rhs).or_default().push(idx);
      }
      *producers.entry(r.lhs()).or_default() += 1;
    }

    let mut in_degree = rules
      .iter()
      .map(|r| rhs_of(r).and_then(|c| producers.get(&c)).copied().unwrap_or(0))
      .collect::<Vec<_>>();

    let mut queue = (0..rules.len())
      .filter(|&i| in_degree[i] == 0)
      .collect::<VecDeque<_>>();
    let mut order = Vec::with_capacity(rules.len());
    while let Some(idx) = queue.pop_front() {
      order.push(idx);
      for &next in consumers.get(&rules[idx].lhs()).into_iter().flatten() {
        in_degree[next] -= 1;
        if in_degree[next] == 0 {
          queue.push_back(next);
        }
      }
    }

    if order.len() != rules.len() {
      let stuck = (0..rules.len())
        .filter(|i| !order.contains(i))
        .map(|i| rules[i].signature())
        .collect::<Vec<_>>();
      return Err(Error::Grammar(format!(
        "cycle in unary rules: {}",
        stuck.join(", ")
      )));
    }

    Ok(order.into_iter().map(|i| rules[i].clone()).collect())
  }

  pub fn build(mut self) -> Result<Grammar> {
    if self.rules.is_empty() {
      return Err(Error::Grammar("empty ruleset".into()));
    }
    if !self.rules.iter().any(|r| r.symbol_str() == ROOT) {
      return Err(Error::Grammar(format!("no rules for root category {}", ROOT)));
    }
    let root = self.intern(ROOT);

    let rules = self.rules.into_iter().map(Arc::new).collect::<Vec<_>>();

    let mut lexical: HashMap<String, Vec<Arc<Rule>>> = HashMap::new();
    let mut anchored_binary = Vec::new();
    let mut unary = Vec::new();
    let mut floating_nullary = Vec::new();
    let mut floating_unary = Vec::new();
    let mut floating_binary = Vec::new();
    let mut floating_children = HashSet::new();

    for rule in rules.iter() {
      match (rule.floating, rule.productions.as_slice()) {
        (false, [Production::Terminal(t)]) => {
          lexical.entry(t.clone()).or_default().push(rule.clone())
        }
        (false, [Production::Nonterminal(_)]) => unary.push(rule.clone()),
        (false, [_, _]) => anchored_binary.push(rule.clone()),
        (true, []) => floating_nullary.push(rule.clone()),
        (true, [_]) => floating_unary.push(rule.clone()),
        (true, [_, _]) => floating_binary.push(rule.clone()),
        _ => {
          return Err(Error::Grammar(format!("unsupported rule shape: {}", rule)));
        }
      }
      if rule.floating {
        floating_children.extend(rule.child_categories());
      }
    }

    let unary_promotions = Self::sort_unary_promotions(unary)?;

    Ok(Grammar {
      rules,
      categories: self.categories,
      category_ids: self.category_ids,
      root,
      lexical,
      anchored_binary,
      unary_promotions,
      floating_nullary,
      floating_unary,
      floating_binary,
      floating_children,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unary_order() {
    let g: Grammar = r#"
      $ROOT -> $A => identity;
      $A -> $B => identity;
      $B -> $C => identity;
      $C -> x => number;
    "#
    .parse()
    .unwrap();

    let order = g
      .unary_promotions()
      .iter()
      .map(|r| r.symbol_str().to_string())
      .collect::<Vec<_>>();
    assert_eq!(order, vec!["$B", "$A", "$ROOT"]);
    assert_eq!(g.lexical_rules("x").len(), 1);
    assert!(g.lexical_rules("y").is_empty());
  }

  #[test]
  fn test_unary_cycle() {
    let err = r#"
      $ROOT -> $A => identity;
      $A -> $B => identity;
      $B -> $A => identity;
    "#
    .parse::<Grammar>()
    .unwrap_err();
    assert!(matches!(err, Error::Grammar(msg) if msg.contains("cycle")));
  }

  #[test]
  fn test_bad_shapes() {
    let bad = [
      "$ROOT -> a b c => const 1;",
      "floating $ROOT -> five => const 5;",
      "$A -> five => const 5;",
    ];
    for src in bad {
      assert!(
        matches!(src.parse::<Grammar>(), Err(Error::Grammar(_))),
        "should reject {}",
        src
      );
    }
  }

  #[test]
  fn test_depth_bounds() {
    let g: Grammar = r#"
      floating $ROOT -> $Set => identity;
      floating $Set -> $Set $Rel => call join;
      floating $Set -> $Ent => identity;
      floating $Ent -> => const obama;
      floating $Rel -> => const spouse;
      floating $Unused -> $Ent => identity;
    "#
    .parse()
    .unwrap();

    let bounds = g.floating_depth_bounds(4);
    let bound = |name: &str| bounds.get(&g.category(name).unwrap()).copied();
    assert_eq!(bound("$ROOT"), Some(4));
    assert_eq!(bound("$Set"), Some(3));
    assert_eq!(bound("$Rel"), Some(2));
    assert_eq!(bound("$Ent"), Some(2));
    assert_eq!(bound("$Unused"), None);
    assert!(g.is_floating_child(g.category("$Ent").unwrap()));
    assert!(!g.is_floating_child(g.root()));
  }
}
