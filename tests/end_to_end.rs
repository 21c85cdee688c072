use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dpdparser::execute::{CallExecutor, ExecutionError, Executor};
use dpdparser::formula::Formula;
use dpdparser::{
  Example, Grammar, Pass, Params, ParseResult, Parser, ParserConfig, Services, Value,
};

fn parser(path: &str, config: ParserConfig) -> Parser {
  let g = Grammar::read_from_file(path).unwrap();
  Parser::with_params(Arc::new(g), config, Params::new()).unwrap()
}

fn formulas(result: &ParseResult) -> Vec<String> {
  result
    .candidates
    .iter()
    .map(|d| d.formula.to_string())
    .collect()
}

fn five() -> Example {
  Example::new("five", "five").with_target(Value::Number(10))
}

fn three_four() -> Example {
  Example::new("three-four", "three four").with_target(Value::Number(7))
}

fn small_arithmetic() -> ParserConfig {
  ParserConfig {
    max_depth: 3,
    ..Default::default()
  }
}

#[test]
fn test_five_plus_five() {
  let p = parser("grammars/five.grammar", ParserConfig::default());
  let result = p.parse(&five(), true).unwrap();

  assert_eq!(result.state, Pass::Done);
  assert_eq!(formulas(&result), vec!["(+ 5 5)"]);
  assert_eq!(result.candidates[0].value(), Some(&Value::Number(10)));

  // anchored $Num, its floating lift, and the floating root
  let allowed = result.allowed_ingredients.as_ref().unwrap();
  assert_eq!(allowed.len(), 3);
  assert_eq!(result.stats.oracle_roots, 1);
  assert_eq!(result.stats.allowed_ingredients, 3);
  assert!(result.stats.first.is_some());
  assert!(!result.stats.timed_out());
}

#[test]
fn test_first_pass_needs_target_and_training() {
  let p = parser("grammars/five.grammar", ParserConfig::default());

  // serving time: no target
  let result = p.parse(&Example::new("five", "five"), true).unwrap();
  assert!(result.stats.first.is_none());
  assert!(result.allowed_ingredients.is_none());
  assert_eq!(formulas(&result), vec!["(+ 5 5)"]);

  // not computing expected counts
  let result = p.parse(&five(), false).unwrap();
  assert!(result.stats.first.is_none());
  assert_eq!(result.candidates.len(), 1);

  let cheat = ParserConfig {
    cheat: true,
    ..Default::default()
  };
  let p = parser("grammars/five.grammar", cheat);
  let result = p.parse(&five(), false).unwrap();
  assert!(result.stats.first.is_some());

  let ignore = ParserConfig {
    ignore_first_pass: true,
    cheat: true,
    ..Default::default()
  };
  let p = parser("grammars/five.grammar", ignore);
  let result = p.parse(&five(), true).unwrap();
  assert!(result.stats.first.is_none());
  assert!(result.allowed_ingredients.is_none());
  assert_eq!(result.candidates.len(), 1);
}

#[test]
fn test_unreachable_target() {
  let p = parser("grammars/five.grammar", ParserConfig::default());
  let ex = Example::new("five", "five").with_target(Value::Number(11));
  let result = p.parse(&ex, true).unwrap();

  assert_eq!(result.stats.oracle_roots, 0);
  assert!(result.allowed_ingredients.as_ref().unwrap().is_empty());
  assert!(result.candidates.is_empty());

  let backoff = ParserConfig {
    use_backoff: true,
    ..Default::default()
  };
  let p = parser("grammars/five.grammar", backoff);
  let result = p.parse(&ex, true).unwrap();
  assert_eq!(formulas(&result), vec!["(+ 5 5)"]);
  assert!(result.stats.backoff.is_some());
}

#[test]
fn test_second_pass_stays_inside_closure() {
  let p = parser("grammars/arithmetic.grammar", small_arithmetic());
  let result = p.parse(&three_four(), true).unwrap();

  let allowed = result.allowed_ingredients.as_ref().unwrap();
  let second = result.second_pass.as_ref().unwrap();
  for meta in second.chart.all_entries() {
    assert!(meta.ingredients.iter().all(|i| allowed.contains(i)));
  }

  assert!(!result.candidates.is_empty());
  for d in result.candidates.iter() {
    assert_eq!(d.value(), Some(&Value::Number(7)), "{}", d.formula);
  }
  let found = formulas(&result);
  assert!(found.contains(&"(+ 3 4)".to_string()));
  assert!(found.contains(&"(+ 4 3)".to_string()));
}

#[test]
fn test_closure_is_smaller_than_everything() {
  let p = parser("grammars/arithmetic.grammar", small_arithmetic());
  let guided = p.parse(&three_four(), true).unwrap();
  let unguided = p.parse(&three_four(), false).unwrap();

  assert!(guided.candidates.len() < unguided.candidates.len());
  assert!(guided.stats.second.denotations < unguided.stats.second.denotations);
  // everything the guided pass found, the unguided one found too
  let all = formulas(&unguided);
  for f in formulas(&guided) {
    assert!(all.contains(&f), "{}", f);
  }
}

#[test]
fn test_beam_size_respected() {
  let config = ParserConfig {
    beam_size: 1,
    ..small_arithmetic()
  };
  let p = parser("grammars/arithmetic.grammar", config);
  let result = p.parse(&three_four(), false).unwrap();
  let second = result.second_pass.as_ref().unwrap();
  assert!(second.chart.all_entries().all(|m| m.derivations.len() <= 1));
  assert!(result.stats.second.beam_dropped > 0);
}

#[test]
fn test_weights_pick_the_survivor() {
  let g = Arc::new(Grammar::read_from_file("grammars/arithmetic.grammar").unwrap());
  let config = ParserConfig {
    beam_size: 1,
    max_depth: 3,
    ..Default::default()
  };

  // (+ 2 2) and (* 2 2) share a denotation, and only one fits in the beam
  let mut params = Params::new();
  params.set_weight("rule=floating $Expr -> $Expr $Expr => call *", 1.0);
  let p = Parser::with_params(g, config, params).unwrap();
  let result = p.parse(&Example::new("x", "two"), false).unwrap();

  let found = formulas(&result);
  assert!(found.contains(&"(* 2 2)".to_string()), "{:?}", found);
  assert!(!found.contains(&"(+ 2 2)".to_string()), "{:?}", found);
  let best = result.best().unwrap();
  assert_eq!(best.formula.to_string(), "(* 2 2)");
  assert_eq!(best.score, 1.0);
}

#[test]
fn test_deterministic() {
  let config = ParserConfig {
    use_backoff: true,
    shuffle_seed: 7,
    ..small_arithmetic()
  };
  let p = parser("grammars/arithmetic.grammar", config.clone());
  let a = p.parse(&three_four(), true).unwrap();
  let b = p.parse(&three_four(), true).unwrap();
  assert_eq!(formulas(&a), formulas(&b));

  let p2 = parser("grammars/arithmetic.grammar", config);
  assert_eq!(formulas(&a), formulas(&p2.parse(&three_four(), true).unwrap()));

  // the shuffled list is exactly the guided candidates plus the backoff ones
  let plain = parser("grammars/arithmetic.grammar", small_arithmetic());
  let mut expected = formulas(&plain.parse(&three_four(), true).unwrap());
  expected.extend(formulas(&plain.parse(&three_four(), false).unwrap()));
  expected.sort();
  let mut shuffled = formulas(&a);
  shuffled.sort();
  assert_eq!(shuffled, expected);
}

#[test]
fn test_anchor_overlap() {
  let config = ParserConfig {
    max_anchor_overlap: Some(0),
    ..Default::default()
  };
  let p = parser("grammars/five.grammar", config);
  let result = p.parse(&five(), true).unwrap();
  assert!(result.candidates.is_empty());
  assert!(result.stats.second.anchor_overlaps > 0);

  // the first pass ignores the limit, so the oracle is still found
  assert_eq!(result.stats.oracle_roots, 1);
}

#[test]
fn test_execution_errors_collapse() {
  let g: Grammar = r#"
    $Num -> zero => const 0;
    $Num -> one => const 1;
    floating $ROOT -> $Num $Num => call /;
  "#
  .parse()
  .unwrap();
  let p = Parser::with_params(Arc::new(g), ParserConfig::default(), Params::new()).unwrap();
  let result = p.parse(&Example::new("x", "one zero"), false).unwrap();

  // (/ 1 0) and (/ 0 0) fail in the same rule, but over different child
  // denotations, so they are two distinct error entries
  assert!(result.candidates.iter().any(|d| d.is_error()));
  assert!(result.stats.second.error_denotations >= 2);
  assert!(result.candidates.iter().any(|d| d.value() == Some(&Value::Number(0))));
}

#[test]
fn test_lists() {
  let p = parser("grammars/lists.grammar", ParserConfig::default());
  let ex = Example::new("x", "10 20").with_target(Value::Number(20));
  let result = p.parse(&ex, true).unwrap();
  assert!(!result.candidates.is_empty());
  let found = formulas(&result);
  assert!(found.contains(&"(max (list 10 20))".to_string()), "{:?}", found);
}

fn duplicate_pruning(aggressive: bool) -> ParserConfig {
  ParserConfig {
    max_depth: 2,
    aggressive_single_formula_pruning: aggressive,
    pruning_strategies: vec!["emptyDenotation".to_string(), "duplicateArguments".to_string()],
    first_pass_pruners: vec!["emptyDenotation".to_string()],
    ..Default::default()
  }
}

#[test]
fn test_first_pass_keeps_ambiguous_duplicates() {
  let g: Grammar = r#"
    $Small -> two => const 2;
    $Small -> three => const 3;
    floating $Num -> $Small $Small => call +;
    floating $ROOT -> $Num $Num => call +;
  "#
  .parse()
  .unwrap();
  let p = Parser::with_params(Arc::new(g), duplicate_pruning(true), Params::new()).unwrap();
  let ex = Example::new("x", "two three").with_target(Value::Number(10));
  let result = p.parse(&ex, true).unwrap();

  // (+ 2 2) and (+ 3 3) had unambiguous children, so the first pass pruned
  // them, leaving 5 as the only $Num
  let first = result.stats.first.as_ref().unwrap();
  assert!(first.pruned >= 2);

  // 5 is both (+ 2 3) and (+ 3 2). The first pass only kept one of them, so
  // its 10 looked like (+ x x), but it wasn't pruned
  assert_eq!(result.stats.oracle_roots, 1);

  // the second pass sees every formula, and drops the real duplicates
  let mut found = formulas(&result);
  found.sort();
  assert_eq!(found, vec!["(+ (+ 2 3) (+ 3 2))", "(+ (+ 3 2) (+ 2 3))"]);
  assert!(result.stats.second.pruned >= 2);
}

#[test]
fn test_first_pass_prunes_unambiguous_duplicates() {
  let p = parser("grammars/five.grammar", duplicate_pruning(true));
  let result = p.parse(&five(), true).unwrap();
  // $Num only ever means 5, so (+ 5 5) is pruned right away
  assert_eq!(result.stats.oracle_roots, 0);
  assert!(result.stats.first.as_ref().unwrap().pruned > 0);
  assert!(result.allowed_ingredients.as_ref().unwrap().is_empty());
  assert!(result.candidates.is_empty());

  let p = parser("grammars/five.grammar", duplicate_pruning(false));
  let result = p.parse(&five(), true).unwrap();
  assert_eq!(result.stats.oracle_roots, 1);
  assert!(result.candidates.is_empty());
  assert!(result.stats.second.pruned > 0);
}

/// Takes its time over every multiplication
struct SlowMultiplication;

impl Executor for SlowMultiplication {
  fn execute(&self, formula: &Formula, ex: &Example) -> Result<Value, ExecutionError> {
    if matches!(formula, Formula::Call(name, _) if name == "*") {
      thread::sleep(Duration::from_millis(400));
    }
    CallExecutor.execute(formula, ex)
  }
}

#[test]
fn test_timed_out_pass_keeps_roots() {
  let g = Arc::new(Grammar::read_from_file("grammars/arithmetic.grammar").unwrap());
  let config = ParserConfig {
    max_parsing_time_seconds: 1,
    cancellation_grace_millis: 5000,
    ..small_arithmetic()
  };
  let mut services = Services::from_config(&config, Arc::new(Params::new())).unwrap();
  services.executor = Arc::new(SlowMultiplication);
  let p = Parser::new(g, config, services).unwrap();

  let result = p.parse(&three_four(), true).unwrap();

  // the first pass runs out of time among the depth 2 multiplications, after
  // every sum of 3 and 4 was built
  let first = result.stats.first.as_ref().unwrap();
  assert!(first.timed_out);
  assert!(!first.abandoned);
  assert!(result.stats.timed_out());

  // root rules still ran over what was finished
  assert_eq!(result.stats.oracle_roots, 1);
  assert!(!result.stats.second.timed_out);
  let mut found = formulas(&result);
  found.sort();
  assert_eq!(found, vec!["(+ 3 4)", "(+ 4 3)"]);
}
