/// Simple recursive-descent parsing of grammar files:
///
/// ```text
/// // comments run to the end of the line
/// $Num -> five => const 5;
/// floating $ROOT -> $Num $Num => call +;
/// ```
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::grammar::{Grammar, GrammarBuilder};
use crate::semantics::SemanticRegistry;

impl FromStr for Grammar {
  type Err = Error;

  /// Parses a grammar, resolving semantic functions with the default registry
  fn from_str(s: &str) -> Result<Self> {
    Self::from_source(s, &SemanticRegistry::default())
  }
}

impl Grammar {
  pub fn from_source(s: &str, registry: &SemanticRegistry) -> Result<Self> {
    let mut builder = Grammar::builder();
    let rest = parse_rules(s, registry, &mut builder)?;
    if !rest.is_empty() {
      return Err(syntax_error(format!("unexpected input at '{}'", context(rest))));
    }
    builder.build()
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
    Self::read_from_file_with(path, &SemanticRegistry::default())
  }

  pub fn read_from_file_with(path: impl AsRef<Path>, registry: &SemanticRegistry) -> Result<Self> {
    let src = fs::read_to_string(path)?;
    Self::from_source(&src, registry)
  }
}

type Infallible<'a, T> = (T, &'a str);
type Parsed<'a, T> = Result<(T, &'a str)>;

fn syntax_error(msg: impl Into<String>) -> Error {
  Error::Grammar(msg.into())
}

/// Shortens the rest of the input for error messages
fn context(s: &str) -> &str {
  let end = s
    .char_indices()
    .nth(40)
    .map(|(i, _)| i)
    .unwrap_or(s.len());
  let line_end = s.find('\n').unwrap_or(s.len());
  &s[..end.min(line_end)]
}

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  if let Some(m) = re.find(s) {
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, what: &str, s: &'a str) -> Parsed<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(syntax_error(format!("expected {} at '{}'", what, context(s))))
  }
}

/// Try to consume a literal, returning None if it doesn't match
fn optional_str<'a>(lit: &'static str, s: &'a str) -> Infallible<'a, Option<&'static str>> {
  match s.strip_prefix(lit) {
    Some(rest) => (Some(lit), rest),
    None => (None, s),
  }
}

fn needed_str<'a>(lit: &'static str, s: &'a str) -> Parsed<'a, &'static str> {
  if let (Some(c), rest) = optional_str(lit, s) {
    Ok((c, rest))
  } else {
    Err(syntax_error(format!("expected '{}' at '{}'", lit, context(s))))
  }
}

/// Skips whitespace and `//` comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"(\s|//[^\n]*)+");
  optional_re(&*WHITESPACE_OR_COMMENT, s).1
}

/// `$Name`
fn parse_category(s: &str) -> Parsed<'_, &str> {
  regex_static!(CATEGORY, r"\$[a-zA-Z0-9_\-\.]+");
  needed_re(&*CATEGORY, "category", s)
}

/// A category or a literal token
fn parse_rhs_symbol(s: &str) -> Parsed<'_, &str> {
  regex_static!(SYMBOL, r"\$?[^\s;$]+");
  needed_re(&*SYMBOL, "right-hand side symbol", s)
}

fn parse_sem_name(s: &str) -> Parsed<'_, &str> {
  regex_static!(SEM_NAME, r"[a-zA-Z_][a-zA-Z0-9_\-]*");
  needed_re(&*SEM_NAME, "semantic function name", s)
}

/// A semantic function argument: a run of anything but whitespace and `;`,
/// or a double-quoted string
fn parse_sem_arg(s: &str) -> Parsed<'_, &str> {
  regex_static!(SEM_ARG, r#""[^"\n]*"|[^\s;]+"#);
  needed_re(&*SEM_ARG, "semantic function argument", s)
}

#[derive(Debug, PartialEq)]
struct RuleStatement<'a> {
  floating: bool,
  lhs: &'a str,
  rhs: Vec<&'a str>,
  sem_name: &'a str,
  sem_args: Vec<String>,
}

/// `[floating] $Lhs -> rhs* => name args* ;`
fn parse_rule(s: &str) -> Parsed<'_, RuleStatement<'_>> {
  regex_static!(FLOATING, r"floating\s");

  let (floating, s) = optional_re(&*FLOATING, s);
  let s = skip_whitespace(s);
  let (lhs, s) = parse_category(s)?;
  let s = skip_whitespace(s);
  let (_, s) = needed_str("->", s)?;

  let mut rhs = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_str("=>", rem) {
      rem = s;
      break;
    }
    let (sym, s) = parse_rhs_symbol(rem)?;
    rhs.push(sym);
    rem = s;
  }

  rem = skip_whitespace(rem);
  let (sem_name, s) = parse_sem_name(rem)?;
  let mut sem_args = Vec::new();
  rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_str(";", rem) {
      rem = s;
      break;
    }
    if rem.is_empty() {
      return Err(syntax_error(format!("rule for {} is missing a terminating ';'", lhs)));
    }
    let (arg, s) = parse_sem_arg(rem)?;
    sem_args.push(arg.to_string());
    rem = s;
  }

  Ok((
    RuleStatement {
      floating: floating.is_some(),
      lhs,
      rhs,
      sem_name,
      sem_args,
    },
    rem,
  ))
}

fn parse_rules<'a>(
  s: &'a str,
  registry: &SemanticRegistry,
  builder: &mut GrammarBuilder,
) -> Result<&'a str> {
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok(rem);
    }
    let (stmt, s) = parse_rule(rem)?;
    let sem = registry.resolve(stmt.sem_name, &stmt.sem_args)?;
    builder.add_rule(stmt.lhs, &stmt.rhs, stmt.floating, sem)?;
    rem = s;
  }
}
