use std::fmt;

/// The result of executing a formula. Values are compared and hashed
/// structurally, which is what makes them usable as denotation keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
  Number(i64),
  Bool(bool),
  Str(String),
  /// A knowledge-graph entity or predicate id, like `fb:en.barack_obama`
  Entity(String),
  List(Vec<Value>),
}

impl Value {
  /// Reads a single atom as written in grammar files and on the command line:
  /// integers, `true`/`false`, "quoted strings", and anything else as an entity.
  pub fn parse_atom(s: &str) -> Self {
    if let Ok(n) = s.parse::<i64>() {
      Self::Number(n)
    } else if s == "true" || s == "false" {
      Self::Bool(s == "true")
    } else if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
      Self::Str(s[1..s.len() - 1].to_string())
    } else {
      Self::Entity(s.to_string())
    }
  }

  pub fn number(&self) -> Option<i64> {
    match self {
      Self::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn list(&self) -> Option<&[Value]> {
    match self {
      Self::List(vs) => Some(vs),
      _ => None,
    }
  }

  pub fn is_empty_list(&self) -> bool {
    matches!(self, Self::List(vs) if vs.is_empty())
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Self::Number(_) => "number",
      Self::Bool(_) => "bool",
      Self::Str(_) => "string",
      Self::Entity(_) => "entity",
      Self::List(_) => "list",
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{}", n),
      Self::Bool(b) => write!(f, "{}", b),
      Self::Str(s) => write!(f, "{:?}", s),
      Self::Entity(e) => write!(f, "{}", e),
      Self::List(vs) => {
        write!(f, "(list")?;
        for v in vs.iter() {
          write!(f, " {}", v)?;
        }
        write!(f, ")")
      }
    }
  }
}

#[test]
fn test_parse_atom() {
  assert_eq!(Value::parse_atom("-12"), Value::Number(-12));
  assert_eq!(Value::parse_atom("true"), Value::Bool(true));
  assert_eq!(Value::parse_atom("\"hi there\""), Value::Str("hi there".to_string()));
  assert_eq!(
    Value::parse_atom("fb:en.obama"),
    Value::Entity("fb:en.obama".to_string())
  );
}

#[test]
fn test_display() {
  let v = Value::List(vec![Value::Number(1), Value::Str("a".to_string())]);
  assert_eq!(v.to_string(), "(list 1 \"a\")");
}
