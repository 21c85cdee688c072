use crate::value::Value;

/// One utterance to parse, optionally with the answer it should denote.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
  pub id: String,
  pub utterance: String,
  pub tokens: Vec<String>,
  /// Known at training time; `None` at serving time
  pub target_value: Option<Value>,
}

impl Example {
  /// Lowercases and splits on whitespace. Anything fancier (POS, NER, lemmas)
  /// belongs to a preprocessing step outside the parser.
  pub fn new(id: impl Into<String>, utterance: impl Into<String>) -> Self {
    let utterance = utterance.into();
    let tokens = utterance
      .split_whitespace()
      .map(|t| t.to_lowercase())
      .collect();
    Self {
      id: id.into(),
      utterance,
      tokens,
      target_value: None,
    }
  }

  pub fn with_target(mut self, target: Value) -> Self {
    self.target_value = Some(target);
    self
  }

  pub fn num_tokens(&self) -> usize {
    self.tokens.len()
  }

  /// Tokens in `start..end`, joined by single spaces
  pub fn phrase(&self, start: usize, end: usize) -> String {
    self.tokens[start..end].join(" ")
  }
}

#[test]
fn test_tokenize() {
  let ex = Example::new("q1", "  What is  FIVE plus five ");
  assert_eq!(ex.tokens, vec!["what", "is", "five", "plus", "five"]);
  assert_eq!(ex.phrase(2, 4), "five plus");
  assert!(ex.target_value.is_none());
}
