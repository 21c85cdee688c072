use std::io;

use thiserror::Error;

/// Fatal errors. These abort a whole parse request (or grammar/parser
/// construction); per-derivation failures never show up here.
#[derive(Debug, Error)]
pub enum Error {
  /// Malformed grammar text, or a rule shape the chart builder can't apply
  #[error("grammar error: {0}")]
  Grammar(String),

  #[error("config error: {0}")]
  Config(String),

  /// The provenance graph of a pass is supposed to be a DAG
  #[error("cycle in provenance graph at {cell} (denotation #{denotation})")]
  ProvenanceCycle { cell: String, denotation: u32 },

  #[error("parsing worker for the {0} pass panicked")]
  WorkerPanicked(String),

  #[error(transparent)]
  Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
