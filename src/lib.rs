#[macro_use]
extern crate lazy_static;

pub mod cell;
pub mod chart;
pub mod closure;
pub mod config;
pub mod denotation;
pub mod derivation;
pub mod error;
pub mod evaluate;
pub mod example;
pub mod execute;
pub mod formula;
pub mod grammar;
pub mod parse_grammar;
pub mod parser;
pub mod prune;
pub mod rules;
pub mod score;
pub mod semantics;
pub mod stats;
pub mod supervisor;
pub mod syntree;
pub mod value;

pub(crate) mod builder;
pub(crate) mod engine;

pub use crate::builder::PassOutput;
pub use crate::config::ParserConfig;
pub use crate::derivation::Derivation;
pub use crate::engine::Pass;
pub use crate::error::{Error, Result};
pub use crate::example::Example;
pub use crate::grammar::Grammar;
pub use crate::parser::{ParseResult, Parser, Services};
pub use crate::score::Params;
pub use crate::value::Value;
