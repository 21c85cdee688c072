use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use dpdparser::{Error, Example, Grammar, Params, ParseResult, Parser, ParserConfig, Value};

/// Parses utterances read from stdin into formulas, one per line.
/// Set RUST_LOG (e.g. RUST_LOG=dpdparser=debug) for pass-level logging.
#[derive(clap::Parser)]
#[command(name = "dpdparser", version, about)]
struct Args {
  /// Grammar file
  grammar: PathBuf,

  /// JSON parser config. Flags below override it
  #[arg(long)]
  config: Option<PathBuf>,

  /// Feature weights, one `feature<TAB>weight` per line
  #[arg(long)]
  params: Option<PathBuf>,

  /// Value every utterance should denote, like `10` or `fb:en.paris`
  #[arg(long)]
  target: Option<String>,

  #[arg(long)]
  max_depth: Option<usize>,

  #[arg(long)]
  beam_size: Option<usize>,

  /// Also run a plain beam parse and mix its candidates in
  #[arg(long)]
  backoff: bool,

  /// Look for the target first and only keep what leads to it (needs --target)
  #[arg(long)]
  train: bool,

  /// Print the second pass's chart
  #[arg(long)]
  chart: bool,
}

impl Args {
  fn parser_config(&self) -> Result<ParserConfig, Error> {
    let mut config = match &self.config {
      Some(path) => serde_json::from_str(&fs::read_to_string(path)?)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
      None => ParserConfig::default(),
    };
    if let Some(max_depth) = self.max_depth {
      config.max_depth = max_depth;
    }
    if let Some(beam_size) = self.beam_size {
      config.beam_size = beam_size;
    }
    if self.backoff {
      config.use_backoff = true;
    }
    Ok(config)
  }
}

fn plural(n: usize) -> &'static str {
  if n == 1 { "" } else { "s" }
}

fn print_chart(parser: &Parser, result: &ParseResult) {
  let Some(out) = &result.second_pass else {
    println!("chart: abandoned\n");
    return;
  };

  let mut cells = out.chart.cells().copied().collect::<Vec<_>>();
  cells.sort();
  println!("chart:");
  for cell in cells {
    for meta in out.chart.entries(cell) {
      println!(
        "  {} = {} ({} derivation{})",
        cell.display(parser.grammar()),
        out.table.key(meta.denotation),
        meta.derivations.len(),
        plural(meta.derivations.len())
      );
    }
  }
  println!();
}

fn parse(
  parser: &Parser,
  id: usize,
  sentence: &str,
  target: Option<&Value>,
  train: bool,
  chart: bool,
) -> Result<(), Error> {
  let mut ex = Example::new(format!("stdin:{}", id), sentence);
  if let Some(target) = target {
    ex = ex.with_target(target.clone());
  }

  let result = parser.parse(&ex, train)?;

  if chart {
    print_chart(parser, &result);
  }

  println!(
    "Parsed {} candidate{}",
    result.candidates.len(),
    plural(result.candidates.len())
  );
  for d in result.candidates.iter() {
    let correct = target.is_some_and(|t| parser.compatibility(t, d) == 1.0);
    println!(
      "{} (score {:.3}){}",
      d.formula,
      d.score,
      if correct { " [correct]" } else { "" }
    );
    println!("{}", d.to_tree());
  }
  eprintln!("{}\n", result.stats);

  Ok(())
}

fn main() -> Result<(), Error> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  let target = args.target.as_deref().map(Value::parse_atom);
  if args.train && target.is_none() {
    eprintln!("argument error: --train needs --target");
    process::exit(255);
  }

  let config = args.parser_config()?;
  let grammar = Grammar::read_from_file(&args.grammar)?;
  let params = match &args.params {
    Some(path) => Params::read_from_file(path)?,
    None => Params::new(),
  };
  let parser = Parser::with_params(Arc::new(grammar), config, params)?;

  let mut input = String::new();
  for id in 1.. {
    print!("> ");
    io::stdout().flush()?;

    input.clear();
    if io::stdin().read_line(&mut input)? == 0 {
      // ctrl+d
      break;
    }
    let sentence = input.trim();
    if sentence.is_empty() {
      continue;
    }
    parse(&parser, id, sentence, target.as_ref(), args.train, args.chart)?;
  }

  Ok(())
}
