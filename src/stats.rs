use std::fmt;
use std::time::Duration;

/// Counters for one chart-building pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
  pub cells: usize,
  /// visible (cell, denotation) entries
  pub denotations: usize,
  pub error_denotations: usize,
  pub derivations: usize,
  pub rule_applications: usize,
  /// applications whose ingredient the first pass never saw
  pub disallowed: usize,
  pub anchor_overlaps: usize,
  pub pruned: usize,
  /// denotations hidden by the first-pass beam, or derivations cut by the
  /// second-pass beam
  pub beam_dropped: usize,
  pub hit_chart_ceiling: bool,
  pub timed_out: bool,
  /// the worker never answered and its chart was thrown away
  pub abandoned: bool,
  pub elapsed: Duration,
}

impl fmt::Display for PassStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} cells, {} denotations ({} errors), {} derivations, {} applications in {:?}",
      self.cells,
      self.denotations,
      self.error_denotations,
      self.derivations,
      self.rule_applications,
      self.elapsed
    )?;
    if self.hit_chart_ceiling {
      write!(f, " [chart ceiling]")?;
    }
    if self.abandoned {
      write!(f, " [abandoned]")?;
    } else if self.timed_out {
      write!(f, " [timed out]")?;
    }
    Ok(())
  }
}

/// Everything measured while answering one parse request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseStats {
  pub first: Option<PassStats>,
  pub second: PassStats,
  pub backoff: Option<PassStats>,
  /// root entries whose denotation matched the target in the first pass
  pub oracle_roots: usize,
  pub allowed_ingredients: usize,
  pub candidates: usize,
}

impl ParseStats {
  pub fn timed_out(&self) -> bool {
    self.first.iter().chain(Some(&self.second)).chain(self.backoff.iter()).any(|s| s.timed_out)
  }
}

impl fmt::Display for ParseStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(first) = &self.first {
      writeln!(f, "first pass: {}", first)?;
      writeln!(
        f,
        "oracle: {} root entries, {} allowed ingredients",
        self.oracle_roots, self.allowed_ingredients
      )?;
    }
    writeln!(f, "second pass: {}", self.second)?;
    if let Some(backoff) = &self.backoff {
      writeln!(f, "backoff: {}", backoff)?;
    }
    write!(f, "{} candidates", self.candidates)
  }
}
