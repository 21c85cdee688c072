use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Cooperative cancellation flag, checked by workers between units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// What came back from a supervised worker
#[derive(Debug)]
pub struct Supervised<T> {
  /// `None` if the worker never acknowledged cancellation and was abandoned
  pub output: Option<T>,
  pub timed_out: bool,
}

/// Runs `work` on a dedicated thread. If it hasn't finished by `deadline`, it
/// is asked to stop and given `grace` to hand back whatever it has.
pub fn run_with_deadline<T, F>(
  name: &str,
  deadline: Duration,
  grace: Duration,
  work: F,
) -> Result<Supervised<T>>
where
  T: Send + 'static,
  F: FnOnce(CancellationToken) -> T + Send + 'static,
{
  let token = CancellationToken::new();
  let (tx, rx) = mpsc::channel();

  let worker_token = token.clone();
  let handle = thread::Builder::new()
    .name(format!("dpd-{}", name))
    .spawn(move || {
      let output = work(worker_token);
      // the receiver is gone if we were abandoned; nobody wants the result then
      let _ = tx.send(output);
    })?;

  let (output, timed_out) = match rx.recv_timeout(deadline) {
    Ok(output) => (Some(output), false),
    Err(RecvTimeoutError::Disconnected) => {
      return Err(Error::WorkerPanicked(name.to_string()));
    }
    Err(RecvTimeoutError::Timeout) => {
      debug!(pass = name, ?deadline, "deadline passed, cancelling");
      token.cancel();
      match rx.recv_timeout(grace) {
        Ok(output) => (Some(output), true),
        Err(RecvTimeoutError::Disconnected) => {
          return Err(Error::WorkerPanicked(name.to_string()));
        }
        Err(RecvTimeoutError::Timeout) => {
          warn!(pass = name, ?grace, "worker ignored cancellation, abandoning it");
          return Ok(Supervised {
            output: None,
            timed_out: true,
          });
        }
      }
    }
  };

  if handle.join().is_err() {
    return Err(Error::WorkerPanicked(name.to_string()));
  }

  Ok(Supervised { output, timed_out })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Instant;

  #[test]
  fn test_finishes_in_time() {
    let result = run_with_deadline("quick", Duration::from_secs(5), Duration::from_secs(1), |_| 42)
      .unwrap();
    assert_eq!(result.output, Some(42));
    assert!(!result.timed_out);
  }

  #[test]
  fn test_cooperative_cancellation() {
    let result = run_with_deadline(
      "slow",
      Duration::from_millis(20),
      Duration::from_secs(5),
      |token| {
        let mut steps = 0;
        while !token.is_cancelled() {
          steps += 1;
          thread::sleep(Duration::from_millis(1));
        }
        steps
      },
    )
    .unwrap();
    assert!(result.timed_out);
    assert!(result.output.is_some());
  }

  #[test]
  fn test_abandons_stubborn_worker() {
    let start = Instant::now();
    let result = run_with_deadline(
      "stubborn",
      Duration::from_millis(10),
      Duration::from_millis(10),
      |_| thread::sleep(Duration::from_millis(300)),
    )
    .unwrap();
    assert!(result.timed_out);
    assert!(result.output.is_none());
    assert!(start.elapsed() < Duration::from_millis(300));
  }

  #[test]
  fn test_panicking_worker() {
    let deadline = Duration::from_secs(5);
    let grace = Duration::from_secs(1);
    let result = run_with_deadline::<(), _>("broken", deadline, grace, |_| panic!("boom"));
    assert!(matches!(result, Err(Error::WorkerPanicked(name)) if name == "broken"));
  }
}
