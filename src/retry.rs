use std::time::Duration;

use anyhow::{Context, Result};

/// Bounded retry with linear backoff for transient external failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// Run `op` up to `max_attempts` times, sleeping `base_delay * attempt`
    /// between failures. Exhaustion returns the last error wrapped in a
    /// "retries exhausted" context.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    eprintln!("[retry] {what} attempt {attempt}/{attempts}: {err:#}");
                    last = Some(err);
                    if attempt < attempts {
                        std::thread::sleep(self.base_delay * attempt);
                    }
                }
            }
        }
        Err(last.expect("at least one attempt"))
            .with_context(|| format!("{what}: retries exhausted after {attempts} attempts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_delay: Duration::ZERO }
    }

    #[test]
    fn first_success_returns_immediately() {
        let mut calls = 0;
        let out = instant(3).run("op", || { calls += 1; Ok(41 + 1) }).unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let mut calls = 0;
        let out = instant(3).run("op", || {
            calls += 1;
            if calls < 3 { Err(anyhow!("transient")) } else { Ok(calls) }
        }).unwrap();
        assert_eq!(out, 3);
    }

    #[test]
    fn zero_attempts_runs_once_and_reports_one() {
        let mut calls = 0;
        let err = instant(0)
            .run::<()>("op", || { calls += 1; Err(anyhow!("boom")) })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(format!("{err:#}").contains("retries exhausted after 1 attempts"));
    }

    #[test]
    fn exhaustion_is_a_distinguishable_error() {
        let mut calls = 0;
        let err = instant(4)
            .run::<()>("snap batch", || { calls += 1; Err(anyhow!("boom")) })
            .unwrap_err();
        assert_eq!(calls, 4);
        assert!(format!("{err:#}").contains("retries exhausted after 4 attempts"));
    }
}
