//! Bounded retry for optimistic writes.

use cultivation_common::{CultivationError, CultivationResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before a conflict is surfaced (at least 1).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Runs `op` until it succeeds, fails with a non-conflict error, or the
/// attempts run out. The surfaced conflict carries the attempt count.
pub fn retry_on_conflict<T>(
    policy: RetryPolicy,
    operation: &str,
    mut op: impl FnMut(u32) -> CultivationResult<T>,
) -> CultivationResult<T> {
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Err(CultivationError::Conflict(mut conflict)) => {
                if attempt >= max {
                    conflict.attempts = attempt;
                    warn!("{} gave up after {} conflicting attempts", operation, attempt);
                    return Err(conflict.into());
                }
                warn!(
                    "{} conflicted (expected v{}, found v{}), retrying",
                    operation, conflict.expected, conflict.actual
                );
                attempt += 1;
            },
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_common::{ConcurrencyConflict, InvalidRecipeError};

    fn conflict() -> CultivationError {
        ConcurrencyConflict {
            expected: 1,
            actual: 2,
            attempts: 1,
        }
        .into()
    }

    #[test]
    fn test_succeeds_after_conflicts() {
        let result = retry_on_conflict(RetryPolicy::default(), "test", |attempt| {
            if attempt < 3 {
                Err(conflict())
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_gives_up_with_attempt_count() {
        let mut calls = 0;
        let result: CultivationResult<()> = retry_on_conflict(RetryPolicy::default(), "test", |_| {
            calls += 1;
            Err(conflict())
        });
        assert_eq!(calls, 5);
        assert!(matches!(
            result,
            Err(CultivationError::Conflict(ConcurrencyConflict { attempts: 5, .. }))
        ));
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mut calls = 0;
        let result: CultivationResult<()> = retry_on_conflict(RetryPolicy::default(), "test", |_| {
            calls += 1;
            Err(InvalidRecipeError::NoMaterials.into())
        });
        assert_eq!(calls, 1);
        assert!(result.is_err());
    }
}
