//! The error taxonomy: temporal-spec parse failures, scheduling
//! rejections, lookup misses, and the interruptions surfaced inside
//! workers.

use thiserror::Error;

/// Everything that can fail when parsing a temporal spec, scheduling a
/// job, or running one.
#[derive(Debug, Error)]
pub enum Error {
    /// A duration string did not match the accepted grammar.
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    /// A cron expression could not be parsed, or can never fire.
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron {
        /// The offending expression.
        expr: String,
        /// What made it invalid.
        reason: String,
    },
    /// A point-in-time string could not be parsed.
    #[error("invalid time string {0:?}")]
    InvalidTimeString(String),
    /// A scheduling call carried bad options or an unusable spec.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No job with the given id is known to the scheduler.
    #[error("job not found: {0}")]
    NotFound(String),
    /// A running job execution exceeded its timeout and was interrupted.
    #[error("job execution timed out")]
    Timeout,
    /// A running job execution was forcibly interrupted.
    #[error("job execution killed")]
    Killed,
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-facing result using anyhow for user callables and hooks.
pub type AppResult<T> = std::result::Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_offending_input() {
        let err = Error::InvalidDuration("1x".into());
        assert_eq!(err.to_string(), "invalid duration \"1x\"");

        let err = Error::InvalidCron {
            expr: "0 0 30 2 *".into(),
            reason: "no matching time within four years".into(),
        };
        assert!(err.to_string().contains("0 0 30 2 *"));

        let err = Error::NotFound("every-7".into());
        assert_eq!(err.to_string(), "job not found: every-7");
    }
}
