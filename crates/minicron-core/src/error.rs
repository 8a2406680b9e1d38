//! Cron expression errors.

use thiserror::Error;

/// Errors produced while parsing or evaluating a cron expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    /// Expression is malformed or contains out-of-range values.
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    /// Expression parses but never matches a future instant.
    #[error("cron expression '{0}' never matches within the search horizon")]
    Unschedulable(String),
}

impl CronError {
    /// Build an `InvalidExpression` error.
    pub fn invalid(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        CronError::InvalidExpression {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_expression_display() {
        let err = CronError::invalid("99 * * * *", "minute 99 out of range");
        let display = err.to_string();
        assert!(display.contains("99 * * * *"));
        assert!(display.contains("out of range"));
    }

    #[test]
    fn test_unschedulable_display() {
        let err = CronError::Unschedulable("0 0 30 2 *".to_string());
        assert!(err.to_string().contains("never matches"));
    }
}
