//! Crate-wide error types.

use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A metric was read before any pass set it.
    #[error("unspecified event {event}")]
    UndefinedEvent { event: &'static str },

    #[error("event {event} cannot be aggregated")]
    NonAggregable { event: &'static str },

    /// The trace cannot be read any further.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An analysis invariant did not hold; the graph must not be used.
    #[error("internal consistency failure: {0}")]
    Consistency(String),
}

impl GraphError {
    pub fn is_undefined_event(&self) -> bool {
        matches!(self, Self::UndefinedEvent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_line_number() {
        let err = GraphError::Parse {
            line: 42,
            message: "missing events: declaration".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error at line 42: missing events: declaration"
        );
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn read() -> GraphResult<()> {
            Err(std::io::Error::other("boom"))?;
            Ok(())
        }
        match read().expect_err("must fail") {
            GraphError::Io(err) => assert_eq!(err.to_string(), "boom"),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn undefined_event_is_classified() {
        let err = GraphError::UndefinedEvent { event: "Total time ratio" };
        assert!(err.is_undefined_event());
        assert!(err.to_string().contains("Total time ratio"));
        assert!(!GraphError::Consistency("x".to_string()).is_undefined_event());
    }
}
