//! Non-fatal warnings collected while building and analysing a profile.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedLine,
    UnexpectedLine,
    DuplicateFunction,
    DuplicateCall,
    UndefinedCallee,
    MissingCallCost,
    UnknownCostEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }
}

/// Installs a stderr `fmt` subscriber filtered by `directive` (e.g. `grindgraph=debug`).
///
/// `RUST_LOG` wins when set. Returns `false` if a global subscriber already exists.
pub fn init_tracing(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_serializes_snake_case_kind() {
        let d = Diagnostic::new(DiagnosticKind::MalformedLine, Some(7), "bad cost line");
        let json = serde_json::to_value(&d).expect("json");
        assert_eq!(json["kind"], "malformed_line");
        assert_eq!(json["line"], 7);

        let no_line = Diagnostic::new(DiagnosticKind::UndefinedCallee, None, "x");
        let json = serde_json::to_value(&no_line).expect("json");
        assert!(json.get("line").is_none());
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing("grindgraph=warn");
        assert!(tracing::dispatcher::has_been_set());
        assert!(!init_tracing("grindgraph=warn"));
    }
}
