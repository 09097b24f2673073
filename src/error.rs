//! Crate-wide error type.
//!
//! Each subsystem owns a focused `thiserror` enum; this type wraps them for
//! callers that cross subsystem boundaries (the orchestrator, the CLI).

use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::config::ConfigError;
use crate::edge_types::EdgeTypeError;
use crate::export::ExportError;
use crate::graph::GraphError;
use crate::identifier::IdentifierError;
use crate::inference::InferenceError;
use crate::namespace::OrchestratorError;
use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum DepLinkerError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    EdgeType(#[from] EdgeTypeError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DepLinkerResult<T> = Result<T, DepLinkerError>;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single structured diagnostic produced by a per-item fallible operation
/// (file analysis, match processing). Diagnostics never abort a batch
/// operation; they accumulate alongside the results bundle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub file: Option<String>,
    pub position: Option<(u32, u32)>,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            file: None,
            position: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            file: None,
            position: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.position = Some((line, column));
        self
    }
}
