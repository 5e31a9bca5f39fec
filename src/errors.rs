//! Unified error types for scale validation runs.
//!
//! Every fallible operation in the library returns [`StudyError`]. The
//! variants separate the failure classes a study run has to tell apart:
//!
//! - **Data shape** problems (missing columns, non-numeric item values) are
//!   raised before any statistic is computed.
//! - **Degenerate inputs** (zero-variance items, singular matrices) are
//!   reported instead of being silently repaired.
//! - **Fit failures** carry the model that failed and why, so a non-converged
//!   model is never confused with a converged model that fits poorly.
//!
//! # Example
//!
//! ```rust
//! use scaleval::errors::{FitFailureReason, FitModel, StudyError};
//!
//! let err = StudyError::fit_failure(
//!     FitModel::Cfa,
//!     FitFailureReason::NotConverged { iterations: 500, objective: 12.5 },
//! );
//! assert!(err.is_fit_failure());
//! assert_eq!(err.category(), "Fit");
//! ```

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scaleval operations
#[derive(Debug, Error)]
pub enum StudyError {
    /// File system related errors
    #[error("I/O error: {message}{}", display_path(.path))]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<io::Error>,
    },

    /// Missing, misnamed or mistyped input columns
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inputs a statistic is undefined for
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Measurement model that cannot be estimated against the data
    #[error("Model specification error: {0}")]
    ModelSpecification(String),

    /// Iterative estimation that did not produce an admissible solution
    #[error("{model} fit failed: {reason}")]
    FitFailure {
        model: FitModel,
        reason: FitFailureReason,
    },

    /// Error raised inside a pipeline stage
    #[error("Failed in stage '{stage}': {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<StudyError>,
    },

    /// Generic analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// CSV decoding errors
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML decoding errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Model whose estimation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitModel {
    /// Exploratory factor extraction
    Efa,
    /// Confirmatory measurement model
    Cfa,
    /// Regularised partial-correlation network
    Network,
}

impl fmt::Display for FitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Efa => write!(f, "Exploratory factor model"),
            Self::Cfa => write!(f, "Confirmatory factor model"),
            Self::Network => write!(f, "Network model"),
        }
    }
}

/// Why an estimation routine gave up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FitFailureReason {
    /// Iteration budget exhausted before the convergence criterion was met
    NotConverged { iterations: usize, objective: f64 },
    /// A matrix that must be positive definite is not
    NonPositiveDefinite { matrix: String },
    /// No candidate solution was admissible
    NoAdmissibleSolution { detail: String },
}

impl fmt::Display for FitFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged {
                iterations,
                objective,
            } => write!(
                f,
                "did not converge after {} iterations (objective {:.6})",
                iterations, objective
            ),
            Self::NonPositiveDefinite { matrix } => {
                write!(f, "{} is not positive definite", matrix)
            }
            Self::NoAdmissibleSolution { detail } => {
                write!(f, "no admissible solution: {}", detail)
            }
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" (path: {})", p.display()))
        .unwrap_or_default()
}

impl StudyError {
    /// Create an I/O error with path context.
    pub fn io_with_path(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            message: source.to_string(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Create a data shape error.
    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a degenerate input error.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateInput(message.into())
    }

    /// Create a model specification error.
    pub fn model_spec(message: impl Into<String>) -> Self {
        Self::ModelSpecification(message.into())
    }

    /// Create a fit failure error.
    pub fn fit_failure(model: FitModel, reason: FitFailureReason) -> Self {
        Self::FitFailure { model, reason }
    }

    /// Create a generic analysis error.
    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis(message.into())
    }

    /// Wrap this error with the name of the stage that raised it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage wrappers.
    pub fn root(&self) -> &StudyError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error reports a failed model estimation.
    pub fn is_fit_failure(&self) -> bool {
        matches!(self.root(), Self::FitFailure { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self.root() {
            Self::Io { .. } => "I/O",
            Self::DataShape(_) | Self::Csv(_) => "Data",
            Self::Config(_) | Self::Toml(_) => "Config",
            Self::DegenerateInput(_) => "Degenerate",
            Self::ModelSpecification(_) => "Model",
            Self::FitFailure { .. } => "Fit",
            Self::Json(_) => "Output",
            Self::Analysis(_) | Self::Stage { .. } => "Analysis",
        }
    }

    /// Whether the user can fix the problem by changing inputs or config.
    ///
    /// Fit failures and degenerate inputs describe the data itself; the
    /// remaining categories point at files, columns or settings.
    pub fn is_user_fixable(&self) -> bool {
        matches!(
            self.root(),
            Self::DataShape(_)
                | Self::Csv(_)
                | Self::Config(_)
                | Self::Toml(_)
                | Self::ModelSpecification(_)
                | Self::Io { .. }
        )
    }
}

impl From<io::Error> for StudyError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

// Needed for pipeline stages that can never fail (pure functions)
impl From<std::convert::Infallible> for StudyError {
    fn from(infallible: std::convert::Infallible) -> Self {
        match infallible {}
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, StudyError>;

/// Format a list of errors for display.
///
/// ```rust
/// use scaleval::errors::{format_error_list, StudyError};
///
/// let errors = vec![
///     StudyError::config("split.seed must be set"),
///     StudyError::data_shape("column 'consent' missing"),
/// ];
/// let formatted = format_error_list(&errors);
/// assert!(formatted.contains("1. Configuration error"));
/// assert!(formatted.contains("2. Data shape error"));
/// ```
pub fn format_error_list(errors: &[StudyError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("  {}. {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("\n")
}
