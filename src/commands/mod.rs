//! CLI command implementations for scaleval.
//!
//! Available commands:
//! - **analyze**: Run the full validation study on a survey export
//! - **content-validity**: Aiken's V from a table of expert judge ratings
//! - **init**: Write a default `.scaleval.toml`
//!
//! The analyze command follows a type-state pattern, so only a validated
//! configuration can be executed.

pub mod analyze;
pub mod content_validity;
pub mod init;
pub mod state;

pub use analyze::handle_analyze;
pub use content_validity::{handle_content_validity, ContentValidityArgs};
pub use init::init_config;
pub use state::{AnalyzeConfig, AnalyzeOverrides, Unvalidated, Validated};
