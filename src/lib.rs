//! Psychometric validation of survey scales.
//!
//! A study run cleans a survey export, splits it into exploratory and
//! confirmatory halves, and reports the evidence a validation paper needs:
//! polychoric EFA with factor retention, a DWLS confirmatory fit,
//! reliability and discriminant validity, and the bootstrap stability of
//! the item network's dimensions. Content validity from expert judges is a
//! separate entry point.
//!
//! ```rust,no_run
//! use indicatif::ProgressBar;
//! use scaleval::config::StudyConfig;
//! use scaleval::data::SurveyTable;
//! use scaleval::pipeline::run_study;
//!
//! let table = SurveyTable::from_path("survey.csv".as_ref(), ',')?;
//! let report = run_study(table, &StudyConfig::default(), ProgressBar::hidden())?;
//! println!("CFI = {:.3}", report.cfa.indices().cfi);
//! # Ok::<(), scaleval::errors::StudyError>(())
//! ```

pub mod analysis;
pub mod cfa;
pub mod cli;
pub mod commands;
pub mod config;
pub mod content_validity;
pub mod data;
pub mod errors;
pub mod formatting;
pub mod math;
pub mod network;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod validity;

pub use crate::config::StudyConfig;
pub use crate::errors::{Result, StudyError};
pub use crate::pipeline::{run_study, StudyReport};
