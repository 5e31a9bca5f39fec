//! Type-state pattern for validating an analysis run before execution
//!
//! An [`AnalyzeConfig<Unvalidated>`] holds only what the command line said.
//! [`AnalyzeConfig::validate`] loads the study configuration, applies the
//! command-line overrides and runs every validation rule; only the
//! resulting [`AnalyzeConfig<Validated>`] can be executed.
//!
//! # Example
//!
//! ```ignore
//! use scaleval::commands::state::{AnalyzeConfig, AnalyzeOverrides};
//!
//! let config = AnalyzeConfig::new(path, None, format, None, AnalyzeOverrides::default(), formatting);
//! // config.execute(); // ERROR: method not found
//! let validated = config.validate()?;
//! validated.execute()?;
//! ```

use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::{load_config, validate_config, StudyConfig};
use crate::formatting::FormattingConfig;
use crate::output::OutputFormat;

/// Marker type representing unvalidated state
#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

/// Marker type representing validated state
#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeOverrides {
    pub no_network: bool,
    pub bootstrap_iterations: Option<usize>,
    pub workers: Option<usize>,
    /// Replaces the split, parallel analysis and bootstrap seeds
    pub seed: Option<u64>,
}

impl AnalyzeOverrides {
    pub fn apply(&self, config: &mut StudyConfig) {
        if self.no_network {
            config.network.enabled = false;
        }
        if let Some(iterations) = self.bootstrap_iterations {
            config.network.bootstrap_iterations = iterations;
        }
        if let Some(workers) = self.workers {
            config.network.workers = workers;
        }
        if let Some(seed) = self.seed {
            config.split.seed = seed;
            config.retention.seed = seed;
            config.network.seed = seed;
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeConfig<State = Unvalidated> {
    pub survey: PathBuf,
    pub config_path: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub overrides: AnalyzeOverrides,
    pub formatting: FormattingConfig,
    /// Resolved study configuration; defaults until validated
    pub study: StudyConfig,

    _state: PhantomData<State>,
}

impl AnalyzeConfig<Unvalidated> {
    pub fn new(
        survey: PathBuf,
        config_path: Option<PathBuf>,
        format: OutputFormat,
        output: Option<PathBuf>,
        overrides: AnalyzeOverrides,
        formatting: FormattingConfig,
    ) -> Self {
        AnalyzeConfig {
            survey,
            config_path,
            format,
            output,
            overrides,
            formatting,
            study: StudyConfig::default(),
            _state: PhantomData,
        }
    }

    /// Load and validate the study configuration with the overrides
    /// applied.
    pub fn validate(self) -> Result<AnalyzeConfig<Validated>> {
        if !self.survey.is_file() {
            anyhow::bail!("Survey file does not exist: {}", self.survey.display());
        }

        let mut study = load_config(self.config_path.as_deref())?;
        self.overrides.apply(&mut study);
        validate_config(&study).context("Invalid configuration after command-line overrides")?;

        Ok(AnalyzeConfig {
            survey: self.survey,
            config_path: self.config_path,
            format: self.format,
            output: self.output,
            overrides: self.overrides,
            formatting: self.formatting,
            study,
            _state: PhantomData,
        })
    }
}

impl AnalyzeConfig<Validated> {
    /// Execute the analysis with validated configuration
    pub fn execute(self) -> Result<()> {
        super::analyze::run_analysis(self)
    }
}
