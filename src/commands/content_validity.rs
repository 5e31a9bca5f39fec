use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::load_config;
use crate::content_validity::{content_validity, read_ratings};
use crate::data::SurveyTable;
use crate::formatting::FormattingConfig;
use crate::observability::{set_input_file, set_phase, StudyPhase};
use crate::output::{output_content_validity, OutputFormat};

#[derive(Debug, Clone)]
pub struct ContentValidityArgs {
    pub ratings: PathBuf,
    pub config_path: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub formatting: FormattingConfig,
}

pub fn handle_content_validity(args: ContentValidityArgs) -> Result<()> {
    let config = load_config(args.config_path.as_deref())?;
    let _input = set_input_file(&args.ratings);
    let _phase = set_phase(StudyPhase::ContentValidity);

    let table = SurveyTable::from_path(&args.ratings, config.data.delimiter)
        .with_context(|| format!("Failed to read ratings {}", args.ratings.display()))?;
    let ratings = read_ratings(&table, &config.content_validity)?;
    let report = content_validity(&ratings, &config.content_validity)?;
    log::info!(
        "{} of {} items adequate",
        report.n_adequate(),
        report.items.len()
    );

    output_content_validity(
        &report,
        args.format,
        args.output,
        config.output.decimals,
        args.formatting,
    )
}
