use anyhow::{Context, Result};

use super::state::{AnalyzeConfig, Validated};
use crate::data::SurveyTable;
use crate::observability::{set_input_file, set_phase, StudyPhase};
use crate::output::{output_study, OutputFormat};
use crate::pipeline::run_study;
use crate::progress::{bootstrap_bar, ProgressConfig};

pub fn handle_analyze(config: AnalyzeConfig) -> Result<()> {
    config.validate()?.execute()
}

pub(super) fn run_analysis(config: AnalyzeConfig<Validated>) -> Result<()> {
    let _input = set_input_file(&config.survey);
    let table = {
        let _phase = set_phase(StudyPhase::Loading);
        SurveyTable::from_path(&config.survey, config.study.data.delimiter)
            .with_context(|| format!("Failed to read survey {}", config.survey.display()))?
    };
    log::info!(
        "Loaded {} rows and {} columns from {}",
        table.n_rows(),
        table.headers().len(),
        config.survey.display()
    );

    // Keep stdout clean for JSON consumers
    let show_progress =
        config.study.output.show_progress && config.format != OutputFormat::Json;
    let progress = bootstrap_bar(&ProgressConfig::from_env(show_progress));

    let report = run_study(table, &config.study, progress)?;

    let _phase = set_phase(StudyPhase::OutputGeneration);
    output_study(
        &report,
        config.format,
        config.output,
        config.study.output.decimals,
        config.formatting,
    )
}
