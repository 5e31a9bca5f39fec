//! The study's stages and the records passed between them.
//!
//! Each record owns everything the later stages need, so a stage's input
//! type states exactly which earlier results must exist before it runs:
//!
//! 1. `()` → [`PreparedSample`]: cleaning, descriptives, split
//! 2. [`PreparedSample`] → [`ExploredSample`]: normality, factorability,
//!    the shared polychoric matrix, factor retention, EFA
//! 3. [`ExploredSample`] → [`ConfirmedSample`]: CFA on the confirmatory half
//! 4. [`ConfirmedSample`] → [`StudyReport`]: reliability and validity
//! 5. [`StudyReport`] → [`StudyReport`]: network dimensionality (optional)

use indicatif::ProgressBar;
use serde::Serialize;

use super::builder::{PipelineBuilder, StageTiming};
use super::stage::StudyStage;
use crate::analysis::{
    assess_factorability, assess_normality, estimate_factor_count, fit_efa, CorrelationMatrix,
    ExploratoryFit, FactorabilityReport, NormalityReport, RetentionReport,
};
use crate::cfa::{fit_cfa, ConfirmatoryFit, MeasurementModel};
use crate::config::StudyConfig;
use crate::data::{
    clean_survey, describe, split_sample, CleaningSummary, DescriptiveReport, ItemResponses,
    SplitSummary, SurveyTable,
};
use crate::errors::Result;
use crate::math::SmoothingReport;
use crate::network::{analyze_network, NetworkReport};
use crate::observability::{set_phase, StudyPhase};
use crate::validity::{assess_validity, ValidityReport};

/// Cleaned, described and split sample.
#[derive(Debug, Clone)]
pub struct PreparedSample {
    pub cleaning: CleaningSummary,
    pub descriptives: DescriptiveReport,
    pub split: SplitSummary,
    pub exploratory: ItemResponses,
    pub confirmatory: ItemResponses,
}

/// Diagnostics computed on the exploratory half.
#[derive(Debug, Clone)]
pub struct ExploratoryResults {
    pub normality: NormalityReport,
    pub factorability: FactorabilityReport,
    /// Shared by retention, EFA and HTMT
    pub correlation: CorrelationMatrix,
    pub retention: RetentionReport,
    pub efa: ExploratoryFit,
}

#[derive(Debug, Clone)]
pub struct ExploredSample {
    pub sample: PreparedSample,
    pub results: ExploratoryResults,
}

#[derive(Debug, Clone)]
pub struct ConfirmedSample {
    pub explored: ExploredSample,
    pub model: MeasurementModel,
    pub confirmatory_smoothing: SmoothingReport,
    pub fit: ConfirmatoryFit,
}

/// Everything a study run produces.
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub cleaning: CleaningSummary,
    pub descriptives: DescriptiveReport,
    pub split: SplitSummary,
    pub normality: NormalityReport,
    pub factorability: FactorabilityReport,
    pub correlation: CorrelationMatrix,
    pub retention: RetentionReport,
    pub efa: ExploratoryFit,
    pub model: MeasurementModel,
    pub confirmatory_smoothing: SmoothingReport,
    pub cfa: ConfirmatoryFit,
    pub validity: ValidityReport,
    pub network: Option<NetworkReport>,
    pub timings: Vec<StageTiming>,
    #[serde(skip)]
    exploratory: ItemResponses,
}

impl StudyReport {
    /// Item responses of the exploratory half.
    pub fn exploratory_items(&self) -> &ItemResponses {
        &self.exploratory
    }
}

pub fn prepare_sample(table: &SurveyTable, config: &StudyConfig) -> Result<PreparedSample> {
    let cleaned = {
        let _phase = set_phase(StudyPhase::Cleaning);
        clean_survey(table, &config.cleaning)?
    };
    log::info!(
        "Retained {} of {} respondents ({} without consent, {} outliers)",
        cleaned.summary.retained,
        cleaned.summary.raw_rows,
        cleaned.summary.excluded_no_consent,
        cleaned.summary.excluded_outliers
    );

    let descriptives = {
        let _phase = set_phase(StudyPhase::Describing);
        describe(&cleaned.table, &cleaned.items, &config.descriptives)?
    };

    let split = {
        let _phase = set_phase(StudyPhase::Splitting);
        split_sample(&cleaned.items, &config.split)?
    };
    log::info!(
        "Split into {} exploratory and {} confirmatory respondents",
        split.exploratory.n_respondents(),
        split.confirmatory.n_respondents()
    );

    Ok(PreparedSample {
        cleaning: cleaned.summary,
        descriptives,
        split: split.summary,
        exploratory: split.exploratory,
        confirmatory: split.confirmatory,
    })
}

pub fn explore(sample: PreparedSample, config: &StudyConfig) -> Result<ExploredSample> {
    let items = &sample.exploratory;
    let normality = assess_normality(items)?;
    let factorability = assess_factorability(items)?;

    let correlation = {
        let _phase = set_phase(StudyPhase::Correlation);
        CorrelationMatrix::polychoric(items, &config.correlation)?
    };
    if correlation.smoothing().applied {
        log::warn!(
            "Exploratory correlations smoothed: {} eigenvalue(s) raised, max change {:.2e}",
            correlation.smoothing().eigenvalues_adjusted,
            correlation.smoothing().max_abs_change
        );
    }

    let retention = {
        let _phase = set_phase(StudyPhase::FactorRetention);
        estimate_factor_count(&correlation, &config.retention)?
    };
    log::info!("Factor retention consensus: {}", retention.consensus);

    let efa = {
        let _phase = set_phase(StudyPhase::ExploratoryFit);
        fit_efa(&correlation, &config.efa)?
    };

    Ok(ExploredSample {
        sample,
        results: ExploratoryResults {
            normality,
            factorability,
            correlation,
            retention,
            efa,
        },
    })
}

pub fn confirm(explored: ExploredSample, config: &StudyConfig) -> Result<ConfirmedSample> {
    let model = MeasurementModel::from_config(&config.model)?;
    let correlation =
        CorrelationMatrix::polychoric(&explored.sample.confirmatory, &config.correlation)?;
    let fit = fit_cfa(&correlation, &model, &config.cfa)?;
    log::info!(
        "Confirmatory model converged after {} iterations (chi2 = {:.3}, df = {})",
        fit.iterations(),
        fit.indices().chi_square,
        fit.indices().df
    );
    for warning in fit.warnings() {
        log::warn!("{}", warning);
    }

    Ok(ConfirmedSample {
        explored,
        model,
        confirmatory_smoothing: correlation.smoothing().clone(),
        fit,
    })
}

/// Requires a converged confirmatory fit, so validity is never computed on
/// a failed model.
pub fn assess_validity_stage(confirmed: ConfirmedSample) -> Result<StudyReport> {
    let ConfirmedSample {
        explored,
        model,
        confirmatory_smoothing,
        fit,
    } = confirmed;
    let ExploredSample { sample, results } = explored;
    let validity = assess_validity(&fit, &results.correlation, &model)?;

    Ok(StudyReport {
        cleaning: sample.cleaning,
        descriptives: sample.descriptives,
        split: sample.split,
        normality: results.normality,
        factorability: results.factorability,
        correlation: results.correlation,
        retention: results.retention,
        efa: results.efa,
        model,
        confirmatory_smoothing,
        cfa: fit,
        validity,
        network: None,
        timings: Vec::new(),
        exploratory: sample.exploratory,
    })
}

/// The empirical network reuses the exploratory polychoric matrix.
pub fn network_stage(
    mut report: StudyReport,
    config: &StudyConfig,
    progress: &ProgressBar,
) -> Result<StudyReport> {
    report.network = Some(analyze_network(
        &report.exploratory,
        Some(&report.correlation),
        &config.network,
        &config.correlation,
        progress,
    )?);
    Ok(report)
}

/// Run every stage on `table`. The network stage runs only when
/// `config.network.enabled`.
pub fn run_study(
    table: SurveyTable,
    config: &StudyConfig,
    progress: ProgressBar,
) -> Result<StudyReport> {
    let (prepare_config, explore_config, confirm_config, network_config) = (
        config.clone(),
        config.clone(),
        config.clone(),
        config.clone(),
    );

    let pipeline = PipelineBuilder::new()
        .stage(StudyStage::new(
            "Prepare sample",
            StudyPhase::Cleaning,
            move |()| prepare_sample(&table, &prepare_config),
        ))
        .stage(StudyStage::new(
            "Exploratory analysis",
            StudyPhase::ExploratoryFit,
            move |sample| explore(sample, &explore_config),
        ))
        .stage(StudyStage::new(
            "Confirmatory fit",
            StudyPhase::ConfirmatoryFit,
            move |explored| confirm(explored, &confirm_config),
        ))
        .stage(StudyStage::new(
            "Reliability and validity",
            StudyPhase::Validity,
            assess_validity_stage,
        ))
        .when(config.network.enabled, |p| {
            p.stage(StudyStage::new(
                "Network dimensionality",
                StudyPhase::Network,
                move |report| network_stage(report, &network_config, &progress),
            ))
        })
        .with_progress()
        .build();

    let (mut report, timings) = pipeline.execute_with_timing()?;
    for timing in &timings {
        log::debug!("{}", timing.format());
    }
    report.timings = timings;
    Ok(report)
}
