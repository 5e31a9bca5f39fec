//! Orchestration of a study run as typed, composable stages.

pub mod builder;
pub mod stage;
pub mod study;

pub use builder::{BuiltPipeline, PipelineBuilder, StageTiming};
pub use stage::{Stage, StudyStage};
pub use study::{
    assess_validity_stage, confirm, explore, network_stage, prepare_sample, run_study,
    ConfirmedSample, ExploratoryResults, ExploredSample, PreparedSample, StudyReport,
};
