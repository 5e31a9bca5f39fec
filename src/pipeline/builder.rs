//! Type-checked chaining of study stages.

use super::stage::{AnyStage, Stage};
use crate::errors::{Result, StudyError};
use crate::observability::set_phase;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Builder for a pipeline whose latest record type is `T`.
///
/// ```rust,ignore
/// let pipeline = PipelineBuilder::new()
///     .stage(prepare)   // -> PreparedSample
///     .stage(explore)   // PreparedSample -> ExploredSample
///     .when(network_enabled, |p| p.stage(network))
///     .build();
/// ```
pub struct PipelineBuilder<T> {
    stages: Vec<Box<dyn AnyStage>>,
    log_stages: bool,
    _record: PhantomData<T>,
}

impl PipelineBuilder<()> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            log_stages: false,
            _record: PhantomData,
        }
    }
}

impl Default for PipelineBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PipelineBuilder<T> {
    pub fn stage<S>(mut self, stage: S) -> PipelineBuilder<S::Output>
    where
        S: Stage<Input = T> + Send + Sync + 'static,
        S::Input: 'static,
        S::Output: 'static,
    {
        self.stages.push(Box::new(stage));
        PipelineBuilder {
            stages: self.stages,
            log_stages: self.log_stages,
            _record: PhantomData,
        }
    }

    /// Stages added by `f` run only when `condition` holds; they must
    /// return the record type they receive.
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Log `Stage i/n: name` at info level as each stage starts.
    pub fn with_progress(mut self) -> Self {
        self.log_stages = true;
        self
    }

    pub fn build(self) -> BuiltPipeline<T> {
        BuiltPipeline {
            stages: self.stages,
            log_stages: self.log_stages,
            _record: PhantomData,
        }
    }
}

pub struct BuiltPipeline<T> {
    stages: Vec<Box<dyn AnyStage>>,
    log_stages: bool,
    _record: PhantomData<T>,
}

fn quiet() -> bool {
    std::env::var("SCALEVAL_QUIET").is_ok_and(|v| v == "true")
}

impl<T: 'static> BuiltPipeline<T> {
    pub fn execute(&self) -> Result<T> {
        self.execute_with_timing().map(|(record, _)| record)
    }

    /// Run the stages in order, each inside its phase. The first failure
    /// stops the run and is wrapped with the stage's name.
    pub fn execute_with_timing(&self) -> Result<(T, Vec<StageTiming>)> {
        let total = self.stages.len();
        let log_stages = self.log_stages && !quiet();
        let mut record: Box<dyn Any> = Box::new(());
        let mut timings = Vec::with_capacity(total);

        for (i, stage) in self.stages.iter().enumerate() {
            if log_stages {
                log::info!("Stage {}/{}: {}", i + 1, total, stage.name());
            }
            let _phase = set_phase(stage.phase());
            let started = Instant::now();
            record = stage
                .run_any(record)
                .map_err(|e| e.in_stage(stage.name()))?;
            timings.push(StageTiming {
                name: stage.name().to_string(),
                duration: started.elapsed(),
            });
        }

        let record = record
            .downcast::<T>()
            .map_err(|_| StudyError::analysis("pipeline finished with an unexpected record"))?;
        Ok((*record, timings))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Wall-clock time of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub name: String,
    #[serde(rename = "seconds", serialize_with = "serialize_seconds")]
    pub duration: Duration,
}

impl StageTiming {
    pub fn format(&self) -> String {
        format!("{}: {:.2}s", self.name, self.duration.as_secs_f64())
    }
}

fn serialize_seconds<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
