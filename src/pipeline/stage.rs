//! Stages of a study run.
//!
//! A stage turns the previous stage's record into the next one and names
//! the [`StudyPhase`] it belongs to, so a crash or error inside it is
//! attributed to that phase. Stages only chain when the record types line
//! up: validity cannot be assessed before a confirmatory fit exists.
//!
//! ```rust,ignore
//! prepare          // (),              -> PreparedSample
//!   .then(explore) // PreparedSample   -> ExploredSample
//!   .then(assess)  // ConfirmedSample  - compile error!
//! ```

use crate::errors::{Result, StudyError};
use crate::observability::StudyPhase;
use std::any::Any;
use std::marker::PhantomData;

pub trait Stage {
    type Input;
    type Output;

    fn run(&self, input: Self::Input) -> Result<Self::Output>;

    /// Shown in `Stage i/n` logs, timings and error context.
    fn name(&self) -> &str;

    fn phase(&self) -> StudyPhase;
}

/// A named step backed by a closure.
///
/// ```rust,ignore
/// let stage = StudyStage::new("Confirmatory fit", StudyPhase::ConfirmatoryFit, |explored| {
///     confirm(explored, &config)
/// });
/// ```
pub struct StudyStage<F, I, O> {
    name: String,
    phase: StudyPhase,
    func: F,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<F, I, O> StudyStage<F, I, O>
where
    F: Fn(I) -> Result<O>,
{
    pub fn new(name: impl Into<String>, phase: StudyPhase, func: F) -> Self {
        Self {
            name: name.into(),
            phase,
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, I, O> Stage for StudyStage<F, I, O>
where
    F: Fn(I) -> Result<O>,
{
    type Input = I;
    type Output = O;

    fn run(&self, input: I) -> Result<O> {
        (self.func)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> StudyPhase {
        self.phase
    }
}

/// Object-safe view of a stage, so stages with different record types can
/// share one list.
pub(crate) trait AnyStage: Send + Sync {
    fn run_any(&self, input: Box<dyn Any>) -> Result<Box<dyn Any>>;
    fn name(&self) -> &str;
    fn phase(&self) -> StudyPhase;
}

impl<S> AnyStage for S
where
    S: Stage + Send + Sync,
    S::Input: 'static,
    S::Output: 'static,
{
    fn run_any(&self, input: Box<dyn Any>) -> Result<Box<dyn Any>> {
        let record = input.downcast::<S::Input>().map_err(|_| {
            let name = Stage::name(self);
            StudyError::analysis(format!("stage '{}' received the wrong record", name))
        })?;
        Ok(Box::new(self.run(*record)?))
    }

    fn name(&self) -> &str {
        Stage::name(self)
    }

    fn phase(&self) -> StudyPhase {
        Stage::phase(self)
    }
}
