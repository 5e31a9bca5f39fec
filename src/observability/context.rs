//! Thread-local context tracking for crash reports.
//!
//! Each thread keeps its own context (via `thread_local!`), so bootstrap
//! workers on the rayon pool do not overwrite the main thread's phase.
//! Replicate progress is global and kept in atomic counters.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static REPLICATES_DONE: AtomicUsize = AtomicUsize::new(0);
static REPLICATES_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<StudyContext> = const { RefCell::new(StudyContext::new()) };
}

/// What the current thread was doing.
#[derive(Debug, Clone, Default)]
pub struct StudyContext {
    pub phase: Option<StudyPhase>,
    /// Input file being processed
    pub input_file: Option<PathBuf>,
}

impl StudyContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            input_file: None,
        }
    }
}

/// Major steps of a study run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyPhase {
    Loading,
    Cleaning,
    Describing,
    Splitting,
    Correlation,
    FactorRetention,
    ExploratoryFit,
    ConfirmatoryFit,
    Validity,
    Network,
    Bootstrap,
    ContentValidity,
    OutputGeneration,
}

impl std::fmt::Display for StudyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Cleaning => "cleaning",
            Self::Describing => "describing",
            Self::Splitting => "splitting",
            Self::Correlation => "correlation",
            Self::FactorRetention => "factor_retention",
            Self::ExploratoryFit => "exploratory_fit",
            Self::ConfirmatoryFit => "confirmatory_fit",
            Self::Validity => "validity",
            Self::Network => "network",
            Self::Bootstrap => "bootstrap",
            Self::ContentValidity => "content_validity",
            Self::OutputGeneration => "output_generation",
        };
        f.write_str(name)
    }
}

/// RAII guard restoring the previous context on drop.
pub struct ContextGuard {
    previous: StudyContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

/// Set the current phase until the returned guard drops.
#[must_use]
pub fn set_phase(phase: StudyPhase) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        ctx.borrow_mut().phase = Some(phase);
        ContextGuard { previous }
    })
}

/// Set the input file until the returned guard drops.
#[must_use]
pub fn set_input_file(path: impl Into<PathBuf>) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        ctx.borrow_mut().input_file = Some(path.into());
        ContextGuard { previous }
    })
}

pub fn set_progress(done: usize, total: usize) {
    REPLICATES_DONE.store(done, Ordering::Relaxed);
    REPLICATES_TOTAL.store(total, Ordering::Relaxed);
}

/// Thread-safe; called from bootstrap workers.
pub fn increment_processed() {
    REPLICATES_DONE.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn get_current_context() -> StudyContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Bootstrap replicates (done, total).
#[must_use]
pub fn get_progress() -> (usize, usize) {
    (
        REPLICATES_DONE.load(Ordering::Relaxed),
        REPLICATES_TOTAL.load(Ordering::Relaxed),
    )
}

pub fn reset_progress() {
    set_progress(0, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_context() {
        CURRENT_CONTEXT.with(|ctx| *ctx.borrow_mut() = StudyContext::new());
    }

    #[test]
    fn test_context_guard_restores_previous() {
        reset_context();

        let _outer = set_phase(StudyPhase::Cleaning);
        {
            let _inner = set_phase(StudyPhase::Bootstrap);
            assert_eq!(get_current_context().phase, Some(StudyPhase::Bootstrap));
        }
        assert_eq!(get_current_context().phase, Some(StudyPhase::Cleaning));
    }

    #[test]
    fn test_phase_and_file_together() {
        reset_context();

        let _phase = set_phase(StudyPhase::Loading);
        let _file = set_input_file("/data/survey.csv");
        let ctx = get_current_context();
        assert_eq!(ctx.phase, Some(StudyPhase::Loading));
        assert_eq!(ctx.input_file, Some(PathBuf::from("/data/survey.csv")));
    }

    #[test]
    fn test_context_is_per_thread() {
        reset_context();

        let _phase = set_phase(StudyPhase::Network);
        let other = std::thread::spawn(|| get_current_context().phase)
            .join()
            .unwrap();
        assert_eq!(other, None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(StudyPhase::ConfirmatoryFit.to_string(), "confirmatory_fit");
        assert_eq!(StudyPhase::Bootstrap.to_string(), "bootstrap");
    }
}
