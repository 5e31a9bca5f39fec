//! Crash reports and run context.
//!
//! ## Features
//!
//! - **Panic Hook**: Produces a structured crash report naming the study
//!   phase that was running
//! - **Context Tracking**: Thread-local phase and input file tracking
//! - **Progress Tracking**: Atomic counters for bootstrap replicates
//!
//! ## Usage
//!
//! ```ignore
//! use scaleval::observability::{install_panic_hook, set_phase, StudyPhase};
//!
//! fn main() {
//!     install_panic_hook();
//!     let _phase = set_phase(StudyPhase::Cleaning);
//!     // If a panic occurs here, the crash report shows the cleaning phase
//! }
//! ```

pub mod context;
pub mod panic_hook;

pub use context::{
    get_current_context, get_progress, increment_processed, reset_progress, set_input_file,
    set_phase, set_progress, ContextGuard, StudyContext, StudyPhase,
};
pub use panic_hook::install_panic_hook;
