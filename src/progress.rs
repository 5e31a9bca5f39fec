//! Progress feedback for the bootstrap.
//!
//! The bar is drawn on stderr only when it is a terminal, the run is not
//! quiet (`SCALEVAL_QUIET` or `output.show_progress = false`) and stdout is
//! not carrying a JSON report that a consumer might read interleaved with it.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

pub const TEMPLATE_BOOTSTRAP: &str =
    "{msg} [{bar:30}] {pos}/{len} replicates ({percent}%) - {per_sec} - {eta}";

#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    /// Suppress all progress output
    pub quiet_mode: bool,
}

impl ProgressConfig {
    pub fn from_env(show_progress: bool) -> Self {
        let env_quiet = std::env::var("SCALEVAL_QUIET").is_ok_and(|v| v == "true");
        Self {
            quiet_mode: !show_progress || env_quiet,
        }
    }

    pub fn should_show_progress(&self) -> bool {
        !self.quiet_mode && std::io::stderr().is_terminal()
    }
}

/// Bar for the bootstrap replicates; hidden when progress is off. The
/// length is set when the bootstrap starts.
pub fn bootstrap_bar(config: &ProgressConfig) -> ProgressBar {
    if !config.should_show_progress() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar().template(TEMPLATE_BOOTSTRAP) {
        Ok(style) => pb.set_style(style.progress_chars("=> ")),
        Err(e) => log::debug!("Invalid progress template: {}", e),
    }
    pb.set_message("Bootstrapping network");
    pb
}
