pub mod json;
pub mod markdown;
pub mod sections;
pub mod terminal;

use crate::content_validity::ContentValidityReport;
use crate::formatting::FormattingConfig;
use crate::pipeline::StudyReport;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::path::{Path, PathBuf};

pub use json::output_json;
pub use markdown::render_markdown;
pub use sections::{content_validity_sections, study_sections, Section};
pub use terminal::render_terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Markdown,
    Json,
}

/// Markdown when the output file ends in `.md`, JSON for `.json`,
/// otherwise the requested format.
pub fn resolve_format(requested: Option<OutputFormat>, output_file: &Option<PathBuf>) -> OutputFormat {
    if let Some(format) = requested {
        return format;
    }
    match output_file
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
    {
        Some("md") => OutputFormat::Markdown,
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Terminal,
    }
}

pub fn output_study(
    report: &StudyReport,
    format: OutputFormat,
    output_file: Option<PathBuf>,
    decimals: usize,
    formatting: FormattingConfig,
) -> Result<()> {
    match format {
        OutputFormat::Json => output_json(report, output_file),
        OutputFormat::Markdown => {
            let text = render_markdown("Scale validation report", &study_sections(report, decimals));
            write_text(&text, output_file)
        }
        OutputFormat::Terminal => {
            let text = render_terminal(&study_sections(report, decimals), file_formatting(&output_file, formatting));
            write_text(&text, output_file)
        }
    }
}

pub fn output_content_validity(
    report: &ContentValidityReport,
    format: OutputFormat,
    output_file: Option<PathBuf>,
    decimals: usize,
    formatting: FormattingConfig,
) -> Result<()> {
    match format {
        OutputFormat::Json => output_json(report, output_file),
        OutputFormat::Markdown => {
            let text = render_markdown(
                "Content validity report",
                &content_validity_sections(report, decimals),
            );
            write_text(&text, output_file)
        }
        OutputFormat::Terminal => {
            let text = render_terminal(
                &content_validity_sections(report, decimals),
                file_formatting(&output_file, formatting),
            );
            write_text(&text, output_file)
        }
    }
}

// Terminal reports written to a file never carry colour codes.
fn file_formatting(output_file: &Option<PathBuf>, formatting: FormattingConfig) -> FormattingConfig {
    if output_file.is_some() {
        FormattingConfig {
            color: crate::formatting::ColorMode::Never,
            ..formatting
        }
    } else {
        formatting
    }
}

pub(crate) fn write_text(text: &str, output_file: Option<PathBuf>) -> Result<()> {
    match output_file {
        Some(path) => write_file(&path, text),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

pub(crate) fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_extension_when_not_requested() {
        let md = Some(PathBuf::from("report.md"));
        let json = Some(PathBuf::from("out/report.json"));
        assert_eq!(resolve_format(None, &md), OutputFormat::Markdown);
        assert_eq!(resolve_format(None, &json), OutputFormat::Json);
        assert_eq!(resolve_format(None, &None), OutputFormat::Terminal);
        assert_eq!(
            resolve_format(Some(OutputFormat::Terminal), &md),
            OutputFormat::Terminal
        );
    }
}
