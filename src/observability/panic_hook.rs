//! Custom panic hook for structured crash reports.
//!
//! A crash report names the study phase and input file that were active,
//! how far the bootstrap got, and where the panic was raised.

use super::context::{get_current_context, get_progress, StudyContext};
use std::panic::PanicHookInfo;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const WIDTH: usize = 78;

/// Install the crash report hook. Call early in `main`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        print_crash_report(info);
    }));
}

fn print_crash_report(info: &PanicHookInfo<'_>) {
    let context = get_current_context();
    let (done, total) = get_progress();

    eprintln!();
    for line in crash_report_lines(&context, info, done, total) {
        eprintln!("{}", line);
    }
    if std::env::var("RUST_BACKTRACE").is_ok() {
        eprintln!();
        eprintln!("{}", std::backtrace::Backtrace::capture());
    }
}

fn crash_report_lines(
    context: &StudyContext,
    info: &PanicHookInfo<'_>,
    done: usize,
    total: usize,
) -> Vec<String> {
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
    report_lines(
        context,
        &extract_panic_message(info),
        location.as_deref(),
        done,
        total,
    )
}

fn report_lines(
    context: &StudyContext,
    message: &str,
    location: Option<&str>,
    done: usize,
    total: usize,
) -> Vec<String> {
    let rule = "═".repeat(WIDTH);
    let mut lines = vec![
        format!("╔{}╗", rule),
        boxed("SCALEVAL CRASH REPORT"),
        format!("╠{}╣", rule),
        boxed(&format!("Version: {}", VERSION)),
        boxed(&format!("Platform: {}", std::env::consts::OS)),
        boxed(&format!("PANIC: {}", message)),
    ];
    if let Some(location) = location {
        lines.push(boxed(&format!("Location: {}", location)));
    }
    lines.push(format!("╠{}╣", rule));
    lines.push(boxed("STUDY CONTEXT:"));
    lines.push(boxed(&match context.phase {
        Some(phase) => format!("  Phase: {}", phase),
        None => "  Phase: (not set - crash occurred before analysis started)".to_string(),
    }));
    if let Some(file) = &context.input_file {
        lines.push(boxed(&format!("  Input: {}", file.display())));
    }
    if total > 0 {
        let pct = done * 100 / total;
        lines.push(boxed(&format!(
            "  Bootstrap: {} / {} replicates ({}%)",
            done, total, pct
        )));
    }
    if std::env::var("RUST_BACKTRACE").is_err() {
        lines.push(boxed("Run with RUST_BACKTRACE=1 for stack trace"));
    }
    lines.push(format!("╚{}╝", rule));
    lines
}

fn boxed(text: &str) -> String {
    let inner = WIDTH - 2;
    format!("║  {:<inner$}║", truncate(text, inner), inner = inner)
}

fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
