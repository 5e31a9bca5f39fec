//! Configuration validation with error accumulation.
//!
//! Every rule runs, and all violations are reported together as a single
//! [`StudyError::Config`] so a user can fix a config file in one pass.
//! Each violation names the offending field by its dotted TOML path.

use std::collections::HashSet;

use super::core::{
    CleaningConfig, ContentValidityConfig, EfaConfig, ItemColumns, ModelConfig, NetworkConfig,
    RetentionConfig, SplitConfig, StudyConfig,
};
use crate::errors::{Result, StudyError};

/// A single rule violation with its field path
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collect all rule violations of a config.
pub fn collect_errors(config: &StudyConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    errors.extend(check_cleaning(&config.cleaning));
    errors.extend(check_split(&config.split));
    errors.extend(check_retention(&config.retention));
    errors.extend(check_efa(&config.efa));
    errors.extend(check_model(&config.model, &config.cleaning.item_labels));
    errors.extend(check_network(&config.network));
    errors.extend(check_content_validity(&config.content_validity));
    if config.correlation.zero_cell_correction < 0.0 {
        errors.push(FieldError::new(
            "correlation.zero_cell_correction",
            "must not be negative",
        ));
    }
    if config.correlation.smoothing_epsilon <= 0.0 {
        errors.push(FieldError::new(
            "correlation.smoothing_epsilon",
            "must be positive",
        ));
    }
    if config.cfa.max_iterations == 0 {
        errors.push(FieldError::new("cfa.max_iterations", "must be at least 1"));
    }
    errors
}

/// Validate a config, failing with every violation listed.
pub fn validate_config(config: &StudyConfig) -> Result<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }
    let listed: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
    Err(StudyError::config(format!(
        "{} invalid setting(s):\n{}",
        errors.len(),
        listed.join("\n")
    )))
}

fn check_cleaning(c: &CleaningConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if c.consent_column.trim().is_empty() {
        errors.push(FieldError::new("cleaning.consent_column", "must not be empty"));
    }
    match &c.items {
        ItemColumns::Positions { first, last } => {
            if *first == 0 {
                errors.push(FieldError::new(
                    "cleaning.items.positions.first",
                    "positions are 1-based",
                ));
            }
            if last < first {
                errors.push(FieldError::new(
                    "cleaning.items.positions",
                    format!("last ({}) precedes first ({})", last, first),
                ));
            }
        }
        ItemColumns::Named { columns } => {
            if let Some(dup) = first_duplicate(columns) {
                errors.push(FieldError::new(
                    "cleaning.items.named.columns",
                    format!("column '{}' listed twice", dup),
                ));
            }
        }
    }
    if c.items.len() < 2 {
        errors.push(FieldError::new("cleaning.items", "select at least two items"));
    }
    if c.item_labels.len() != c.items.len() {
        errors.push(FieldError::new(
            "cleaning.item_labels",
            format!(
                "{} labels given for {} item columns",
                c.item_labels.len(),
                c.items.len()
            ),
        ));
    }
    if let Some(dup) = first_duplicate(&c.item_labels) {
        errors.push(FieldError::new(
            "cleaning.item_labels",
            format!("label '{}' used twice", dup),
        ));
    }
    if !(c.hampel_multiplier > 0.0) {
        errors.push(FieldError::new(
            "cleaning.hampel_multiplier",
            "must be positive",
        ));
    }
    if !(c.mad_constant > 0.0) {
        errors.push(FieldError::new("cleaning.mad_constant", "must be positive"));
    }
    errors
}

fn check_split(s: &SplitConfig) -> Vec<FieldError> {
    if s.exploratory_fraction > 0.0 && s.exploratory_fraction < 1.0 {
        Vec::new()
    } else {
        vec![FieldError::new(
            "split.exploratory_fraction",
            format!("must lie strictly between 0 and 1, got {}", s.exploratory_fraction),
        )]
    }
}

fn check_retention(r: &RetentionConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if r.parallel_iterations == 0 {
        errors.push(FieldError::new(
            "retention.parallel_iterations",
            "must be at least 1",
        ));
    }
    if !(r.percentile > 0.0 && r.percentile < 1.0) {
        errors.push(FieldError::new(
            "retention.percentile",
            "must lie strictly between 0 and 1",
        ));
    }
    errors
}

fn check_efa(e: &EfaConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if e.n_factors == 0 {
        errors.push(FieldError::new("efa.n_factors", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&e.display_threshold) {
        errors.push(FieldError::new(
            "efa.display_threshold",
            "must lie in [0, 1]",
        ));
    }
    if e.max_iterations == 0 {
        errors.push(FieldError::new("efa.max_iterations", "must be at least 1"));
    }
    if !(e.tolerance > 0.0) {
        errors.push(FieldError::new("efa.tolerance", "must be positive"));
    }
    errors
}

fn check_model(m: &ModelConfig, labels: &[String]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if m.factors.is_empty() {
        errors.push(FieldError::new("model.factors", "define at least one factor"));
    }
    let names: Vec<String> = m.factors.iter().map(|f| f.name.clone()).collect();
    if let Some(dup) = first_duplicate(&names) {
        errors.push(FieldError::new(
            "model.factors",
            format!("factor '{}' defined twice", dup),
        ));
    }

    let known: HashSet<&str> = labels.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for factor in &m.factors {
        if factor.items.is_empty() {
            errors.push(FieldError::new(
                "model.factors",
                format!("factor '{}' has no items", factor.name),
            ));
        }
        for item in &factor.items {
            if !known.contains(item.as_str()) {
                errors.push(FieldError::new(
                    "model.factors",
                    format!("factor '{}' names unknown item '{}'", factor.name, item),
                ));
            }
            if !seen.insert(item.as_str()) {
                errors.push(FieldError::new(
                    "model.factors",
                    format!("item '{}' assigned to more than one factor", item),
                ));
            }
        }
    }
    errors
}

fn check_network(n: &NetworkConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !(n.gamma >= 0.0) {
        errors.push(FieldError::new("network.gamma", "must not be negative"));
    }
    if n.n_lambda < 2 {
        errors.push(FieldError::new("network.n_lambda", "must be at least 2"));
    }
    if !(n.lambda_min_ratio > 0.0 && n.lambda_min_ratio < 1.0) {
        errors.push(FieldError::new(
            "network.lambda_min_ratio",
            "must lie strictly between 0 and 1",
        ));
    }
    if n.glasso_max_iterations == 0 {
        errors.push(FieldError::new(
            "network.glasso_max_iterations",
            "must be at least 1",
        ));
    }
    if n.enabled && n.bootstrap_iterations == 0 {
        errors.push(FieldError::new(
            "network.bootstrap_iterations",
            "must be at least 1",
        ));
    }
    if n.workers == 0 {
        errors.push(FieldError::new("network.workers", "must be at least 1"));
    }
    errors
}

fn check_content_validity(c: &ContentValidityConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !(c.scale_max > c.scale_min) {
        errors.push(FieldError::new(
            "content_validity.scale_max",
            "must exceed scale_min",
        ));
    }
    if !(c.confidence > 0.0 && c.confidence < 1.0) {
        errors.push(FieldError::new(
            "content_validity.confidence",
            "must lie strictly between 0 and 1",
        ));
    }
    if !(0.0..=1.0).contains(&c.min_lower_bound) {
        errors.push(FieldError::new(
            "content_validity.min_lower_bound",
            "must lie in [0, 1]",
        ));
    }
    errors
}

fn first_duplicate(values: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .find(|v| !seen.insert(v.as_str()))
        .map(String::as_str)
}
