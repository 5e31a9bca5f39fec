use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure for a validation study
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    /// Input table format
    pub data: DataConfig,

    /// Consent filter, item columns and outlier screening
    pub cleaning: CleaningConfig,

    /// Sociodemographic and satisfaction tables
    pub descriptives: DescriptivesConfig,

    /// Exploratory/confirmatory partition
    pub split: SplitConfig,

    /// Polychoric estimation
    pub correlation: CorrelationConfig,

    /// Factor retention criteria
    pub retention: RetentionConfig,

    /// Exploratory factor analysis
    pub efa: EfaConfig,

    /// Hypothesised measurement model
    pub model: ModelConfig,

    /// Confirmatory estimation
    pub cfa: CfaConfig,

    /// Exploratory graph analysis and bootstrap
    pub network: NetworkConfig,

    /// Expert ratings (Aiken's V)
    pub content_validity: ContentValidityConfig,

    /// Report rendering
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Field delimiter of the input tables
    pub delimiter: char,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Where the scale items live in the survey table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ItemColumns {
    /// Inclusive 1-based column positions
    Positions { first: usize, last: usize },
    /// Explicit header names, in item order
    Named { columns: Vec<String> },
}

impl ItemColumns {
    /// Number of item columns this selection names.
    pub fn len(&self) -> usize {
        match self {
            Self::Positions { first, last } => (last + 1).saturating_sub(*first),
            Self::Named { columns } => columns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    /// Column holding the informed-consent answer
    pub consent_column: String,

    /// Value that marks affirmative consent
    pub consent_value: String,

    /// Item column selection
    pub items: ItemColumns,

    /// Labels given to the selected items, in order
    pub item_labels: Vec<String>,

    /// Multiplier k in median +/- k * MAD
    pub hampel_multiplier: f64,

    /// Scale constant applied to the MAD (1.0 = raw MAD)
    pub mad_constant: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            consent_column: "consent".to_string(),
            consent_value: "Yes".to_string(),
            items: ItemColumns::Positions {
                first: 16,
                last: 30,
            },
            item_labels: default_item_labels(),
            hampel_multiplier: 3.0,
            mad_constant: 1.0,
        }
    }
}

/// A1-A4, E1-E6, C1-C5
pub fn default_item_labels() -> Vec<String> {
    let block =
        |prefix: &'static str, n: usize| (1..=n).map(move |i| format!("{}{}", prefix, i));
    block("A", 4)
        .chain(block("E", 6))
        .chain(block("C", 5))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DescriptivesConfig {
    /// Sociodemographic categorical columns
    pub categorical: Vec<String>,

    /// Satisfaction rating columns
    pub satisfaction: Vec<String>,

    /// Numeric columns summarised by mean/sd/range
    pub numeric: Vec<String>,

    /// Optional value labels per column: column -> raw value -> label
    pub value_labels: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for DescriptivesConfig {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            categorical: strings(&["sex", "campus", "modality", "field", "year"]),
            satisfaction: strings(&[
                "sat_program",
                "sat_teaching",
                "sat_resources",
                "sat_services",
                "sat_overall",
            ]),
            numeric: strings(&["age"]),
            value_labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Seed of the partition stream
    pub seed: u64,

    /// Share of respondents (floored) assigned to the exploratory half
    pub exploratory_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 2023,
            exploratory_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationConfig {
    /// Count added to empty contingency cells before fitting
    pub zero_cell_correction: f64,

    /// Eigenvalue floor below which the matrix is smoothed
    pub smoothing_epsilon: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            zero_cell_correction: 0.5,
            smoothing_epsilon: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParallelReference {
    Mean,
    Percentile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Random data sets drawn for parallel analysis
    pub parallel_iterations: usize,

    /// Seed of the parallel-analysis stream
    pub seed: u64,

    /// Reference eigenvalue used by parallel analysis
    pub reference: ParallelReference,

    /// Percentile used when `reference = "percentile"`
    pub percentile: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            parallel_iterations: 100,
            seed: 42,
            reference: ParallelReference::Mean,
            percentile: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Varimax,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EfaConfig {
    pub n_factors: usize,
    pub rotation: Rotation,

    /// Loadings below this magnitude are hidden in printed tables
    pub display_threshold: f64,

    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for EfaConfig {
    fn default() -> Self {
        Self {
            n_factors: 3,
            rotation: Rotation::Varimax,
            display_threshold: 0.5,
            max_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FactorConfig {
    pub name: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub factors: Vec<FactorConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let labels = default_item_labels();
        let factor = |name: &str, range: std::ops::Range<usize>| FactorConfig {
            name: name.to_string(),
            items: labels[range].to_vec(),
        };
        Self {
            factors: vec![factor("F1", 0..4), factor("F2", 4..10), factor("F3", 10..15)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CfaConfig {
    pub max_iterations: usize,

    /// Relative objective change that counts as converged
    pub tolerance: f64,
}

impl Default for CfaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkCorrelation {
    Polychoric,
    Pearson,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Run exploratory graph analysis at all
    pub enabled: bool,

    /// EBIC hyperparameter
    pub gamma: f64,

    /// Length of the lambda path
    pub n_lambda: usize,

    /// Smallest lambda as a fraction of the largest
    pub lambda_min_ratio: f64,

    pub glasso_max_iterations: usize,
    pub glasso_tolerance: f64,

    /// Correlation used on each bootstrap resample
    pub correlation: NetworkCorrelation,

    pub bootstrap_iterations: usize,
    pub seed: u64,

    /// Size of the bootstrap worker pool
    pub workers: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gamma: 0.5,
            n_lambda: 100,
            lambda_min_ratio: 0.1,
            glasso_max_iterations: 200,
            glasso_tolerance: 1e-4,
            correlation: NetworkCorrelation::Polychoric,
            bootstrap_iterations: 500,
            seed: 2024,
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContentValidityConfig {
    pub item_column: String,
    pub judge_column: String,
    pub rating_column: String,

    /// Optional criterion column (clarity, relevance, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criterion_column: Option<String>,

    pub scale_min: f64,
    pub scale_max: f64,

    /// Confidence level of the score interval
    pub confidence: f64,

    /// Lower interval bound an item must reach
    pub min_lower_bound: f64,
}

impl Default for ContentValidityConfig {
    fn default() -> Self {
        Self {
            item_column: "item".to_string(),
            judge_column: "judge".to_string(),
            rating_column: "rating".to_string(),
            criterion_column: None,
            scale_min: 1.0,
            scale_max: 4.0,
            confidence: 0.95,
            min_lower_bound: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Decimal places in printed tables
    pub decimals: usize,

    /// Show a progress bar during the bootstrap
    pub show_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            decimals: 3,
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_item_labels_by_block() {
        let labels = default_item_labels();
        assert_eq!(labels.len(), 15);
        assert_eq!(labels[..4], ["A1", "A2", "A3", "A4"]);
        assert_eq!(labels[4], "E1");
        assert_eq!(labels[14], "C5");
    }

    #[test]
    fn test_default_labels_match_default_model() {
        let config = StudyConfig::default();
        let model_items: Vec<String> = config
            .model
            .factors
            .iter()
            .flat_map(|f| f.items.clone())
            .collect();
        assert_eq!(model_items, config.cleaning.item_labels);
        assert_eq!(config.cleaning.items.len(), 15);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StudyConfig = toml::from_str(
            r#"
            [split]
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.split.exploratory_fraction, 0.5);
        assert_eq!(config.cleaning.hampel_multiplier, 3.0);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = toml::from_str::<StudyConfig>(
            r#"
            [split]
            sed = 7
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_named_item_columns() {
        let config: StudyConfig = toml::from_str(
            r#"
            [cleaning]
            item_labels = ["X1", "X2"]
            [cleaning.items.named]
            columns = ["q1", "q2"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.cleaning.items,
            ItemColumns::Named {
                columns: vec!["q1".into(), "q2".into()]
            }
        );
    }
}
