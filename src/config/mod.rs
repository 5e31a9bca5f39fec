//! Study configuration: TOML schema, discovery and validation.

mod core;
mod loader;
pub mod validation;

pub use self::core::{
    default_item_labels, CfaConfig, CleaningConfig, ContentValidityConfig, CorrelationConfig,
    DataConfig, DescriptivesConfig, EfaConfig, FactorConfig, ItemColumns, ModelConfig,
    NetworkConfig, NetworkCorrelation, OutputConfig, ParallelReference, RetentionConfig,
    Rotation, SplitConfig, StudyConfig,
};
pub use loader::{default_config_toml, load_config, parse_and_validate_config, CONFIG_FILE_NAME};
pub use validation::validate_config;
