use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::StudyConfig;
use super::validation::validate_config;
use crate::errors::{Result, StudyError};

/// File name looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = ".scaleval.toml";

/// Read the raw contents of a config file
pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse a TOML document and run all validation rules on it
pub fn parse_and_validate_config(contents: &str) -> Result<StudyConfig> {
    let config = toml::from_str::<StudyConfig>(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve which config file applies: an explicit path wins, then
/// `.scaleval.toml` in `dir`, then none.
pub(crate) fn resolve_config_path(explicit: Option<&Path>, dir: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = dir.join(CONFIG_FILE_NAME);
            candidate.is_file().then_some(candidate)
        }
    }
}

/// Load the study configuration.
///
/// An explicitly named file must exist and be valid. Without one, the
/// working directory is searched for `.scaleval.toml`, falling back to the
/// built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<StudyConfig> {
    let cwd = std::env::current_dir().map_err(|e| StudyError::io_with_path(e, "."))?;
    load_config_from(explicit, &cwd)
}

pub(crate) fn load_config_from(explicit: Option<&Path>, dir: &Path) -> Result<StudyConfig> {
    let Some(path) = resolve_config_path(explicit, dir) else {
        log::debug!("No config file found, using defaults");
        let config = StudyConfig::default();
        validate_config(&config)?;
        return Ok(config);
    };

    let contents = read_config_file(&path).map_err(|e| StudyError::io_with_path(e, &path))?;
    let config = parse_and_validate_config(&contents).map_err(|e| match e {
        StudyError::Toml(inner) => {
            StudyError::config(format!("{}: {}", path.display(), inner.message()))
        }
        other => other,
    })?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Default configuration rendered as TOML, used by `scaleval init`
pub fn default_config_toml() -> Result<String> {
    let body = toml::to_string_pretty(&StudyConfig::default())
        .map_err(|e| StudyError::config(format!("cannot render default config: {}", e)))?;
    Ok(format!(
        "# scaleval configuration\n# Sections left out fall back to their defaults.\n\n{}",
        body
    ))
}
