use super::write_file;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

pub fn output_json<T: Serialize + ?Sized>(report: &T, output_file: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(path) = output_file {
        write_file(&path, &json)?;
    } else {
        println!("{json}");
    }
    Ok(())
}
