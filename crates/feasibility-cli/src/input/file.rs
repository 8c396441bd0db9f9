use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use feasibility_core::EngineConfig;

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// Load engine configuration from a YAML or JSON file, then apply
/// environment overrides. Without a file the defaults are used.
pub fn read_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let canonical = resolve_path(path)?;
            let contents = fs::read_to_string(&canonical)
                .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
            // JSON is a subset of YAML, so one parser covers both
            serde_yaml::from_str::<EngineConfig>(&contents)
                .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
        }
        None => EngineConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Resolve and validate the path, preventing directory traversal.
pub fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
