//! Configuration loading and resolution.

use std::path::PathBuf;

use agentic_forms::ExtractionConfig;

use crate::types::McpResult;

pub const CONFIG_ENV: &str = "AGENTIC_FORMS_CONFIG";

/// Resolve the config file: explicit path, then `AGENTIC_FORMS_CONFIG`,
/// then `.agentic-forms/config.json` in the working directory.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from(".agentic-forms/config.json");
    cwd_config.exists().then_some(cwd_config)
}

/// Load the resolved config, or defaults when no file is configured.
pub fn load_config(explicit: Option<&str>) -> McpResult<ExtractionConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            Ok(ExtractionConfig::from_file(&path)?)
        }
        None => {
            tracing::debug!("No config file, using defaults");
            Ok(ExtractionConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scheduler": {{"min_interval_ms": 250}}}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        assert_eq!(resolve_config_path(Some(path)), Some(PathBuf::from(path)));
        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.scheduler.min_interval_ms, 250);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_config(Some("/nonexistent/agentic-forms.json")).is_err());
    }
}
