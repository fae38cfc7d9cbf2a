//! Process configuration
//!
//! Built once at startup and passed down explicitly; nothing here is read
//! lazily from a global.

use std::path::PathBuf;

use crate::error::Result;

/// Local dev origins allowed by default
const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:3000",
];

/// Settings of the native AutoML pipeline
#[derive(Debug, Clone)]
pub struct AutoMlSettings {
    /// Seed shared by fold assignment, tuning draws and tree bootstraps
    pub random_seed: u64,
    /// Number of cross-validation folds
    pub cv_folds: usize,
    /// Random-search draws during tuning
    pub tune_iterations: usize,
}

impl Default for AutoMlSettings {
    fn default() -> Self {
        Self {
            random_seed: env_parse("AUTOML_SEED", 42),
            cv_folds: env_parse("AUTOML_CV_FOLDS", 5),
            tune_iterations: env_parse("AUTOML_TUNE_ITERATIONS", 10),
        }
    }
}

/// Settings of the LLM agent
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// API key; the agent is disabled when absent
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub models_dir: PathBuf,
    pub max_upload_size: usize,
    pub cors_origins: Vec<String>,
    pub automl: AutoMlSettings,
    pub agent: AgentSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("API_PORT", 8000),
            uploads_dir: std::env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
            models_dir: std::env::var("MODELS_DIR")
                .unwrap_or_else(|_| "./models".to_string())
                .into(),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE", 100 * 1024 * 1024), // 100MB
            cors_origins: Self::resolve_cors_origins(),
            automl: AutoMlSettings::default(),
            agent: AgentSettings::default(),
        }
    }
}

impl AppConfig {
    /// Create the uploads and models directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        std::fs::create_dir_all(&self.models_dir)?;
        Ok(())
    }

    fn resolve_cors_origins() -> Vec<String> {
        let mut origins: Vec<String> = match std::env::var("CORS_ORIGINS") {
            Ok(list) if !list.trim().is_empty() => list
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            _ => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        if std::env::var("PRODUCTION").map(|v| v == "true").unwrap_or(false) {
            if let Ok(domain) = std::env::var("PRODUCTION_DOMAIN") {
                if !domain.is_empty() {
                    origins.push(format!("https://{}", domain));
                }
            }
        }

        origins
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.max_upload_size > 0);
        assert!(!config.cors_origins.is_empty());
        assert!(config.automl.cv_folds >= 2);
    }

    #[test]
    fn test_ensure_dirs_creates_both() {
        let root = tempfile::tempdir().unwrap();
        let config = AppConfig {
            uploads_dir: root.path().join("uploads"),
            models_dir: root.path().join("models"),
            ..AppConfig::default()
        };
        config.ensure_dirs().unwrap();
        assert!(config.uploads_dir.is_dir());
        assert!(config.models_dir.is_dir());
    }
}
