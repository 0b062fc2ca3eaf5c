//! Process-wide configuration, resolved from the environment once at
//! startup and passed down explicitly. The core crates never read env
//! vars themselves.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// LLM vendor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible API base, without the trailing `/chat/completions`.
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl LlmSettings {
    /// Read settings from the environment. `WEBSCOUT_*` variables win
    /// over the conventional `OPENAI_*` ones.
    pub fn from_env() -> Self {
        Self {
            api_base: env::var("WEBSCOUT_API_BASE")
                .or_else(|_| env::var("OPENAI_BASE_URL"))
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_key: env::var("WEBSCOUT_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .unwrap_or_default(),
            model: env::var("WEBSCOUT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: env::var("WEBSCOUT_TEMPERATURE")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.6),
        }
    }
}

/// Everything the process consumes that is not per-command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    /// Directory for reports and other artifacts.
    pub output_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            llm: LlmSettings::from_env(),
            output_dir: env::var("WEBSCOUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./reports")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Only assert on fields no test environment is expected to set.
        let settings = LlmSettings::from_env();
        assert!(!settings.api_base.is_empty());
        assert!((0.0..=2.0).contains(&settings.temperature));
    }
}
