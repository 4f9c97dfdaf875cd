//! Process configuration.
//!
//! Layered via figment: compiled defaults, then `reportlens.toml`, then
//! `REPORTLENS_*` environment variables. Secrets (client secret, LLM API
//! key) should come from the environment or a `.env` file, never from a
//! committed TOML.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::powerbi::AzureCredentials;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,

    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    /// Model used to generate DAX.
    pub generation_model: String,
    /// Model used to narrate results; may be cheaper.
    pub explanation_model: String,

    pub powerbi_api_base: String,
    pub workspaces_file: PathBuf,
    /// Optional override for the compiled-in schema context.
    pub context_file: Option<PathBuf>,

    /// Bounded retries for the generate/execute loop.
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            llm_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            generation_model: "gpt-4.1".to_string(),
            explanation_model: "gpt-4.1-mini".to_string(),
            powerbi_api_base: crate::infrastructure::powerbi::client::DEFAULT_API_BASE.to_string(),
            workspaces_file: PathBuf::from("workspaces.json"),
            context_file: Some(PathBuf::from("context.txt")),
            max_retries: 3,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        // .env is optional; absence is not an error.
        let _ = dotenvy::dotenv();

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("reportlens.toml"))
            .merge(Env::prefixed("REPORTLENS_"))
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        Ok(settings)
    }

    /// Azure credentials must all be present before anything can run.
    pub fn azure_credentials(&self) -> Result<AzureCredentials> {
        for (name, value) in [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Missing required setting '{}' (set REPORTLENS_{} or add it to reportlens.toml)",
                    name,
                    name.to_uppercase()
                )));
            }
        }
        Ok(AzureCredentials {
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        })
    }

    pub fn generation_llm(&self) -> LLMConfig {
        LLMConfig {
            provider: LLMProvider::OpenAI,
            base_url: self.llm_base_url.clone(),
            model: self.generation_model.clone(),
            api_key: self.llm_api_key.clone(),
            max_tokens: Some(1024),
            temperature: Some(0.2),
        }
    }

    pub fn explanation_llm(&self) -> LLMConfig {
        self.generation_llm().with_model(&self.explanation_model)
    }
}
