use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

/// Model used for every completion request unless overridden via `GROQ_MODEL`.
pub const DEFAULT_MODEL: &str = "gemma2-9b-it";

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";

const DEFAULT_DB_FILE: &str = "interviewbot.db";

/// Runtime configuration, loaded once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub groq_api_key: String,
    pub groq_base_url: String,
    pub model: String,
    pub database_path: PathBuf,
}

impl AppConfig {
    /// Loads configuration from the environment, reading a `.env` file first
    /// if one exists. `GROQ_API_KEY` is required; everything else falls back
    /// to defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let groq_api_key = env::var("GROQ_API_KEY")
            .context("GROQ_API_KEY is not set; add it to the environment or a .env file")?;
        let groq_base_url =
            env::var("GROQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let database_path: PathBuf = env::var("INTERVIEWBOT_DB")
            .unwrap_or_else(|_| DEFAULT_DB_FILE.to_string())
            .into();

        info!(
            "Loaded config: model {}, database {}",
            model,
            database_path.display()
        );

        Ok(Self {
            groq_api_key,
            groq_base_url,
            model,
            database_path,
        })
    }
}
