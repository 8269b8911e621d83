use anyhow::Result;
use serde::Deserialize;

use crate::capture::CaptureConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the interview backend
    pub base_url: String,

    /// Per-request timeout in seconds; absent means no timeout
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
