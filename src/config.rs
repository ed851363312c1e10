use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub deepgram: EngineConfig,
    #[serde(default)]
    pub groq: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// NATS backs the room fan-out when a URL is configured; otherwise the
/// in-process bus is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NatsConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub api_key: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("BABELCAST").separator("__"))
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;

        // Engine keys usually arrive through the vendors' own env vars.
        if cfg.deepgram.api_key.is_empty() {
            if let Ok(key) = std::env::var("DEEPGRAM_API_KEY") {
                cfg.deepgram.api_key = key;
            }
        }
        if cfg.groq.api_key.is_empty() {
            if let Ok(key) = std::env::var("GROQ_API_KEY") {
                cfg.groq.api_key = key;
            }
        }

        Ok(cfg)
    }
}
