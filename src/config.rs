use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_NAVER_BASE_URL: &str = "https://openapi.naver.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub database: DatabaseConfig,

    // When false, generated SQL is returned to the caller without running it
    pub execute_sql: bool,

    // OpenAI-compatible chat completions
    pub openai_api_key: Secret<String>,
    pub openai_base_url: String,

    // Naver news search
    pub naver_client_id: Option<String>,
    pub naver_client_secret: Option<Secret<String>>,
    pub naver_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub user: String,
    pub password: Secret<String>,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    /// Builds the configuration from already collected settings.
    /// Keys are the lowercased environment variable names.
    pub fn from_settings(config: &config::Config) -> Result<Self, config::ConfigError> {
        let execute_sql = config
            .get_string("execute_sql")
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port").unwrap_or(3000),

            database: DatabaseConfig {
                host: config
                    .get("db_host")
                    .unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: config.get("db_port").unwrap_or(3306),
                name: config.get("db_name").ok(),
                user: config.get("db_user").unwrap_or_else(|_| "root".to_string()),
                password: Secret::new(config.get("db_password").unwrap_or_default()),
                // Serverless profile: one connection per process
                max_connections: 1,
                connect_timeout: Duration::from_secs(
                    config.get("db_connect_timeout_secs").unwrap_or(30),
                ),
                keep_alive: Duration::from_secs(config.get("db_keep_alive_secs").unwrap_or(10)),
            },

            execute_sql,

            openai_api_key: Secret::new(config.get("openai_api_key")?),
            openai_base_url: config
                .get("openai_base_url")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),

            naver_client_id: config
                .get::<String>("naver_client_id")
                .ok()
                .filter(|id| !id.is_empty()),
            naver_client_secret: config
                .get::<String>("naver_client_secret")
                .ok()
                .filter(|secret| !secret.is_empty())
                .map(Secret::new),
            naver_base_url: config
                .get("naver_base_url")
                .unwrap_or_else(|_| DEFAULT_NAVER_BASE_URL.to_string()),
        })
    }
}
