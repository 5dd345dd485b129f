use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    /// Identity written into table locks and log lines; defaults to host:pid.
    pub instance_id: String,
    // External collaborators
    pub fetcher_url: String,
    pub gateway_url: String,
    pub gateway_token: Option<String>,
    pub quiet_periods_url: String,
    // Timer cadences (seconds)
    pub poll_tick_secs: u64,
    pub send_tick_secs: u64,
    pub watchdog_tick_secs: u64,
    pub retention_tick_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            instance_id: env::var("INSTANCE_ID").unwrap_or_else(|_| default_instance_id()),
            fetcher_url: env::var("FETCHER_URL")?,
            gateway_url: env::var("GATEWAY_URL")?,
            gateway_token: env::var("GATEWAY_TOKEN").ok(),
            quiet_periods_url: env::var("QUIET_PERIODS_URL")?,
            poll_tick_secs: env::var("POLL_TICK_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            send_tick_secs: env::var("SEND_TICK_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            watchdog_tick_secs: env::var("WATCHDOG_TICK_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            retention_tick_secs: env::var("RETENTION_TICK_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn default_instance_id() -> String {
    let host = env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
    format!("{}:{}", host, std::process::id())
}
