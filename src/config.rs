use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreKind,
    pub database_url: String,
    pub alert_model_name: String,
    pub alert_collection_name: String,
    pub alert_source_collection_name: String,
    pub alert_seed: String,
    pub alert_source_seed: String,
    pub seeds_path: PathBuf,
    pub seed_on_start: bool,
    pub api_version: String,
    pub port: u16,
    pub log_level: String,
    pub kafka_bootstrap_servers: Option<String>,
    pub kafka_campaign_topic: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_message_timeout_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let store = match env::var("STORE").unwrap_or_default().to_lowercase().as_str() {
            "memory" => StoreKind::Memory,
            _ => StoreKind::Postgres,
        };

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
                let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
                let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "emis".to_string());
                let db_user = env::var("DB_USER").unwrap_or_else(|_| "emis".to_string());
                let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "emis".to_string());

                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    db_user, db_pwd, db_host, db_port, db_name
                )
            }
        };

        let alert_model_name =
            env::var("ALERT_MODEL_NAME").unwrap_or_else(|_| "Alert".to_string());
        let alert_collection_name =
            env::var("ALERT_COLLECTION_NAME").unwrap_or_else(|_| "alerts".to_string());
        let alert_source_collection_name = env::var("ALERT_SOURCE_COLLECTION_NAME")
            .unwrap_or_else(|_| "alertsources".to_string());
        let alert_seed = env::var("ALERT_SEED").unwrap_or_else(|_| "alerts".to_string());
        let alert_source_seed =
            env::var("ALERT_SOURCE_SEED").unwrap_or_else(|_| "alertsources".to_string());

        let base_path = env::var("BASE_PATH")
            .map(PathBuf::from)
            .or_else(|_| env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));
        let seeds_path = env::var("SEEDS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_path.join("seeds"));
        let seed_on_start = parse_flag(&env::var("SEED_ON_START").unwrap_or_default());

        let api_version = env::var("API_VERSION").unwrap_or_else(|_| "1.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let kafka_bootstrap_servers = env::var("KAFKA_BOOTSTRAP_SERVERS")
            .ok()
            .filter(|servers| !servers.trim().is_empty());
        let kafka_campaign_topic =
            env::var("KAFKA_CAMPAIGN_TOPIC").unwrap_or_else(|_| "campaigns".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "SASL_PLAINTEXT".to_string());
        let kafka_message_timeout_ms = env::var("KAFKA_MESSAGE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        Ok(Self {
            store,
            database_url,
            alert_model_name,
            alert_collection_name,
            alert_source_collection_name,
            alert_seed,
            alert_source_seed,
            seeds_path,
            seed_on_start,
            api_version,
            port,
            log_level,
            kafka_bootstrap_servers,
            kafka_campaign_topic,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_message_timeout_ms,
        })
    }

    /// Route prefix derived from the major component of `api_version`, e.g. `/v1`.
    pub fn api_prefix(&self) -> String {
        api_prefix(&self.api_version)
    }
}

pub fn api_prefix(api_version: &str) -> String {
    let major = api_version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .next()
        .filter(|major| !major.is_empty())
        .unwrap_or("1");
    format!("/v{}", major)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
