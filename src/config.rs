// config module: process configuration read once at startup from the environment.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Connection pool limits applied to the MongoDB client at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub max_idle_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_pool_size: 5,
            min_pool_size: 0,
            max_idle_time: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub pool: PoolConfig,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "invoicedesk".to_string(),
            pool: PoolConfig::default(),
            connect_attempts: 10,
            retry_delay: Duration::from_secs(5),
        }
    }
}

// No Debug derive: the signing key must not end up in logs.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: StoreBackend,
    pub mongo: MongoConfig,
    /// Deadline applied to every repository call.
    pub db_timeout: Duration,
    pub auth_token_key: String,
    pub activity_queue_capacity: usize,
    pub typst_bin: String,
    pub download_dir: PathBuf,
    pub download_cleanup: Duration,
    /// bcrypt work factor.
    pub password_cost: u32,
}

impl AppConfig {
    /// Defaults for everything except the signing key.
    pub fn new(auth_token_key: impl Into<String>) -> Self {
        AppConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            backend: StoreBackend::Mongo,
            mongo: MongoConfig::default(),
            db_timeout: Duration::from_secs(10),
            auth_token_key: auth_token_key.into(),
            activity_queue_capacity: 256,
            typst_bin: "typst".to_string(),
            download_dir: env::temp_dir(),
            download_cleanup: Duration::from_secs(60),
            password_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup("AUTH_TOKEN_KEY")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTH_TOKEN_KEY"))?;
        let mut config = AppConfig::new(key);

        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(backend) = lookup("STORE_BACKEND") {
            config.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "mongo" | "mongodb" => StoreBackend::Mongo,
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STORE_BACKEND",
                        value: backend,
                    });
                }
            };
        }
        if let Some(uri) = lookup("MONGODB_URI") {
            config.mongo.uri = uri;
        }
        if let Some(database) = lookup("MONGODB_DB") {
            config.mongo.database = database;
        }

        let pool = &mut config.mongo.pool;
        parse_into(&lookup, "MONGODB_MAX_POOL_SIZE", &mut pool.max_pool_size)?;
        parse_into(&lookup, "MONGODB_MIN_POOL_SIZE", &mut pool.min_pool_size)?;
        parse_secs(&lookup, "MONGODB_MAX_IDLE_SECS", &mut pool.max_idle_time)?;
        parse_into(&lookup, "MONGODB_CONNECT_ATTEMPTS", &mut config.mongo.connect_attempts)?;
        parse_secs(&lookup, "MONGODB_RETRY_DELAY_SECS", &mut config.mongo.retry_delay)?;
        parse_secs(&lookup, "DB_TIMEOUT_SECS", &mut config.db_timeout)?;
        parse_into(
            &lookup,
            "ACTIVITY_QUEUE_CAPACITY",
            &mut config.activity_queue_capacity,
        )?;

        if let Some(bin) = lookup("TYPST_BIN") {
            config.typst_bin = bin;
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        parse_secs(&lookup, "DOWNLOAD_CLEANUP_SECS", &mut config.download_cleanup)?;

        Ok(config)
    }
}

fn parse_into<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw })?;
    }
    Ok(())
}

fn parse_secs<F>(lookup: &F, key: &'static str, target: &mut Duration) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut secs = target.as_secs();
    parse_into(lookup, key, &mut secs)?;
    *target = Duration::from_secs(secs);
    Ok(())
}
