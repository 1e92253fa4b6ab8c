use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::auth::GuardConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} 的值无效: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    Http,
    Keyword,
    Off,
}

/// 启动时从环境变量读取的全部配置
#[derive(Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub port: u16,
    pub classifier_mode: ClassifierMode,
    pub classifier_url: String,
    pub classifier_timeout: Duration,
    pub guard: GuardConfig,
    pub log_dir: PathBuf,
    pub log_level: LevelFilter,
    pub static_dir: Option<PathBuf>,
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let classifier_mode = match lookup("CLASSIFIER_MODE").as_deref() {
            None | Some("http") => ClassifierMode::Http,
            Some("keyword") => ClassifierMode::Keyword,
            Some("off") => ClassifierMode::Off,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "CLASSIFIER_MODE",
                    value: other.to_string(),
                })
            }
        };

        let defaults = GuardConfig::default();
        // 锁定截止时间按 i64 毫秒存储，时长不能超过 i64::MAX
        let lockout_ms: i64 = parsed(
            &lookup,
            "LOGIN_LOCKOUT_MS",
            defaults.lockout_duration.as_millis() as i64,
        )?;
        let lockout_ms = u64::try_from(lockout_ms).map_err(|_| ConfigError::Invalid {
            name: "LOGIN_LOCKOUT_MS",
            value: lockout_ms.to_string(),
        })?;
        let guard = GuardConfig {
            max_attempts: parsed(&lookup, "LOGIN_MAX_ATTEMPTS", defaults.max_attempts)?,
            lockout_duration: Duration::from_millis(lockout_ms),
        };
        if guard.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "LOGIN_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            store_backend,
            database_url,
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT", 3000)?,
            classifier_mode,
            classifier_url: lookup("CLASSIFIER_URL")
                .unwrap_or_else(|| "http://localhost:8001".to_string()),
            classifier_timeout: Duration::from_millis(parsed(
                &lookup,
                "CLASSIFIER_TIMEOUT_MS",
                2000,
            )?),
            guard,
            log_dir: lookup("LOG_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("logs")),
            log_level: parsed(&lookup, "LOG_LEVEL", LevelFilter::Debug)?,
            static_dir: lookup("STATIC_DIR").map(PathBuf::from),
        })
    }
}
