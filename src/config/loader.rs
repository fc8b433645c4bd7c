use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, BackendConfig, ConfigError, DirectoryConfig, LimitConfig, LoggingConfig,
    RetryConfig, SchedulerConfig, TtlConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let image_backend = BackendConfig {
            base_url: base_url("IMAGE_AI_BASE_URL", "http://localhost:8001")?,
            connect_timeout: millis("AI_CONNECT_TIMEOUT_MS", 3_000),
            read_timeout: millis("AI_READ_TIMEOUT_MS", 30_000),
            model_version: env::var("IMAGE_AI_MODEL_VERSION").unwrap_or_else(|_| "v1.0".into()),
        };

        let text_backend = BackendConfig {
            base_url: base_url("TEXT_AI_BASE_URL", "http://localhost:8002")?,
            connect_timeout: millis("AI_CONNECT_TIMEOUT_MS", 3_000),
            read_timeout: millis("AI_READ_TIMEOUT_MS", 30_000),
            model_version: env::var("TEXT_AI_MODEL_VERSION").unwrap_or_else(|_| "v1.0".into()),
        };

        let retry = RetryConfig {
            max_attempts: parse("RETRY_MAX_ATTEMPTS").unwrap_or(3),
            backoff: millis("RETRY_BACKOFF_MS", 200),
            jitter: parse("RETRY_JITTER").unwrap_or(0.3),
        };

        let limits = LimitConfig {
            max_image_bytes: parse("MAX_IMAGE_BYTES").unwrap_or(1024 * 1024),
            max_text_chars: parse("MAX_TEXT_CHARS").unwrap_or(10_000),
            text_threshold: parse("TEXT_FILTER_THRESHOLD").unwrap_or(0.5),
        };

        let scheduler = SchedulerConfig {
            queue_capacity: parse("SCHEDULER_QUEUE_CAPACITY").unwrap_or(100),
        };

        let ttl = TtlConfig {
            result_cache: Duration::from_secs(
                parse::<u64>("RESULT_CACHE_TTL_MINUTES").unwrap_or(30) * 60,
            ),
            settings: Duration::from_secs(
                parse::<u64>("SETTINGS_TTL_HOURS").unwrap_or(24) * 3_600,
            ),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "settings.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            image_backend,
            text_backend,
            retry,
            limits,
            scheduler,
            ttl,
            directories,
            logging,
        })
    }
}

/// base URL은 기동 시점에 검증한다. 뒤쪽 슬래시는 엔드포인트 결합을 위해 잘라낸다.
fn base_url(key: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    let trimmed = raw.trim_end_matches('/').to_string();
    Url::parse(&trimmed).map_err(|_| ConfigError::Invalid {
        key,
        value: raw.clone(),
    })?;
    Ok(trimmed)
}

fn millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default),
    )
}

fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}
