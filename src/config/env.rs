use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub image_backend: BackendConfig,
    pub text_backend: BackendConfig,
    pub retry: RetryConfig,
    pub limits: LimitConfig,
    pub scheduler: SchedulerConfig,
    pub ttl: TtlConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

/// AI 컨테이너 하나에 대한 접속 설정. 이미지/텍스트 컨테이너가 각각 하나씩 가진다.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub model_version: String,
}

/// 5xx/통신 오류에만 적용되는 재시도 정책. 4xx와 검증 오류는 재시도하지 않는다.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 첫 시도를 포함한 전체 시도 횟수.
    pub max_attempts: u32,
    pub backoff: Duration,
    /// 고정 지연에 곱해지는 ± 비율 (0.3 = ±30%).
    pub jitter: f64,
}

#[derive(Debug, Clone)]
pub struct LimitConfig {
    pub max_image_bytes: u64,
    pub max_text_chars: usize,
    /// 사용자 설정에 민감도가 없을 때 텍스트 컨테이너에 넘기는 기본 임계값.
    pub text_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub result_cache: Duration,
    pub settings: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
