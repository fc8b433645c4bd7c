pub mod env;
mod loader;

pub use env::{
    AppConfig, BackendConfig, ConfigError, DirectoryConfig, LimitConfig, RetryConfig,
    SchedulerConfig, TtlConfig,
};
pub use loader::load_config;
