use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) exam: ExamSettings,
    pub(super) session: SessionSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub result_fetch_attempts: u32,
    pub result_fetch_delay_ms: u64,
    pub tick_interval_ms: u64,
    pub save_flush_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub file: PathBuf,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ExamSettings {
    pub fn result_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.result_fetch_attempts, Duration::from_millis(self.result_fetch_delay_ms))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn save_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.save_flush_timeout_seconds)
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl Settings {
    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}
