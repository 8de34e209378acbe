use std::path::PathBuf;

use super::parsing::{
    env_optional, env_or_default, parse_base_url, parse_bool, parse_environment, parse_u32,
    parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, ExamSettings, RuntimeSettings, SessionSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(env_optional("EXAM_RUNNER_ENV"));

        let base_url =
            parse_base_url(env_or_default("EXAM_API_BASE_URL", "http://localhost:8000"))?;
        let timeout_seconds =
            parse_u64("EXAM_API_TIMEOUT_SECONDS", env_or_default("EXAM_API_TIMEOUT_SECONDS", "30"))?;

        let result_fetch_attempts = parse_u32(
            "EXAM_RESULT_FETCH_ATTEMPTS",
            env_or_default("EXAM_RESULT_FETCH_ATTEMPTS", "3"),
        )?;
        let result_fetch_delay_ms = parse_u64(
            "EXAM_RESULT_FETCH_DELAY_MS",
            env_or_default("EXAM_RESULT_FETCH_DELAY_MS", "350"),
        )?;
        let tick_interval_ms =
            parse_u64("EXAM_TICK_INTERVAL_MS", env_or_default("EXAM_TICK_INTERVAL_MS", "1000"))?;
        let save_flush_timeout_seconds = parse_u64(
            "EXAM_SAVE_FLUSH_TIMEOUT_SECONDS",
            env_or_default("EXAM_SAVE_FLUSH_TIMEOUT_SECONDS", "5"),
        )?;

        let session_file =
            PathBuf::from(env_or_default("EXAM_SESSION_FILE", ".exam-runner/session.json"));
        let idle_timeout_seconds = parse_u64(
            "EXAM_SESSION_IDLE_TIMEOUT_SECONDS",
            env_or_default("EXAM_SESSION_IDLE_TIMEOUT_SECONDS", "300"),
        )?;

        let log_level = env_or_default("EXAM_RUNNER_LOG_LEVEL", "info");
        let json = env_optional("EXAM_RUNNER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment },
            api: ApiSettings { base_url, timeout_seconds },
            exam: ExamSettings {
                result_fetch_attempts,
                result_fetch_delay_ms,
                tick_interval_ms,
                save_flush_timeout_seconds,
            },
            session: SessionSettings { file: session_file, idle_timeout_seconds },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exam.result_fetch_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_RESULT_FETCH_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.exam.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_TICK_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_API_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.runtime.environment.is_production() && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(self.api.base_url.clone()));
        }

        Ok(())
    }
}
