mod parsing;
mod settings;
mod types;

pub use types::{
    ApiSettings, ConfigError, Environment, ExamSettings, RuntimeSettings, SessionSettings,
    Settings, TelemetrySettings,
};
