pub mod auth;
pub mod cli;
pub mod client;
pub mod core;
pub mod schemas;
pub mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = cli::parse_args(std::env::args().skip(1))?;

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    tracing::debug!(
        environment = settings.runtime().environment.as_str(),
        base_url = %settings.api().base_url,
        "exam-runner starting"
    );

    let result = cli::execute(&settings, command).await;

    if let Some(rendered) = core::metrics::render() {
        tracing::info!(metrics = %rendered, "Final metrics");
    }

    result
}
