pub mod api;
pub(crate) mod cli;
pub mod core;
pub mod schemas;
pub mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = cli::parse_args(std::env::args().skip(1))?;

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    tracing::debug!(
        api_url = %settings.api().base_url.as_str(),
        environment = %settings.runtime().environment.as_str(),
        role = ?settings.user().role,
        "Kambaz quiz client configured"
    );

    let state = AppState::from_settings(settings)?;
    cli::dispatch(&state, command).await
}
