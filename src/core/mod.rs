pub(crate) mod config;
pub(crate) mod shutdown;
pub(crate) mod state;
pub(crate) mod telemetry;
pub mod time;
