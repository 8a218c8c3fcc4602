//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] hldesk_registry::RegistryError),

    #[error("Executor error: {0}")]
    Executor(#[from] hldesk_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] hldesk_telemetry::TelemetryError),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
