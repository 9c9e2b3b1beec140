use thiserror::Error;

/// Errors that stop the application from starting or running.
#[derive(Debug, Error)]
pub enum AppError {
    /// Opening or preparing the store failed.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// Connecting to the database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The tracing subscriber could not be installed.
    #[error("Tracing setup failed: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    /// The Prometheus recorder could not be installed.
    #[error("Metrics setup failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// Console I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for application setup.
pub type Result<T> = std::result::Result<T, AppError>;
