use thiserror::Error;

/// Sampler error types covering configuration, trigger control, and dispatch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PulseError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The periodic trigger could not be installed.
    #[error("trigger installation failed: {0}")]
    TriggerInstall(String),

    /// The periodic trigger could not be suppressed.
    #[error("trigger suppression failed: {0}")]
    TriggerSuppress(String),

    /// The periodic trigger could not be restored.
    #[error("trigger restore failed: {0}")]
    TriggerRestore(String),

    /// Another sampler already owns the process-wide dispatch slot.
    #[error("another sampler instance is registered for tick dispatch")]
    InstanceConflict,
}

/// Convenience type alias for sampler operations.
pub type PulseResult<T> = Result<T, PulseError>;
