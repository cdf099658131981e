use thiserror::Error;

/// All errors produced by bandscope-core.
#[derive(Debug, Error)]
pub enum BandscopeError {
    #[error("no audio capture device available")]
    DeviceUnavailable,

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream failed to open: {0}")]
    StreamOpen(String),

    #[error("invalid analyzer config: {0}")]
    InvalidConfig(String),

    #[error("capture worker exited before reporting stream state")]
    WorkerDied,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BandscopeError>;
