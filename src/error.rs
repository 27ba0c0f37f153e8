//! Error types and handling for meshtalk-core.
//!
//! A single structured error type covering the taxonomy laid out for the
//! mesh messaging core: transport, protocol, crypto, policy, store, and
//! configuration failures each propagate differently (see module docs on
//! `category()`/`is_retryable()`).

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories, used to decide retry/propagation behavior and for
/// monitoring hooks at the application boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Transport,
    Protocol,
    Crypto,
    Policy,
    Store,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub enum RetryStrategy {
    NoRetry,
    LinearBackoff { max_retries: u32 },
    ExponentialBackoff { max_retries: u32 },
}

impl ErrorCategory {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Crypto => ErrorSeverity::Critical,
            Self::Transport | Self::Store => ErrorSeverity::High,
            Self::Protocol | Self::Policy => ErrorSeverity::Medium,
            Self::Configuration | Self::Internal => ErrorSeverity::Low,
        }
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        match self {
            Self::Transport => RetryStrategy::ExponentialBackoff { max_retries: 5 },
            Self::Store => RetryStrategy::ExponentialBackoff { max_retries: 3 },
            Self::Crypto | Self::Policy | Self::Configuration => RetryStrategy::NoRetry,
            _ => RetryStrategy::LinearBackoff { max_retries: 1 },
        }
    }
}

/// Error type shared by every subsystem in the core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("cryptographic error: {0}")]
    CryptoError(String),

    #[error("policy rejection: {0}")]
    PolicyRejection(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("noise protocol error: {0}")]
    Noise(#[from] snow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TransportFailure(_) => ErrorCategory::Transport,
            Self::ProtocolError(_) => ErrorCategory::Protocol,
            Self::CryptoError(_) | Self::Noise(_) => ErrorCategory::Crypto,
            Self::PolicyRejection(_) => ErrorCategory::Policy,
            Self::StoreError(_) | Self::Io(_) => ErrorCategory::Store,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => ErrorCategory::Store,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.category().severity()
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        self.category().retry_strategy()
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self.retry_strategy(), RetryStrategy::NoRetry)
    }
}
