//! Error types for epicstore-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum StoreError {
    /// The app received its teardown event; no further dispatch is processed.
    #[error("app `{0}` is stopped")]
    AppStopped(String),

    /// An effect was invoked before a function was supplied.
    #[error("effect `{0}` has no function; call `use_fn` or `use_sync` first")]
    EffectNotProvided(String),

    /// `api.call` with a name no module registered.
    #[error("no api entry named `{0}`")]
    UnknownApi(String),

    /// An epic panicked under `EpicFailurePolicy::Propagate`.
    #[error("epic `{epic}` failed: {message}")]
    EpicFailed { epic: String, message: String },

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
