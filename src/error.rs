//! Error types for contract registration and generation
//!
//! Everything in here is a configuration-time failure: a programmer error
//! that must halt startup or artifact generation. Request-time outcomes
//! live in [`crate::coerce::ValidationFailure`] and
//! [`crate::dispatch::DispatchFault`].

use thiserror::Error;

/// Result type for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Contract configuration and generation errors
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("API endpoint already registered: {endpoint}")]
    DuplicateEndpoint { endpoint: String },

    #[error("Invalid endpoint id {endpoint:?}: expected \"{{blueprint}}.{{handler}}\"")]
    InvalidEndpoint { endpoint: String },

    #[error("Registry refused further registrations after an earlier failure: {reason}")]
    RegistryPoisoned { reason: String },

    #[error("Can't generate a declaration for {ty} at {path}: {reason}")]
    UnsupportedType {
        ty: String,
        path: String,
        reason: String,
    },

    #[error("Response kind {kind:?} is declared by more than one schema")]
    DuplicateResponseKind { kind: String },

    #[error("Schema cycle detected: {}", chain.join(" -> "))]
    SchemaCycle { chain: Vec<String> },

    #[error("Imported symbol {symbol} from {module:?} collides with a generated declaration")]
    ImportCollision { symbol: String, module: String },

    #[error("No response mapping configured for expected signal {signal}")]
    UnmappedSignal { signal: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl ContractError {
    pub(crate) fn unsupported(
        ty: impl ToString,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            ty: ty.to_string(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}
