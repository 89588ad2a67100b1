//! Error types

mod api;
mod condition;
mod store;
mod validation;

pub use api::*;
pub use condition::*;
pub use store::*;
pub use validation::*;

/// Top-level error for table engine operations.
///
/// Remote failures never surface here through the gateway: [`crate::api::Api`]
/// reports them to the user and hands back `None`. This type covers local
/// failures and programming errors in table configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error talking to the remote API.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local validation blocked the operation before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Durable key-value store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cached payload could not be encoded or decoded.
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A named function was not found in the registry.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A registration was rejected.
    #[error("Registry error: {0}")]
    Registry(String),

    /// A confirmation condition failed to evaluate.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// Action descriptor is malformed.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Operation requires an active add/edit session.
    #[error("No row is being edited")]
    NotEditing,

    /// Row index does not address a row in the table.
    #[error("Row index {0} out of range")]
    RowOutOfRange(usize),
}
