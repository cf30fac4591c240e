//! Error types for the storage layer.

use mangashelf_core::UnknownVariant;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during ledger, catalog and engagement operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced comic, chapter, wallet, ban or other record is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The user already owns this comic or chapter.
    #[error("already purchased")]
    AlreadyPurchased,

    /// A chapter purchase was attempted while the full comic is owned.
    #[error("already owns the full comic")]
    AlreadyOwnsComic,

    /// Wallet missing or balance below the amount to debit.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Another wallet already holds the username.
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    /// The user already has an active ban or suspension.
    #[error("user already banned: {0}")]
    AlreadyBanned(String),

    /// Non-admin called an admin-only operation.
    #[error("unauthorized: {0} is not an admin")]
    Unauthorized(String),

    /// The user has neither bought the chapter nor its comic.
    #[error("chapter {0} has not been purchased")]
    NotEntitled(String),

    /// The user is currently banned or suspended.
    #[error("user is banned: {reason}")]
    Banned { reason: String },

    /// Coin amounts and suspension lengths must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Username does not satisfy the length or character rules.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Username is withheld by an administrator.
    #[error("username is reserved: {0}")]
    UsernameReserved(String),

    /// Username reservation already exists.
    #[error("username already reserved: {0}")]
    AlreadyReserved(String),

    /// Review rating outside 1..=5.
    #[error("invalid rating: {0}")]
    InvalidRating(i16),

    /// Catalog prices cannot be negative.
    #[error("invalid price: {0}")]
    InvalidPrice(i64),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A stored enum column held an unknown value.
    #[error("corrupt row: {0}")]
    CorruptRow(#[from] UnknownVariant),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
