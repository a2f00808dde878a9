use thiserror::Error;

/// Errors surfaced by the `Store` trait. Unique-constraint violations are
/// split out from other database errors so callers (the block worker, in
/// particular) can branch on them separately from transport-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("initial schema setup failed: {0}")]
    Ddl(String),
}
