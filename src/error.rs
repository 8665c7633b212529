// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

/// Pipeline-wide error taxonomy.
///
/// Connectors recover locally from `MalformedInput` and `UnknownProduct`
/// (the offending record is dropped and logged); everything else propagates
/// to the caller. `InvariantViolation` is fatal and unwinds to `main`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Lookup by key failed in a service store.
    #[error("key not found: {0}")]
    NotFound(String),

    /// CUSIP absent from the product or PV01 table.
    #[error("unknown CUSIP: {0}")]
    UnknownProduct(String),

    /// Ill-formed text record or fractional price.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Internal inconsistency, e.g. best bid/offer on an empty side.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for the per-record errors a subscribing connector absorbs.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedInput(_) | PipelineError::UnknownProduct(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
