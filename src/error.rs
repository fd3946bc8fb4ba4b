use thiserror::Error;

/// Typed failures callers may want to match on.
///
/// Everything else in the crate travels as `anyhow::Error` with context.
#[derive(Debug, Error, PartialEq)]
pub enum DashboardError {
    /// A consumer asked for the filter store outside an active session.
    #[error("filter store used outside of an active session (wrap the call in session::provide)")]
    NoActiveSession,

    #[error("required column '{0}' not found in CSV header")]
    MissingColumn(String),

    #[error("unknown chart '{0}' (expected bar, trend or parallel)")]
    UnknownChart(String),

    #[error("unknown filter field '{0}' (expected make, body or state)")]
    InvalidSelectionField(String),
}
