/*
 * Error taxonomy for the hosting layer. Licensing refusals, tolerated vs.
 * propagated COM results, per-property persistence failures, and the fatal
 * thread-affinity violation each get their own variant so callers can react
 * to the class of failure rather than parse message strings.
 */

use thiserror::Error;

use crate::com::ComError;

#[derive(Debug, Error)]
pub enum AxError {
    /// Component creation was refused for lack of a runtime license.
    #[error("control class '{0}' is not licensed for runtime use")]
    NotLicensed(String),

    /// A negotiated interface returned a non-success result that the caller
    /// does not tolerate.
    #[error("external component call failed during {context}: {source}")]
    External {
        context: &'static str,
        #[source]
        source: ComError,
    },

    /// An operation was attempted in a lifecycle or storage state that
    /// forbids it (e.g. reassigning persisted state of a different kind).
    #[error("invalid operation: {0}")]
    InvalidState(String),

    /// Envelope or bag codec failure. Fail-fast, unlike per-property errors.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The subsystem was entered from a thread other than the one that
    /// created it. Fatal; the apartment affinity is a hard requirement.
    #[error("hosting engine used outside its single-threaded apartment")]
    WrongThread,

    /// A real window handle was required but could not be produced.
    #[error("no window handle available: {0}")]
    NoWindow(String),

    /// A balanced-counter or transition invariant was broken.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl AxError {
    pub(crate) fn external(context: &'static str, source: ComError) -> Self {
        AxError::External { context, source }
    }

    /// Unwraps back to the COM result for answers crossing the boundary
    /// outward; non-COM failures travel as an unexpected-failure code.
    pub(crate) fn into_com(self) -> ComError {
        match self {
            AxError::External { source, .. } => source,
            other => ComError::Unexpected(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AxError>;
