//! Reasons a run was not delivered.

use mteval_transport::Rejection;
use thiserror::Error;

/// A delivery that ended without the service accepting the run.
///
/// These never abort a call: the run is already durably recorded in the
/// `pending_failure` partition when one of them is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Transient failure; the call stopped early (cancelled) before retrying.
    #[error("transient delivery failure: {0}")]
    Transient(Rejection),

    /// The service refused the run; it will not be retried automatically.
    #[error("rejected permanently: {0}")]
    Permanent(Rejection),

    /// Every attempt allowed in this call failed transiently.
    #[error("gave up after {attempts} attempt(s): {last}")]
    ExhaustedRetries { attempts: u32, last: Rejection },
}

impl DeliveryError {
    pub fn rejection(&self) -> &Rejection {
        match self {
            DeliveryError::Transient(r) | DeliveryError::Permanent(r) => r,
            DeliveryError::ExhaustedRetries { last, .. } => last,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent(_))
    }
}
