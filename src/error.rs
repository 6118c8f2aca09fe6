//! Error taxonomy shared by the arithmetic kernel, the zero knowledge proofs and the protocols
//!
//! Every failure of a cryptographic building block is reported as one of five kinds.
//! [`ErrorKind::aborts_session`] tells whether the failure indicates active deviation of a peer,
//! in which case the enclosing multiparty session has to be abandoned. The remaining kinds are local
//! and can be retried with fresh randomness or corrected input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the building blocks of the crate
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("proof failed verification: {0}")]
    ProofInvalid(String),
    #[error("secret share with index {index} is inconsistent with the published commitments")]
    ShareInconsistent { index: usize },
    #[error("arithmetic failure: {0}")]
    ArithmeticFailure(String),
    #[error("{supplied} shares supplied, at least {required} are required")]
    ThresholdUnmet { required: usize, supplied: usize },
}

/// Classification of errors
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ErrorKind {
    MalformedInput,
    ProofInvalid,
    ShareInconsistent,
    ArithmeticFailure,
    ThresholdUnmet,
    /// timeouts and out-of-order messages reported by the state machine
    Transport,
}

impl ErrorKind {
    /// True for the kinds which indicate that some party deviated from the protocol
    pub fn aborts_session(self) -> bool {
        matches!(self, ErrorKind::ProofInvalid | ErrorKind::ShareInconsistent)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::ProofInvalid(_) => ErrorKind::ProofInvalid,
            Error::ShareInconsistent { .. } => ErrorKind::ShareInconsistent,
            Error::ArithmeticFailure(_) => ErrorKind::ArithmeticFailure,
            Error::ThresholdUnmet { .. } => ErrorKind::ThresholdUnmet,
        }
    }

    pub(crate) fn malformed(context: impl Into<String>) -> Self {
        Error::MalformedInput(context.into())
    }

    pub(crate) fn proof(context: impl Into<String>) -> Self {
        Error::ProofInvalid(context.into())
    }

    pub(crate) fn arithmetic(context: impl Into<String>) -> Self {
        Error::ArithmeticFailure(context.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn session_abort_classification() {
        assert!(Error::proof("range proof").kind().aborts_session());
        assert!(Error::ShareInconsistent { index: 2 }.kind().aborts_session());
        assert!(!Error::arithmetic("gcd(a, n) != 1").kind().aborts_session());
        assert!(!Error::malformed("short buffer").kind().aborts_session());
        assert!(!Error::ThresholdUnmet {
            required: 3,
            supplied: 2
        }
        .kind()
        .aborts_session());
        assert!(!ErrorKind::Transport.aborts_session());
    }
}
