//!   Message types used by the protocols in the crate
//!
#![allow(non_snake_case)]
#![allow(clippy::large_enum_variant)]
use crate::algorithms::shamir::{verify_share, SecretShare};
use crate::error::Error;
use curv::{BigInt, FE, GE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Formatter};
use zeroize::Zeroize;

/// Implements conversion of a message into the payload of one of its variants
macro_rules! payload_of {
    ($message:ident :: $variant:ident => $payload:ty) => {
        impl From<$message> for Option<$payload> {
            fn from(m: $message) -> Option<$payload> {
                match m {
                    $message::$variant(payload) => Some(payload),
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

/// key generation related message data types
pub mod keygen {
    use super::{BigInt, FeldmanVSS, GE};
    use crate::algorithms::bit_commitment::{BitCommitmentProof, BitCommitmentPublic};
    use crate::algorithms::schnorr::DlogProof;
    use crate::algorithms::square_free::SquareFreeProof;
    use paillier::EncryptionKey;
    use serde::{Deserialize, Serialize};

    /// Enumerates messages used by key generation algorithm
    #[derive(Debug, Clone, Deserialize, Serialize, Display)]
    pub enum Message {
        R1(Phase1Broadcast),
        R2(DecommitPublicKey),
        R3(FeldmanVSS),
        R4(DlogProof),
    }

    pub type InMsg = crate::protocol::InputMessage<Message>;
    pub type OutMsg = crate::protocol::OutputMessage<Message>;

    impl InMsg {
        pub fn is_duplicate(&self, current_msg_set: &[InMsg]) -> bool {
            current_msg_set.iter().any(|m| m.sender == self.sender)
        }
    }

    payload_of!(Message::R1 => Phase1Broadcast);
    payload_of!(Message::R2 => DecommitPublicKey);
    payload_of!(Message::R3 => FeldmanVSS);
    payload_of!(Message::R4 => DlogProof);

    /// Initial broadcast in the key generation protocol
    ///
    /// Contains:
    /// * public Paillier key and the proof that its modulus is square-free
    /// * commitment to partial public EC schema key
    /// * public bit commitment setup and the proof of its well-formedness
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Phase1Broadcast {
        pub e: EncryptionKey,
        pub com: BigInt,
        pub correct_key_proof: SquareFreeProof,
        pub bit_commitment: BitCommitmentPublic,
        pub bit_commitment_proof: BitCommitmentProof,
    }

    /// Decommitment of partial public EC schema key
    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    pub struct DecommitPublicKey {
        pub blind_factor: BigInt,
        pub y_i: GE,
    }
}

/// Message data types used by the signing algorithm
pub mod signing {
    use super::{BigInt, FE, GE};
    use crate::algorithms::mta::{MessageA, MessageB};
    use crate::algorithms::schnorr::{DlogProof, DoubleDlogProof};
    use serde::{Deserialize, Serialize};

    pub type InMsg = crate::protocol::InputMessage<Message>;
    pub type OutMsg = crate::protocol::OutputMessage<Message>;

    /// Initial message of the signing protocol, sent to each peer
    ///
    /// Contains commitment to $` g^{\gamma_{i}} `$ and the first message ( `MessageA` ) of `MtA` protocol,
    /// whose range proof is made against the bit commitment setup of the recipient
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SignBroadcastPhase1 {
        pub com: BigInt,
        pub mta_a: MessageA,
    }

    /// Bob's responses to `MessageA`: `MtA` for $` \gamma_{j} `$ and `MtAwc` for $` w_{j} `$
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MtaResponses {
        pub gamma: MessageB,
        pub omega: MessageB,
    }

    /// $` \delta_{i} `$ along with the decommitment of $` g^{\gamma_{i}} `$ and ZKP of knowing $` \gamma_{i} `$
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Phase3Broadcast {
        pub delta_i: FE,
        pub blind_factor: BigInt,
        pub g_gamma_i: GE,
        pub gamma_proof: DlogProof,
    }

    /// Commitment to $` V_{i} , \space A_{i} `$, see `Phase5A` in the paper
    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    pub struct Phase5Com1 {
        pub com: BigInt,
    }

    /// Decommitment to $` V_{i} , \space A_{i} `$ and ZKPs of their discrete logarithms, see Phase 5B in the paper
    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    pub struct Phase5Decom1 {
        pub V_i: GE,
        pub A_i: GE,
        pub blind_factor: BigInt,
        pub V_proof: DoubleDlogProof,
        pub A_proof: DlogProof,
    }

    /// Commitment to $` U_{i}, \space T_{i} `$, see `Phase5C` in the paper
    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    pub struct Phase5Com2 {
        pub com: BigInt,
    }

    /// Decommitment to $` U_{i} , \space T_{i} `$, see Phase 5D in the paper
    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    pub struct Phase5Decom2 {
        pub U_i: GE,
        pub T_i: GE,
        pub blind_factor: BigInt,
    }

    /// the final broadcast of the signing protocol, partial signature $` s_{i} `$, see `Phase5E`
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Phase5Edata {
        pub s_i: FE,
    }

    /// Messages used by signing algorithm
    #[derive(Debug, Clone, Deserialize, Serialize, Display)]
    pub enum Message {
        R1(SignBroadcastPhase1),
        R2(MtaResponses),
        R3(Phase3Broadcast),
        R4(Phase5Com1),
        R5(Phase5Decom1),
        R6(Phase5Com2),
        R7(Phase5Decom2),
        R8(Phase5Edata),
    }

    impl InMsg {
        pub fn is_duplicate(&self, current_msg_set: &[InMsg]) -> bool {
            current_msg_set.iter().any(|m| m.sender == self.sender)
        }
    }

    payload_of!(Message::R1 => SignBroadcastPhase1);
    payload_of!(Message::R2 => MtaResponses);
    payload_of!(Message::R3 => Phase3Broadcast);
    payload_of!(Message::R4 => Phase5Com1);
    payload_of!(Message::R5 => Phase5Decom1);
    payload_of!(Message::R6 => Phase5Com2);
    payload_of!(Message::R7 => Phase5Decom2);
    payload_of!(Message::R8 => Phase5Edata);
}

/// The message by which the Shamir's secret share and the checks of the dealer's polynomial are sent to a counterparty
#[derive(Clone, Deserialize, Serialize)]
pub struct FeldmanVSS {
    pub checks: Vec<GE>,
    pub share: SecretShare,
}

impl Zeroize for FeldmanVSS {
    fn zeroize(&mut self) {
        self.share.0.zeroize();
        self.share.1.zeroize();
    }
}

impl Drop for FeldmanVSS {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Debug for FeldmanVSS {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeldmanVSS")
            .field("checks", &self.checks)
            .field("x", &self.share.0)
            .field("y", &"[***]".to_owned())
            .finish()
    }
}

impl FeldmanVSS {
    /// Verifies the share sent by the dealer whose public key is `y_j`
    ///
    /// The share has to be evaluated at `x`, the polynomial has to be of degree `threshold` and its
    /// free coefficient has to be bound to `y_j`.
    pub fn verify(&self, y_j: &GE, x: usize, threshold: usize) -> Result<(), Error> {
        if self.checks.len() != threshold + 1 {
            return Err(Error::malformed(format!(
                "{} checks for a polynomial of degree {}",
                self.checks.len(),
                threshold
            )));
        }
        if self.share.0 != x {
            return Err(Error::malformed(format!(
                "share is evaluated at {}, expected {}",
                self.share.0, x
            )));
        }
        if self.checks[0] != *y_j || !verify_share(&self.checks, &self.share) {
            log::error!("invalid share {:?}", self);
            return Err(Error::ShareInconsistent { index: x });
        }
        Ok(())
    }
}
