//! Multi-party signature generation
//!
//! Multi-party signature generation. Full description of the protocol can be found in ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf), chapters 4.2, 4.3, and Appendix A.
//!
//! The code of `Phases` of the protocol is provided with references to the corresponding phases in the paper.
//!
//! The challenging aspect of ECDSA algorithm is in its requirement for unique randomness to be multiplied by private key during the signing so that if each party has both randomness and key additively shared,
//! the product of sums is the sum of products, where each term of the sum contains two values coming from different parties
//! while both values have to be kept private from each other.
//!
//! To overcome this problem the signing protocol uses the multiplication-to-addition (`MtA`) conversion algorithm described in very detail in the paper, chapter 3.
//! The `MtA` algorithm uses additive homomorphic encryption schema. Zero-knowledge range proofs made over the bit commitment setup of the verifier
//! prevent the generation of a wrong signature, see [`mta`](../../algorithms/mta/index.html).
//!
//! # Rounds
//!
//! 1. commitment to $`\Gamma_i = \gamma_i \cdot G`$ and `MessageA` with $`Enc(k_i)`$, sent to each peer
//! 2. `MtA` response for $`\gamma_i`$ and `MtAwc` response for $`w_i = \lambda_i x_i`$, sent to each peer
//! 3. broadcast of $`\delta_i`$ along with the decommitment of $`\Gamma_i`$
//! 4. commitment to $`V_i, A_i`$ (5A)
//! 5. decommitment of $`V_i, A_i`$ with the proofs of their discrete logarithms (5B)
//! 6. commitment to $`U_i, T_i`$ (5C)
//! 7. decommitment of $`U_i, T_i`$ (5D)
//! 8. broadcast of the partial signature $`s_i`$ (5E)
//!
//! Every party obtains and verifies the complete signature before returning the result via state machine.
//!
//! # Example
//!
//! * creates the channel `ingress` for incoming messages and the channel `egress` for outgoing messages
//! * runs external algorithm to determine which parties will participate in signing
//! * instantiates `Phase1` of the protocol, where `message_hash` argument is not a message itself but the output of [`message_hash`](../fn.message_hash.html)
//! * creates state machine providing the `Phase1` object and channels as arguments
//! * executes the machine and obtains the result
//!
//! ```text
//!   let (ingress, rx) = crossbeam_channel::unbounded();
//!   let (tx, egress) = crossbeam_channel::unbounded();
//!
//!   // to do: determine which parties(nodes) will participate in threshold signing
//!   // and fill the vector `signing_parties` with their PartyIndexes
//!   let start_phase = Box::new(Phase1::new(&message_hash(message), key, &signing_parties, timeout)?);
//!
//!   let mut machine = StateMachine::<SigningTraits>::new(start_phase, &rx, &tx);
//!   // to do : connect ingress and egress to a network layer
//!   let machine_result = machine.execute();
//! ```

#![allow(non_snake_case)]
use super::keygen::MultiPartyInfo;
use super::messages::signing::{
    MtaResponses, Phase3Broadcast, Phase5Com1, Phase5Com2, Phase5Decom1, Phase5Decom2,
    Phase5Edata, SignBroadcastPhase1,
};
use super::signature::phase5::LocalSignature;
use crate::algorithms::mta::{complete, MessageA, MessageB, MtaMode};
use crate::algorithms::paillier::PaillierKeys;
use crate::algorithms::schnorr::DlogProof;
use crate::algorithms::{invmod, is_zero_scalar, modmul, modsub, sum_scalars, to_scalar};
use crate::ecdsa::{
    is_valid_curve_point, linear_combination, sum_points, CommitmentScheme, MessageHashType, Signature,
    SigningParameters,
};
use crate::error::{Error, ErrorKind};
use crate::protocol::{Address, PartyIndex};

use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::{BTreeSet, HashMap};

pub use super::messages::signing::{InMsg, Message, OutMsg};
use crate::state_machine::{State, StateMachineTraits, Transition};
use std::time::Duration;

use std::iter::FromIterator;
use trace::trace;
use zeroize::Zeroize;

/// Enumerates error types which can be raised by signing protocol
#[derive(Debug, Error)]
#[allow(clippy::large_enum_variant)]
pub enum SigningError {
    #[error("signing: timeout in {phase}")]
    Timeout { phase: String },
    #[error("unexpected message {message_type:?}, party {party}")]
    UnexpectedMessageType {
        message_type: Message,
        party: PartyIndex,
    },
    #[error("protocol setup error: {0}")]
    ProtocolSetupError(String),
    #[error("party {party}: {source}")]
    InvalidInput {
        party: PartyIndex,
        #[source]
        source: Error,
    },
    #[error(transparent)]
    Local(#[from] Error),
}

impl SigningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigningError::ProtocolSetupError(_) => ErrorKind::MalformedInput,
            SigningError::Timeout { .. } | SigningError::UnexpectedMessageType { .. } => {
                ErrorKind::Transport
            }
            SigningError::InvalidInput { source, .. } | SigningError::Local(source) => {
                source.kind()
            }
        }
    }

    /// the party the error is attributed to, if any
    pub fn party(&self) -> Option<PartyIndex> {
        match self {
            SigningError::UnexpectedMessageType { party, .. }
            | SigningError::InvalidInput { party, .. } => Some(*party),
            _ => None,
        }
    }
}

/// $`a \cdot b \mod q`$
fn scalar_product(a: &FE, b: &FE) -> FE {
    to_scalar(&modmul(&a.to_big_int(), &b.to_big_int(), &FE::q()))
}

/// The module dedicated to the partial signature of phase 5
mod phase5 {
    use super::{scalar_product, trace, CommitmentScheme, ECPoint, MessageHashType, FE, GE};
    use crate::algorithms::schnorr::{DlogProof, DoubleDlogProof};
    use crate::algorithms::{is_zero_scalar, sum_scalars};
    use crate::ecdsa::messages::signing::{Phase5Decom1, Phase5Decom2};
    use crate::ecdsa::{linear_combination, Signature};
    use crate::error::Error;
    use curv::elliptic::curves::traits::ECScalar;
    use std::fmt;
    use std::fmt::{Debug, Formatter};
    use zeroize::Zeroize;

    /// Represents the partial signature used by multiple sub-phases of phase 5 of the protocol
    #[derive(Clone)]
    pub struct LocalSignature {
        pub l_i: FE,
        pub rho_i: FE,
        pub R: GE,
        pub r: FE,
        pub s_i: FE,
    }

    impl Zeroize for LocalSignature {
        fn zeroize(&mut self) {
            self.l_i.zeroize();
            self.rho_i.zeroize();
            self.s_i.zeroize();
        }
    }

    impl Drop for LocalSignature {
        fn drop(&mut self) {
            self.zeroize();
        }
    }

    impl Debug for LocalSignature {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.debug_struct("LocalSignature")
                .field("R", &self.R)
                .field("r", &self.r)
                .finish()
        }
    }

    #[trace(pretty, prefix = "LocalSignature::")]
    impl LocalSignature {
        /// Initializes the data with $` R, \space k_{i}, \space \sigma_{i} `$ .
        /// Sets (t,t) sharing of the desired signature to $` s_{i} = m k_{i} + r \sigma_{i} `$.
        /// Chooses  $` \ell_{i}, \space \rho_{i}  \underset{R}{\in} Z_q `$
        #[trace(disable(k_i, sigma_i))]
        pub fn new(
            message_hash: &MessageHashType,
            R: &GE,
            k_i: &FE,
            sigma_i: &FE,
        ) -> Result<Self, Error> {
            let r = Signature::r_from_point(R);
            if is_zero_scalar(&r) {
                return Err(Error::arithmetic("r = 0"));
            }
            let s_i = sum_scalars(&[
                scalar_product(message_hash, k_i),
                scalar_product(&r, sigma_i),
            ]);
            Ok(Self {
                l_i: FE::new_random(),
                rho_i: FE::new_random(),
                R: *R,
                r,
                s_i,
            })
        }

        /// generates (Comm,Decomm) for $` V_{i} = s_i \cdot R + \ell_i \cdot G , \space A_{i} = \rho_i \cdot G `$
        pub fn phase5b_proof(&self) -> Result<(CommitmentScheme, Phase5Decom1), Error> {
            let g = GE::generator();
            let A_i = g * self.rho_i;
            let V_i = linear_combination(&[
                (&self.R, &self.s_i.to_big_int()),
                (&g, &self.l_i.to_big_int()),
            ])?;
            let scheme = CommitmentScheme::from_points(&[&V_i, &A_i]);
            let decomm = Phase5Decom1 {
                V_i,
                A_i,
                blind_factor: scheme.decomm.clone(),
                V_proof: DoubleDlogProof::prove(&self.R, &V_i, &self.s_i, &self.l_i),
                A_proof: DlogProof::prove(&self.rho_i),
            };
            Ok((scheme, decomm))
        }

        /// generates (Comm, Decomm) for $` U_{i} = \rho_i \cdot V, \space T_{i} = \ell_i \cdot A `$
        pub fn phase5d_proof(&self, V: &GE, A: &GE) -> (CommitmentScheme, Phase5Decom2) {
            let U_i = *V * self.rho_i;
            let T_i = *A * self.l_i;
            let scheme = CommitmentScheme::from_points(&[&U_i, &T_i]);
            let decomm = Phase5Decom2 {
                U_i,
                T_i,
                blind_factor: scheme.decomm.clone(),
            };
            (scheme, decomm)
        }

        /// calculates final signature as the sum of partial signatures, and verifies it using standard verification schema
        ///
        /// The signature is normalized to the lower half of the field.
        pub fn output_signature(
            &self,
            s_vec: &[FE],
            pubkey: &GE,
            message: &MessageHashType,
        ) -> Result<Signature, Error> {
            let s = sum_scalars(s_vec.iter().chain(std::iter::once(&self.s_i)));
            if is_zero_scalar(&s) {
                return Err(Error::arithmetic("s = 0"));
            }
            let sig = Signature { r: self.r, s }.normalize_s();
            if sig.verify(pubkey, message) {
                Ok(sig)
            } else {
                Err(Error::proof("ECDSA verification of the joint signature"))
            }
        }
    }
}

#[doc(hidden)]
type OutMsgVec = Vec<OutMsg>;

#[derive(Debug)]
pub struct SigningTraits;

impl StateMachineTraits for SigningTraits {
    type InMsg = InMsg;
    type OutMsg = OutMsg;
    type FinalState = SignedMessage;
    type ErrorState = ErrorState;
}

pub type MachineResult = Result<SignedMessage, ErrorState>;

/// Signature in (r,s)  format, and the hash of the signed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub signature: Signature,
    pub hash: MessageHashType,
}

/// vector of signing errors
#[derive(Debug)]
pub struct ErrorState {
    errors: Vec<SigningError>,
}

impl ErrorState {
    pub fn new(errors: Vec<SigningError>) -> Self {
        ErrorState { errors }
    }

    pub fn errors(&self) -> &[SigningError] {
        &self.errors
    }

    /// true if any error indicates that a party deviated from the protocol
    pub fn aborts_session(&self) -> bool {
        self.errors.iter().any(|e| e.kind().aborts_session())
    }
}

/// Checks whether all expected messages have been received so far from other parties
fn is_broadcast_input_complete(
    current_msg_set: &[InMsg],
    other_parties: &BTreeSet<PartyIndex>,
) -> bool {
    let senders = current_msg_set.iter().map(|m| m.sender).collect::<Vec<_>>();
    other_parties.iter().all(|p| senders.contains(p))
}

/// Extracts payloads form enum variants of input message into the hash map
#[trace(disable(current_msg_set), res = "{:?}")]
fn to_hash_map_gen<K, V>(current_msg_set: Vec<InMsg>) -> Result<HashMap<K, V>, SigningError>
where
    K: Eq + std::hash::Hash + From<PartyIndex> + std::fmt::Debug,
    V: std::fmt::Debug,
    Option<V>: From<Message>,
{
    let mut result = HashMap::new();
    for m in current_msg_set {
        let body: Option<V> = m.body.clone().into();
        match body {
            Some(b) => {
                result.insert(m.sender.into(), b);
            }
            // returns first failed result of into() operation on a message
            None => {
                return Err(SigningError::UnexpectedMessageType {
                    message_type: m.body,
                    party: m.sender,
                })
            }
        }
    }
    Ok(result)
}

/// collects errors of per party checks
fn verify_each<'a, V: 'a>(
    messages: impl IntoIterator<Item = (&'a PartyIndex, &'a V)>,
    check: impl Fn(&PartyIndex, &V) -> Result<(), Error>,
) -> Vec<SigningError> {
    messages
        .into_iter()
        .filter_map(|(party, msg)| {
            check(party, msg)
                .err()
                .map(|source| SigningError::InvalidInput {
                    party: *party,
                    source,
                })
        })
        .collect()
}

fn fail(phase: &str, errors: Vec<SigningError>) -> Transition<SigningTraits> {
    let error_state = ErrorState::new(errors);
    log::error!("{} returns {:?}", phase, error_state);
    Transition::FinalState(Err(error_state))
}

fn commitment_of<'a>(
    commitments: &'a HashMap<PartyIndex, BigInt>,
    party: &PartyIndex,
) -> Result<&'a BigInt, Error> {
    commitments
        .get(party)
        .ok_or_else(|| Error::malformed("commitment is missing"))
}

/// First phase of the signing protocol
///
/// * Initializes the protocol, see [`Phase1::new`](struct.Phase1.html#method.new)
/// * Sends the commitment to $` g^{\gamma_{i}} `$ to each peer
/// * Sends `MessageA` of `MtA` with $` Enc(k_{i}) `$ to each peer, the range proof is made over the setup of the peer
/// * Collects `MtA` inputs from other parties, verifies them against own setup and prepares the responses
pub struct Phase1 {
    params: SigningParameters,
    multi_party_info: MultiPartyInfo,
    other_parties: BTreeSet<PartyIndex>,
    lagrange: HashMap<PartyIndex, FE>,
    w_i: FE,
    k_i: FE,
    gamma_i: FE,
    g_gamma_i: GE,
    comm_scheme: CommitmentScheme,
    mta_a: HashMap<PartyIndex, MessageA>,
    timeout: Option<Duration>,
}

impl Drop for Phase1 {
    fn drop(&mut self) {
        self.w_i.zeroize();
        self.k_i.zeroize();
        self.gamma_i.zeroize();
    }
}

impl Phase1 {
    /// Initializes the protocol
    ///
    /// * Validates the list of signing parties and the key
    /// * Computes $` w_{i} = \lambda_{i} x_{i} `$, the additive share of the key within the set of signing parties
    /// * Samples  $` k_{i}, \space \gamma_{i}  \underset{R}{\in} Z_q `$
    pub fn new(
        message_hash: &MessageHashType,
        multi_party_info: MultiPartyInfo,
        parties: &[PartyIndex],
        timeout: Option<Duration>,
    ) -> Result<Self, SigningError> {
        let own_party_index = multi_party_info.own_party_index;
        let signing_parties = BTreeSet::from_iter(parties.iter().cloned());
        if signing_parties.len() != parties.len() {
            return Err(SigningError::ProtocolSetupError(
                "duplicate entries in signing parties' list".to_string(),
            ));
        }
        if !signing_parties.contains(&own_party_index) {
            return Err(SigningError::ProtocolSetupError(
                "own party index not in the list of signing parties".to_string(),
            ));
        }
        let required = multi_party_info.key_params.signers();
        if signing_parties.len() < required {
            return Err(Error::ThresholdUnmet {
                required,
                supplied: signing_parties.len(),
            }
            .into());
        }

        let mut other_parties = signing_parties.clone();
        other_parties.remove(&own_party_index);
        for party in other_parties.iter() {
            if !multi_party_info.party_he_keys.contains_key(party)
                || !multi_party_info.party_bit_commitments.contains_key(party)
                || !multi_party_info.party_public_shares.contains_key(party)
            {
                return Err(SigningError::ProtocolSetupError(format!(
                    "party {} does not share the key",
                    party
                )));
            }
        }
        if !PaillierKeys::is_valid(
            &multi_party_info.own_he_keys.ek,
            &multi_party_info.own_he_keys.dk,
        ) {
            return Err(SigningError::ProtocolSetupError(
                "invalid own Paillier key".to_string(),
            ));
        }
        if !is_valid_curve_point(multi_party_info.public_key.get_element()) {
            return Err(SigningError::ProtocolSetupError(
                "invalid public key".to_string(),
            ));
        }

        let sorted_parties = signing_parties.iter().copied().collect::<Vec<_>>();
        let lagrange = sorted_parties
            .iter()
            .map(|p| {
                multi_party_info
                    .party_to_point_map
                    .calculate_lagrange_multiplier(&sorted_parties, *p)
                    .map(|l| (*p, l))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        let lambda_i = lagrange
            .get(&own_party_index)
            .ok_or_else(|| Error::malformed("own Lagrange's coefficient is missing"))?;
        let w_i = scalar_product(lambda_i, &multi_party_info.own_share());

        let k_i = FE::new_random();
        let gamma_i = FE::new_random();
        let g_gamma_i = GE::generator() * gamma_i;
        let comm_scheme = CommitmentScheme::from_points(&[&g_gamma_i]);

        let mut mta_a = HashMap::new();
        for party in other_parties.iter() {
            let bob_setup = &multi_party_info.party_bit_commitments[party];
            let msg = MessageA::new(&k_i, &multi_party_info.own_he_keys.ek, bob_setup)?;
            mta_a.insert(*party, msg);
        }

        log::debug!(
            "signing by party {} with {:?}",
            own_party_index,
            other_parties
        );

        Ok(Phase1 {
            params: SigningParameters {
                keygen_params: multi_party_info.key_params,
                signing_parties,
                message_hash: *message_hash,
            },
            multi_party_info,
            other_parties,
            lagrange,
            w_i,
            k_i,
            gamma_i,
            g_gamma_i,
            comm_scheme,
            mta_a,
            timeout,
        })
    }

    /// Bob's side of `MtA`: responses to the messages of each party and the shares $`\beta_{ij}, \nu_{ij}`$
    fn respond(
        &self,
        inputs: &HashMap<PartyIndex, SignBroadcastPhase1>,
    ) -> Result<(HashMap<PartyIndex, MtaResponses>, Vec<FE>), Error> {
        let mut responses = HashMap::new();
        let mut shares = Vec::new();
        for (party, msg) in inputs.iter() {
            let alice_ek = &self.multi_party_info.party_he_keys[party];
            let alice_setup = &self.multi_party_info.party_bit_commitments[party];
            let (gamma, beta) =
                MessageB::new(&self.gamma_i, alice_ek, alice_setup, &msg.mta_a, MtaMode::MtA)?;
            let (omega, nu) =
                MessageB::new(&self.w_i, alice_ek, alice_setup, &msg.mta_a, MtaMode::MtAwc)?;
            responses.insert(*party, MtaResponses { gamma, omega });
            shares.push(beta);
            shares.push(nu);
        }
        Ok((responses, shares))
    }
}

#[trace(pretty, prefix = "Phase1::")]
impl State<SigningTraits> for Phase1 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase1 starts");
        let output = self
            .mta_a
            .iter()
            .map(|(party, mta_a)| OutMsg {
                recipient: Address::Peer(*party),
                body: Message::R1(SignBroadcastPhase1 {
                    com: self.comm_scheme.comm.clone(),
                    mta_a: mta_a.clone(),
                }),
            })
            .collect();
        Some(output)
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        matches!(msg.body, Message::R1(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(current_msg_set))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<SigningTraits> {
        let inputs = match to_hash_map_gen::<PartyIndex, SignBroadcastPhase1>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase1", vec![e]),
        };

        let own_setup = self.multi_party_info.own_bit_commitment.public();
        let errors = verify_each(inputs.iter(), |party, msg| {
            msg.mta_a
                .verify(&self.multi_party_info.party_he_keys[party], &own_setup)
        });
        if !errors.is_empty() {
            return fail("Phase1", errors);
        }

        let (responses, bob_shares) = match self.respond(&inputs) {
            Ok(r) => r,
            Err(e) => return fail("Phase1", vec![e.into()]),
        };

        Transition::NewState(Box::new(Phase2 {
            params: self.params.clone(),
            multi_party_info: self.multi_party_info.clone(),
            other_parties: self.other_parties.clone(),
            lagrange: self.lagrange.clone(),
            w_i: self.w_i,
            k_i: self.k_i,
            gamma_i: self.gamma_i,
            g_gamma_i: self.g_gamma_i,
            comm_scheme: self.comm_scheme.clone(),
            own_mta_ciphertexts: self
                .mta_a
                .iter()
                .map(|(party, msg)| (*party, msg.c.clone()))
                .collect(),
            commitments: inputs
                .iter()
                .map(|(party, msg)| (*party, msg.com.clone()))
                .collect(),
            responses,
            bob_shares,
            timeout: self.timeout,
        }))
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![SigningError::Timeout {
            phase: "phase1".to_string(),
        }]))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Second phase of the signing protocol, see (2) in the paper
///
/// * Sends `MtA` and `MtAwc` responses to each peer
/// * Verifies the responses of the peers, the point of `MtAwc` has to be $`\lambda_j X_j`$ of the peer
/// * Computes $` \delta_{i} = k_{i} \gamma_{i} + \sum_{j \ne i} (\alpha_{ij} + \beta_{ji}) `$
///   and $` \sigma_{i} = k_{i} w_{i} + \sum_{j \ne i} (\mu_{ij} + \nu_{ji}) `$
struct Phase2 {
    params: SigningParameters,
    multi_party_info: MultiPartyInfo,
    other_parties: BTreeSet<PartyIndex>,
    lagrange: HashMap<PartyIndex, FE>,
    w_i: FE,
    k_i: FE,
    gamma_i: FE,
    g_gamma_i: GE,
    comm_scheme: CommitmentScheme,
    own_mta_ciphertexts: HashMap<PartyIndex, BigInt>,
    commitments: HashMap<PartyIndex, BigInt>,
    responses: HashMap<PartyIndex, MtaResponses>,
    bob_shares: Vec<FE>,
    timeout: Option<Duration>,
}

impl Drop for Phase2 {
    fn drop(&mut self) {
        self.w_i.zeroize();
        self.k_i.zeroize();
        self.gamma_i.zeroize();
        self.bob_shares.iter_mut().for_each(|s| s.zeroize());
    }
}

impl Phase2 {
    /// Alice's side of `MtA`: verifies the response of `party` and returns $`(\alpha_{ij}, \mu_{ij})`$
    fn complete_mta(&self, party: &PartyIndex, msg: &MtaResponses) -> Result<(FE, FE), Error> {
        let info = &self.multi_party_info;
        let c_a = self
            .own_mta_ciphertexts
            .get(party)
            .ok_or_else(|| Error::malformed("MessageA was not sent to the party"))?;
        let own_setup = info.own_bit_commitment.public();
        msg.gamma
            .verify(c_a, &info.own_he_keys.ek, &own_setup, MtaMode::MtA)?;
        msg.omega
            .verify(c_a, &info.own_he_keys.ek, &own_setup, MtaMode::MtAwc)?;

        let X_j = info
            .party_public_shares
            .get(party)
            .ok_or_else(|| Error::malformed("public share is missing"))?;
        let lambda_j = self
            .lagrange
            .get(party)
            .ok_or_else(|| Error::malformed("Lagrange's coefficient is missing"))?;
        if msg.omega.committed_point() != Some(&(*X_j * *lambda_j)) {
            return Err(Error::proof("MtAwc point does not match the public share"));
        }

        let alpha = complete(&info.own_he_keys, &msg.gamma.c)?;
        let mu = complete(&info.own_he_keys, &msg.omega.c)?;
        Ok((alpha, mu))
    }
}

#[trace(pretty, prefix = "Phase2::")]
impl State<SigningTraits> for Phase2 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase2 starts");
        let output = self
            .responses
            .iter()
            .map(|(party, responses)| OutMsg {
                recipient: Address::Peer(*party),
                body: Message::R2(responses.clone()),
            })
            .collect();
        Some(output)
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        matches!(msg.body, Message::R2(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(current_msg_set))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<SigningTraits> {
        let responses = match to_hash_map_gen::<PartyIndex, MtaResponses>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase2", vec![e]),
        };

        let mut errors = Vec::new();
        let mut delta_terms = vec![scalar_product(&self.k_i, &self.gamma_i)];
        let mut sigma_terms = vec![scalar_product(&self.k_i, &self.w_i)];
        for (party, msg) in responses.iter() {
            match self.complete_mta(party, msg) {
                Ok((alpha, mu)) => {
                    delta_terms.push(alpha);
                    sigma_terms.push(mu);
                }
                Err(source) => errors.push(SigningError::InvalidInput {
                    party: *party,
                    source,
                }),
            }
        }
        if !errors.is_empty() {
            delta_terms.iter_mut().for_each(|x| x.zeroize());
            sigma_terms.iter_mut().for_each(|x| x.zeroize());
            return fail("Phase2", errors);
        }

        // bob_shares interleave beta and nu
        for pair in self.bob_shares.chunks(2) {
            delta_terms.push(pair[0]);
            sigma_terms.push(pair[1]);
        }
        let delta_i = sum_scalars(&delta_terms);
        let sigma_i = sum_scalars(&sigma_terms);
        delta_terms.iter_mut().for_each(|x| x.zeroize());
        sigma_terms.iter_mut().for_each(|x| x.zeroize());

        Transition::NewState(Box::new(Phase3 {
            params: self.params.clone(),
            public_key: self.multi_party_info.public_key,
            other_parties: self.other_parties.clone(),
            k_i: self.k_i,
            gamma_i: self.gamma_i,
            g_gamma_i: self.g_gamma_i,
            comm_scheme: self.comm_scheme.clone(),
            commitments: self.commitments.clone(),
            delta_i,
            sigma_i,
            timeout: self.timeout,
        }))
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![SigningError::Timeout {
            phase: "phase2".to_string(),
        }]))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Third phase of the signing protocol, see (3) and (4) in the paper
///
/// * Broadcasts $` \delta_{i} `$ and the decommitment of $` \Gamma_{i} `$ with the proof of knowledge of $` \gamma_{i} `$
/// * Verifies decommitments and proofs of other parties
/// * Computes $` R = \delta^{-1} \sum_{i} \Gamma_{i} `$ and the partial signature, see [`phase5::LocalSignature`](phase5/struct.LocalSignature.html)
struct Phase3 {
    params: SigningParameters,
    public_key: GE,
    other_parties: BTreeSet<PartyIndex>,
    k_i: FE,
    gamma_i: FE,
    g_gamma_i: GE,
    comm_scheme: CommitmentScheme,
    commitments: HashMap<PartyIndex, BigInt>,
    delta_i: FE,
    sigma_i: FE,
    timeout: Option<Duration>,
}

impl Drop for Phase3 {
    fn drop(&mut self) {
        self.k_i.zeroize();
        self.gamma_i.zeroize();
        self.delta_i.zeroize();
        self.sigma_i.zeroize();
    }
}

impl Phase3 {
    fn check_decommitment(&self, party: &PartyIndex, msg: &Phase3Broadcast) -> Result<(), Error> {
        let scheme = CommitmentScheme {
            comm: commitment_of(&self.commitments, party)?.clone(),
            decomm: msg.blind_factor.clone(),
        };
        if !scheme.verify_points(&[&msg.g_gamma_i]) {
            return Err(Error::proof("decommitment of Gamma_i"));
        }
        if msg.gamma_proof.V != msg.g_gamma_i || !msg.gamma_proof.verify() {
            return Err(Error::proof("knowledge of gamma_i"));
        }
        Ok(())
    }

    /// $` R = (\sum_i \delta_i)^{-1} \cdot \sum_i \Gamma_i `$
    fn compute_R(&self, broadcasts: &HashMap<PartyIndex, Phase3Broadcast>) -> Result<GE, Error> {
        let delta = sum_scalars(
            broadcasts
                .values()
                .map(|msg| &msg.delta_i)
                .chain(std::iter::once(&self.delta_i)),
        );
        if is_zero_scalar(&delta) {
            return Err(Error::arithmetic("delta = 0"));
        }
        let delta_inv = to_scalar(&invmod(&delta.to_big_int(), &FE::q())?);
        let gamma = sum_points(
            broadcasts
                .values()
                .map(|msg| &msg.g_gamma_i)
                .chain(std::iter::once(&self.g_gamma_i)),
        )?;
        Ok(gamma * delta_inv)
    }
}

#[trace(pretty, prefix = "Phase3::")]
impl State<SigningTraits> for Phase3 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase3 starts");
        Some(vec![OutMsg {
            recipient: Address::Broadcast,
            body: Message::R3(Phase3Broadcast {
                delta_i: self.delta_i,
                blind_factor: self.comm_scheme.decomm.clone(),
                g_gamma_i: self.g_gamma_i,
                gamma_proof: DlogProof::prove(&self.gamma_i),
            }),
        }])
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        matches!(msg.body, Message::R3(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(current_msg_set))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<SigningTraits> {
        let broadcasts = match to_hash_map_gen::<PartyIndex, Phase3Broadcast>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase3", vec![e]),
        };

        let errors = verify_each(broadcasts.iter(), |party, msg| {
            self.check_decommitment(party, msg)
        });
        if !errors.is_empty() {
            return fail("Phase3", errors);
        }

        let local_sig = self.compute_R(&broadcasts).and_then(|R| {
            LocalSignature::new(&self.params.message_hash, &R, &self.k_i, &self.sigma_i)
        });
        let (local_sig, (p5_commit, p5_decommit)) =
            match local_sig.and_then(|sig| sig.phase5b_proof().map(|proof| (sig, proof))) {
                Ok(x) => x,
                Err(e) => return fail("Phase3", vec![e.into()]),
            };

        Transition::NewState(Box::new(Phase5ab {
            params: self.params.clone(),
            public_key: self.public_key,
            other_parties: self.other_parties.clone(),
            local_sig,
            p5_commit,
            p5_decommit,
            subphase: SubPhaseAB::A,
            p5_commitments: HashMap::new(),
            timeout: self.timeout,
        }))
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![SigningError::Timeout {
            phase: "phase3".to_string(),
        }]))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Discriminates the sub phase in Phase 5 protocol
#[derive(Copy, Clone, PartialEq)]
enum SubPhaseAB {
    A,
    B,
}

/// Fifth phase of the protocol, sub-phases A and B
///
/// Subphase A, see  (5A) in the paper:
/// * Broadcasts [`Phase5Com1`](../messages/signing/struct.Phase5Com1.html)
///
/// Subphase B, see (5B) in the paper:
/// * Broadcasts [`Phase5Decom1`](../messages/signing/struct.Phase5Decom1.html)
/// * Verifies each party's decommitment and the proofs of knowledge of $`(s_i, \ell_i)`$ and $`\rho_i`$
/// * Computes $` V = -m \cdot G - r \cdot Y + \sum_i V_i , \space A = \sum_i A_i `$
#[derive(Clone)]
struct Phase5ab {
    params: SigningParameters,
    public_key: GE,
    other_parties: BTreeSet<PartyIndex>,
    local_sig: LocalSignature,
    p5_commit: CommitmentScheme,
    p5_decommit: Phase5Decom1,
    subphase: SubPhaseAB,
    p5_commitments: HashMap<PartyIndex, BigInt>,
    timeout: Option<Duration>,
}

impl Phase5ab {
    fn check_comms_A(&self, party: &PartyIndex, msg: &Phase5Decom1) -> Result<(), Error> {
        let scheme = CommitmentScheme {
            comm: commitment_of(&self.p5_commitments, party)?.clone(),
            decomm: msg.blind_factor.clone(),
        };
        if !scheme.verify_points(&[&msg.V_i, &msg.A_i]) {
            return Err(Error::proof("decommitment of V_i, A_i"));
        }
        if !msg.V_proof.verify(&self.local_sig.R, &msg.V_i) {
            return Err(Error::proof("knowledge of s_i, l_i"));
        }
        if msg.A_proof.V != msg.A_i || !msg.A_proof.verify() {
            return Err(Error::proof("knowledge of rho_i"));
        }
        Ok(())
    }

    fn compute_va(&self, decomms: &HashMap<PartyIndex, Phase5Decom1>) -> Result<(GE, GE), Error> {
        let q = FE::q();
        let one = BigInt::one();
        let minus_m = modsub(&BigInt::zero(), &self.params.message_hash.to_big_int(), &q);
        let minus_r = modsub(&BigInt::zero(), &self.local_sig.r.to_big_int(), &q);
        let g = GE::generator();

        let own = std::iter::once(&self.p5_decommit);
        let mut terms = vec![(&g, &minus_m), (&self.public_key, &minus_r)];
        terms.extend(
            decomms
                .values()
                .chain(own.clone())
                .map(|msg| (&msg.V_i, &one)),
        );
        let V = linear_combination(&terms)?;
        let A = sum_points(decomms.values().chain(own).map(|msg| &msg.A_i))?;
        Ok((V, A))
    }
}

#[trace(pretty, prefix = "Phase5a::")]
impl State<SigningTraits> for Phase5ab {
    fn start(&mut self) -> Option<OutMsgVec> {
        match &self.subphase {
            SubPhaseAB::A => {
                log::debug!("Subphase A starts");
                Some(vec![OutMsg {
                    recipient: Address::Broadcast,
                    body: Message::R4(Phase5Com1 {
                        com: self.p5_commit.comm.clone(),
                    }),
                }])
            }
            SubPhaseAB::B => {
                log::debug!("Subphase B starts");
                Some(vec![OutMsg {
                    recipient: Address::Broadcast,
                    body: Message::R5(self.p5_decommit.clone()),
                }])
            }
        }
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        (match msg.body {
            Message::R4(_) => self.subphase == SubPhaseAB::A,
            Message::R5(_) => self.subphase == SubPhaseAB::B,
            _ => false,
        }) && self.other_parties.contains(&msg.sender)
            && !msg.is_duplicate(current_msg_set)
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<SigningTraits> {
        match &self.subphase {
            SubPhaseAB::A => match to_hash_map_gen::<PartyIndex, Phase5Com1>(current_msg_set) {
                Ok(comms) => {
                    let mut new_state = self.clone();
                    new_state
                        .p5_commitments
                        .extend(comms.iter().map(|(party, msg)| (*party, msg.com.clone())));
                    new_state.subphase = SubPhaseAB::B;
                    Transition::NewState(Box::new(new_state))
                }
                Err(e) => fail("Phase 5a", vec![e]),
            },
            SubPhaseAB::B => {
                let decomms = match to_hash_map_gen::<PartyIndex, Phase5Decom1>(current_msg_set) {
                    Ok(map) => map,
                    Err(e) => return fail("Phase 5b", vec![e]),
                };
                let errors = verify_each(decomms.iter(), |party, msg| {
                    self.check_comms_A(party, msg)
                });
                if !errors.is_empty() {
                    return fail("Phase 5b", errors);
                }

                match self.compute_va(&decomms) {
                    Ok((V, A)) => {
                        let (p5_commit2, p5_decommit2) = self.local_sig.phase5d_proof(&V, &A);
                        Transition::NewState(Box::new(Phase5cde {
                            params: self.params.clone(),
                            public_key: self.public_key,
                            other_parties: self.other_parties.clone(),
                            local_sig: self.local_sig.clone(),
                            p5_commit2,
                            p5_decommit2,
                            p5_commitments2: HashMap::new(),
                            subphase: SubPhaseCDE::C,
                            timeout: self.timeout,
                        }))
                    }
                    Err(e) => fail("Phase 5b", vec![e.into()]),
                }
            }
        }
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![SigningError::Timeout {
            phase: "phase5a".to_string(),
        }]))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Discriminates the sub phase in Phase 5 protocol
#[derive(Copy, Clone, PartialEq)]
enum SubPhaseCDE {
    C,
    D,
    E,
}

/// Fifth phase of the protocol, sub phases C, D and E
///
/// Subphase C, see  (5C) in the paper:
/// * Broadcasts [`Phase5Com2`](../messages/signing/struct.Phase5Com2.html)
///
/// Subphase D, see (5D) in the paper:
/// * Broadcasts [`Phase5Decom2`](../messages/signing/struct.Phase5Decom2.html)
/// * Verifies each party's decommitment and checks $` \sum_i T_i = \sum_i U_i `$
///
/// Subphase E:, see (5E) in the paper
/// * Broadcasts the partial signature [`Phase5Edata`](../messages/signing/struct.Phase5Edata.html)
/// * Reconstructs full signature and verifies it using standard method
#[derive(Clone)]
struct Phase5cde {
    params: SigningParameters,
    public_key: GE,
    other_parties: BTreeSet<PartyIndex>,
    local_sig: LocalSignature,
    p5_commit2: CommitmentScheme,
    p5_decommit2: Phase5Decom2,
    p5_commitments2: HashMap<PartyIndex, BigInt>,
    subphase: SubPhaseCDE,
    timeout: Option<Duration>,
}

impl Phase5cde {
    fn check_comms(&self, party: &PartyIndex, msg: &Phase5Decom2) -> Result<(), Error> {
        let scheme = CommitmentScheme {
            comm: commitment_of(&self.p5_commitments2, party)?.clone(),
            decomm: msg.blind_factor.clone(),
        };
        if scheme.verify_points(&[&msg.U_i, &msg.T_i]) {
            Ok(())
        } else {
            Err(Error::proof("decommitment of U_i, T_i"))
        }
    }

    fn check_phase5_consistency(
        &self,
        decomms: &HashMap<PartyIndex, Phase5Decom2>,
    ) -> Result<(), Error> {
        let own = std::iter::once(&self.p5_decommit2);
        let t_sum = sum_points(decomms.values().chain(own.clone()).map(|msg| &msg.T_i))?;
        let u_sum = sum_points(decomms.values().chain(own).map(|msg| &msg.U_i))?;
        if t_sum == u_sum {
            Ok(())
        } else {
            Err(Error::proof("phase 5 check: sum of T_i differs from sum of U_i"))
        }
    }
}

#[trace(pretty, prefix = "Phase5c::")]
impl State<SigningTraits> for Phase5cde {
    fn start(&mut self) -> Option<OutMsgVec> {
        match &self.subphase {
            SubPhaseCDE::C => {
                log::debug!("Subphase C starts");
                Some(vec![OutMsg {
                    recipient: Address::Broadcast,
                    body: Message::R6(Phase5Com2 {
                        com: self.p5_commit2.comm.clone(),
                    }),
                }])
            }
            SubPhaseCDE::D => {
                log::debug!("Subphase D starts");
                Some(vec![OutMsg {
                    recipient: Address::Broadcast,
                    body: Message::R7(self.p5_decommit2.clone()),
                }])
            }
            SubPhaseCDE::E => {
                log::debug!("Subphase E starts");
                Some(vec![OutMsg {
                    recipient: Address::Broadcast,
                    body: Message::R8(Phase5Edata {
                        s_i: self.local_sig.s_i,
                    }),
                }])
            }
        }
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        (match msg.body {
            Message::R6(_) => self.subphase == SubPhaseCDE::C,
            Message::R7(_) => self.subphase == SubPhaseCDE::D,
            Message::R8(_) => self.subphase == SubPhaseCDE::E,
            _ => false,
        }) && self.other_parties.contains(&msg.sender)
            && !msg.is_duplicate(current_msg_set)
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<SigningTraits> {
        match self.subphase {
            SubPhaseCDE::C => {
                let comms = match to_hash_map_gen::<PartyIndex, Phase5Com2>(current_msg_set) {
                    Ok(map) => map,
                    Err(e) => return fail("Phase 5c", vec![e]),
                };

                let mut new_state = self.clone();
                new_state
                    .p5_commitments2
                    .extend(comms.iter().map(|(party, msg)| (*party, msg.com.clone())));
                new_state.subphase = SubPhaseCDE::D;
                Transition::NewState(Box::new(new_state))
            }
            SubPhaseCDE::D => {
                let decomms = match to_hash_map_gen::<PartyIndex, Phase5Decom2>(current_msg_set) {
                    Ok(map) => map,
                    Err(e) => return fail("Phase 5d", vec![e]),
                };

                let errors = verify_each(decomms.iter(), |party, msg| self.check_comms(party, msg));
                if !errors.is_empty() {
                    return fail("Phase 5d", errors);
                }
                // the check involves every party, hence the failure is not attributed
                if let Err(e) = self.check_phase5_consistency(&decomms) {
                    return fail("Phase 5d", vec![e.into()]);
                }

                let mut new_state = self.clone();
                new_state.subphase = SubPhaseCDE::E;
                Transition::NewState(Box::new(new_state))
            }
            SubPhaseCDE::E => {
                let local_signatures =
                    match to_hash_map_gen::<PartyIndex, Phase5Edata>(current_msg_set) {
                        Ok(map) => map,
                        Err(e) => return fail("Phase 5e", vec![e]),
                    };
                let sig_vec = local_signatures
                    .into_iter()
                    .map(|(_, v)| v.s_i)
                    .collect::<Vec<_>>();
                match self.local_sig.output_signature(
                    &sig_vec,
                    &self.public_key,
                    &self.params.message_hash,
                ) {
                    Ok(signature) => {
                        log::info!("Phase 5e ends successfully");
                        Transition::FinalState(Ok(SignedMessage {
                            signature,
                            hash: self.params.message_hash,
                        }))
                    }
                    Err(e) => fail("Phase 5e", vec![e.into()]),
                }
            }
        }
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        let phase = match self.subphase {
            SubPhaseCDE::C => "phase5c",
            SubPhaseCDE::D => "phase5d",
            SubPhaseCDE::E => "phase5e",
        };
        Err(ErrorState::new(vec![SigningError::Timeout {
            phase: phase.to_string(),
        }]))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::keygen::tests::run_keygen;
    use crate::ecdsa::test_network::run_protocol;
    use crate::ecdsa::{message_hash, Parameters};
    use crate::state_machine::BoxedState;

    fn keys(params: Parameters) -> anyhow::Result<Vec<MultiPartyInfo>> {
        run_keygen(params, None, |_, _, _| {})
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("keygen failed: {:?}", e))
    }

    fn run_signing(
        infos: &[MultiPartyInfo],
        signers: &[usize],
        hash: MessageHashType,
        timeout: Option<Duration>,
        tamper: impl Fn(&PartyIndex, &PartyIndex, &mut Message) + Send + 'static,
    ) -> Vec<Result<SignedMessage, ErrorState>> {
        let parties = signers
            .iter()
            .map(|i| infos[*i].own_party_index)
            .collect::<Vec<_>>();

        let starts = signers
            .iter()
            .map(|i| {
                let info = infos[*i].clone();
                let parties = parties.clone();
                let own = info.own_party_index;
                let start = move || -> BoxedState<SigningTraits> {
                    Box::new(Phase1::new(&hash, info, &parties, timeout).expect("signing setup"))
                };
                (own, start)
            })
            .collect::<Vec<_>>();

        run_protocol::<SigningTraits, _, _, _>(starts, tamper)
            .into_iter()
            .map(|outcome| outcome.expect("input channel closed"))
            .collect()
    }

    #[test]
    fn signing() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let params = Parameters::new(2, 3)?;
        let infos = keys(params)?;
        let public_key = infos[0].public_key;
        let hash = message_hash(b"the message to sign");

        let mut signatures = Vec::new();
        for signers in &[vec![0, 2], vec![1, 2], vec![0, 1, 2]] {
            let results = run_signing(&infos, signers, hash, None, |_, _, _| {})
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("signing failed: {:?}", e))?;
            assert_eq!(results.len(), signers.len());
            // every party outputs the same signature
            assert!(results.iter().all(|r| *r == results[0]));

            let signed = &results[0];
            assert_eq!(signed.hash, hash);
            assert!(signed.signature.is_low_s());
            assert!(signed.signature.verify(&public_key, &hash));
            assert!(!signed
                .signature
                .verify(&public_key, &message_hash(b"another message")));
            signatures.push(signed.signature);
        }
        // fresh nonces in every session
        assert_ne!(signatures[0].r, signatures[1].r);
        assert_ne!(signatures[1].r, signatures[2].r);
        Ok(())
    }

    /// runs 2 of 3 signing where the first party's R1 message to the second one is tampered with
    fn run_with_cheater(
        tamper: impl Fn(&mut SignBroadcastPhase1) + Send + 'static,
    ) -> anyhow::Result<()> {
        let params = Parameters::new(2, 3)?;
        let infos = keys(params)?;
        let cheater = infos[0].own_party_index;
        let victim = infos[1].own_party_index;

        let results = run_signing(
            &infos,
            &[0, 1],
            message_hash(b"message"),
            Some(Duration::from_secs(20)),
            move |from, to, msg| {
                if let Message::R1(m) = msg {
                    if *from == cheater && *to == victim {
                        tamper(m);
                    }
                }
            },
        );

        let victim_errors = results[1].as_ref().unwrap_err();
        assert!(victim_errors.aborts_session());
        let error = &victim_errors.errors()[0];
        assert_eq!(error.kind(), ErrorKind::ProofInvalid);
        assert_eq!(error.party(), Some(cheater));

        // the cheater is left waiting for the victim
        let cheater_errors = results[0].as_ref().unwrap_err();
        assert_eq!(cheater_errors.errors()[0].kind(), ErrorKind::Transport);
        Ok(())
    }

    #[test]
    fn broken_commitment_aborts() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        run_with_cheater(|m| m.com = m.com.clone() + BigInt::one())
    }

    #[test]
    fn altered_mta_ciphertext_aborts() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        // the range proof no longer matches the ciphertext
        run_with_cheater(|m| m.mta_a.c = m.mta_a.c.clone() + BigInt::one())
    }

    #[test]
    fn corrupted_range_proof_response_aborts() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        run_with_cheater(|m| m.mta_a.range_proof.tamper_s1())
    }

    #[test]
    fn setup_errors() -> anyhow::Result<()> {
        let params = Parameters::new(2, 3)?;
        let infos = keys(params)?;
        let hash = message_hash(b"message");
        let own = infos[0].own_party_index;
        let others = infos
            .iter()
            .map(|info| info.own_party_index)
            .collect::<Vec<_>>();

        let err = Phase1::new(&hash, infos[0].clone(), &[own], None).err();
        assert_eq!(
            err.map(|e| e.kind()),
            Some(ErrorKind::ThresholdUnmet)
        );

        let err = Phase1::new(&hash, infos[0].clone(), &others[1..], None).err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::MalformedInput));

        let err = Phase1::new(&hash, infos[0].clone(), &[own, own, others[1]], None).err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::MalformedInput));

        let stranger = PartyIndex::from(100);
        let err = Phase1::new(&hash, infos[0].clone(), &[own, stranger], None).err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::MalformedInput));
        Ok(())
    }
}
