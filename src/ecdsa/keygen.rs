//! Multi-party key generation
//!
//! Multi-party key generation, as defined in *"Fast multiparty threshold ECDSA with Fast trustless setup"*, chapter 4.1
//!
//! * The key shard is sampled randomly by each party. The resulting public key is the sum of partial public keys and the resulting private key is the sum of individual private keys.
//! * Private keys are shared with Shamir's secret sharing schema. The signing threshold is fixed for a key.
//! * Traditional attacks on this schema are addressed by non-malleable commitments to a partial public key and by Feldman's verifiable secret sharing.
//! * Each party publishes its Paillier key and its bit commitment setup along with the proofs of their well-formedness.
//!   Both are used by the range proofs of the signing protocol.
//!
//! # Rounds
//!
//! 1. broadcast of the commitment to $`y_i = u_i \cdot G`$, the Paillier key and the bit commitment setup with their proofs
//! 2. broadcast of the decommitment of $`y_i`$
//! 3. Feldman's shares sent to each peer
//! 4. broadcast of the Schnorr proof of knowledge of the resulting key share $`x_i`$
//!
//! # Example
//!
//! * creates the channel `ingress` for incoming messages and the channel `egress` for outgoing messages
//! * generates new keys
//! * instantiates [`Phase1`] of the protocol
//! * creates the state machine and executes it
//! ```text
//!   let (ingress, rx) = crossbeam_channel::unbounded();
//!   let (tx, egress) = crossbeam_channel::unbounded();
//!   let security = SecurityParameters::default();
//!   let init_keys = InitialKeys::random(&security)?;
//!
//!   let start_phase = Box::new(Phase1::new(
//!             &parameters,
//!             security,
//!             init_keys,
//!             &parties,
//!             myself,
//!             Some(Duration::from_secs(60)),
//!         )?);
//!
//!   let mut machine = StateMachine::<KeyGeneratorTraits>::new(start_phase, &rx, &tx);
//!   // to do: connect ingress and egress to a network layer
//!   let result = machine.execute();
//! ```
//!
//! [`Phase1`]: struct.Phase1.html

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::iter::FromIterator;
use std::time::Duration;

use curv::elliptic::curves::traits::ECPoint;
use curv::{FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trace::trace;
use zeroize::Zeroize;

use crate::algorithms::bit_commitment::{BitCommitmentPublic, BitCommitmentSetup};
use crate::algorithms::paillier::PaillierKeys;
use crate::algorithms::schnorr::DlogProof;
use crate::algorithms::shamir::{evaluate_checks, lagrange_coefficients, make_shares, SecretShare};
use crate::algorithms::square_free::SquareFreeProof;
use crate::algorithms::sum_scalars;
use crate::ecdsa::messages::FeldmanVSS;
use crate::ecdsa::{sum_points, CommitmentScheme, InitialKeys, Parameters, SecurityParameters};
use crate::error::{Error, ErrorKind};
use crate::protocol::{Address, PartyIndex};
use crate::state_machine::{State, StateMachineTraits, Transition};

#[doc(inline)]
pub use super::messages::keygen::{DecommitPublicKey, InMsg, Message, OutMsg, Phase1Broadcast};

/// Enumerates error type which can be raised by key generation protocol
#[derive(Debug, Error)]
#[allow(clippy::large_enum_variant)]
pub enum KeygenError {
    #[error("key generation cannot be started: {0}")]
    ProtocolSetupError(String),
    #[error("keygen: timeout in {phase}")]
    Timeout { phase: String },
    #[error("unexpected message {message_type:?}, party {party}")]
    UnexpectedMessageType {
        message_type: Message,
        party: PartyIndex,
    },
    #[error("party {party}: {source}")]
    InvalidInput {
        party: PartyIndex,
        #[source]
        source: Error,
    },
    #[error(transparent)]
    Local(#[from] Error),
}

impl KeygenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeygenError::ProtocolSetupError(_) => ErrorKind::MalformedInput,
            KeygenError::Timeout { .. } | KeygenError::UnexpectedMessageType { .. } => {
                ErrorKind::Transport
            }
            KeygenError::InvalidInput { source, .. } | KeygenError::Local(source) => source.kind(),
        }
    }

    /// the party the error is attributed to, if any
    pub fn party(&self) -> Option<PartyIndex> {
        match self {
            KeygenError::UnexpectedMessageType { party, .. }
            | KeygenError::InvalidInput { party, .. } => Some(*party),
            _ => None,
        }
    }
}

/// Comprises various outputs of key generation protocol
///
/// The output value of key generation protocol and input parameter for signing protocol. Has to be saved to wallet/vault.
/// `party_public_shares` contains $`X_j = x_j \cdot G`$ of every party, own one included.
#[derive(Clone, Serialize, Deserialize)]
pub struct MultiPartyInfo {
    pub key_params: Parameters,
    pub security: SecurityParameters,
    pub own_party_index: PartyIndex,
    pub secret_share: SecretShare,
    pub public_key: GE,
    pub own_he_keys: PaillierKeys,
    pub party_he_keys: HashMap<PartyIndex, EncryptionKey>,
    pub party_to_point_map: Party2PointMap,
    pub party_public_shares: HashMap<PartyIndex, GE>,
    pub own_bit_commitment: BitCommitmentSetup,
    pub party_bit_commitments: HashMap<PartyIndex, BitCommitmentPublic>,
}

impl MultiPartyInfo {
    pub fn own_point(&self) -> usize {
        self.secret_share.0
    }
    pub fn own_share(&self) -> FE {
        self.secret_share.1
    }
}

impl Zeroize for MultiPartyInfo {
    fn zeroize(&mut self) {
        self.secret_share.1.zeroize();
    }
}

impl Drop for MultiPartyInfo {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Debug for MultiPartyInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiPartyInfo")
            .field("key_params", &self.key_params)
            .field("own_party_index", &self.own_party_index)
            .field("own_point", &self.own_point())
            .field("secret_share", &"[***]".to_owned())
            .field("public_key", &self.public_key)
            .field("own_he_keys", &self.own_he_keys)
            .field("party_to_point_map", &self.party_to_point_map)
            .finish()
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
fn to_hash_map_gen<K, V>(current_msg_set: Vec<InMsg>) -> Result<HashMap<K, V>, Vec<KeygenError>>
where
    K: std::cmp::Eq + std::hash::Hash + std::convert::From<PartyIndex> + std::fmt::Debug,
    V: std::fmt::Debug,
    Option<V>: std::convert::From<Message>,
{
    let (converted_messages, errors) =
        current_msg_set
            .iter()
            .fold((vec![], vec![]), |(mut values, mut errors), m| {
                let body: Option<V> = m.body.clone().into();
                match body {
                    Some(b) => values.push((m.sender, b)),
                    None => errors.push(KeygenError::UnexpectedMessageType {
                        message_type: m.body.clone(),
                        party: m.sender,
                    }),
                };
                (values, errors)
            });

    if errors.is_empty() {
        Ok(converted_messages
            .into_iter()
            .map(|(party, body)| (party.into(), body))
            .collect::<HashMap<K, V>>())
    } else {
        Err(errors)
    }
}

/// collects errors of per party checks
fn verify_each<'a, V: 'a>(
    messages: impl IntoIterator<Item = (&'a PartyIndex, &'a V)>,
    check: impl Fn(&PartyIndex, &V) -> Result<(), Error>,
) -> Vec<KeygenError> {
    messages
        .into_iter()
        .filter_map(|(party, msg)| {
            check(party, msg)
                .err()
                .map(|source| KeygenError::InvalidInput {
                    party: *party,
                    source,
                })
        })
        .collect()
}

fn fail(phase: &str, errors: Vec<KeygenError>) -> Transition<KeyGeneratorTraits> {
    let error_state = ErrorState::new(errors);
    log::error!("{} returns {:?}", phase, error_state);
    Transition::FinalState(Err(error_state))
}

#[doc(hidden)]
type OutMsgVec = Vec<OutMsg>;

/// Type definitions
#[derive(Debug)]
pub struct KeyGeneratorTraits;

impl StateMachineTraits for KeyGeneratorTraits {
    type InMsg = InMsg;
    type OutMsg = OutMsg;
    type FinalState = FinalState;
    type ErrorState = ErrorState;
}
pub type MachineResult = Result<FinalState, ErrorState>;

/// First phase of key generation protocol
///
/// Broadcasts:
/// * the commitment to public key of EC scheme
/// * public Paillier key and the proof that its modulus is square-free
/// * public bit commitment setup and the proof of its well-formedness
///
/// Receives all aforementioned from other parties and verifies proofs.
/// The proofs of the party are bound to its index, so that they cannot be replayed by another party.
#[derive(Debug)]
pub struct Phase1 {
    params: Parameters,
    security: SecurityParameters,
    keys: InitialKeys,
    own_party_index: PartyIndex,
    other_parties: BTreeSet<PartyIndex>,
    comm_scheme: CommitmentScheme,
    broadcast: Phase1Broadcast,
    timeout: Option<Duration>,
}

impl Phase1 {
    /// initializes the protocol
    ///
    /// `parties` has to list every party of the key, own index included.
    pub fn new(
        params: &Parameters,
        security: SecurityParameters,
        init_keys: InitialKeys,
        parties: &[PartyIndex],
        own_party_index: PartyIndex,
        timeout: Option<Duration>,
    ) -> Result<Self, KeygenError> {
        let acting_parties = BTreeSet::from_iter(parties.iter().cloned());
        if acting_parties.len() != parties.len() {
            return Err(KeygenError::ProtocolSetupError(
                "duplicate entries in the list of parties".to_string(),
            ));
        }
        if acting_parties.get(&own_party_index).is_none() {
            return Err(KeygenError::ProtocolSetupError(
                "own party index not in the list of parties".to_string(),
            ));
        }
        if acting_parties.len() != params.share_count() {
            return Err(KeygenError::ProtocolSetupError(format!(
                "{} parties listed, the key is shared among {}",
                acting_parties.len(),
                params.share_count()
            )));
        }
        if !PaillierKeys::is_valid(&init_keys.paillier_keys.ek, &init_keys.paillier_keys.dk) {
            return Err(KeygenError::ProtocolSetupError(
                "invalid own Paillier key".to_string(),
            ));
        }

        let id = own_party_index.as_bytes();
        let correct_key_proof = SquareFreeProof::prove(&init_keys.paillier_keys.dk, id, None)?;
        let bit_commitment_proof = init_keys.bit_commitment.prove(id, None);
        let comm_scheme = CommitmentScheme::from_points(&[&init_keys.y_i]);

        let broadcast = Phase1Broadcast {
            e: init_keys.paillier_keys.ek.clone(),
            com: comm_scheme.comm.clone(),
            correct_key_proof,
            bit_commitment: init_keys.bit_commitment.public(),
            bit_commitment_proof,
        };

        let mut other_parties = acting_parties;
        other_parties.remove(&own_party_index);
        log::debug!(
            "keygen {} of party {} with {:?}",
            params,
            own_party_index,
            other_parties
        );

        Ok(Phase1 {
            params: *params,
            security,
            keys: init_keys,
            own_party_index,
            other_parties,
            comm_scheme,
            broadcast,
            timeout,
        })
    }

    fn verify_broadcast(&self, party: &PartyIndex, msg: &Phase1Broadcast) -> Result<(), Error> {
        if msg.e.nn != &msg.e.n * &msg.e.n {
            return Err(Error::malformed("Paillier key: nn != n^2"));
        }
        let id = party.as_bytes();
        msg.correct_key_proof
            .verify(&msg.e.n, id, None, self.security.min_paillier_modulus_bits())?;
        msg.bit_commitment.verify(
            &msg.bit_commitment_proof,
            id,
            None,
            self.security.min_bit_commitment_modulus_bits(),
        )
    }
}

#[trace(pretty, prefix = "Phase1::")]
impl State<KeyGeneratorTraits> for Phase1 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::info!("Phase1 starts");
        Some(vec![OutMsg {
            recipient: Address::Broadcast,
            body: Message::R1(self.broadcast.clone()),
        }])
    }

    #[trace(disable(input))]
    fn is_message_expected(&self, msg: &InMsg, input: &[InMsg]) -> bool {
        matches!(msg.body, Message::R1(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(input))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<KeyGeneratorTraits> {
        let broadcasts = match to_hash_map_gen::<PartyIndex, Phase1Broadcast>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase1", e),
        };

        let errors = verify_each(broadcasts.iter(), |party, msg| {
            self.verify_broadcast(party, msg)
        });
        if !errors.is_empty() {
            return fail("Phase1", errors);
        }

        Transition::NewState(Box::new(Phase2 {
            params: self.params,
            security: self.security,
            keys: self.keys.clone(),
            own_party_index: self.own_party_index,
            other_parties: self.other_parties.clone(),
            comm_scheme: self.comm_scheme.clone(),
            commitments: broadcasts,
            timeout: self.timeout,
        }))
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![KeygenError::Timeout {
            phase: "phase1".to_string(),
        }]))
    }
    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Second phase of the protocol: broadcasts decommitments, verifies them, and shares the secret
struct Phase2 {
    params: Parameters,
    security: SecurityParameters,
    keys: InitialKeys,
    own_party_index: PartyIndex,
    other_parties: BTreeSet<PartyIndex>,
    comm_scheme: CommitmentScheme,
    commitments: HashMap<PartyIndex, Phase1Broadcast>,
    timeout: Option<Duration>,
}

impl Phase2 {
    /// assigns points $`1 \ldots n`$ to the parties in the order of their indices
    fn map_parties_to_points(&self) -> HashMap<PartyIndex, usize> {
        let sorted = self
            .other_parties
            .iter()
            .chain(std::iter::once(&self.own_party_index))
            .copied()
            .collect::<BTreeSet<_>>();
        sorted.into_iter().zip(1..).collect()
    }

    fn share_secret(
        &self,
        decomms: &HashMap<PartyIndex, DecommitPublicKey>,
    ) -> Result<Phase3, Error> {
        let points = self.map_parties_to_points();
        let (_, shares, checks) = make_shares(
            self.params.threshold() + 1,
            self.params.share_count(),
            Some(self.keys.u_i),
        )?;

        let mut outgoing_shares = HashMap::new();
        let mut own_share = None;
        for (party, x) in points.iter() {
            let share = shares
                .get(*x - 1)
                .copied()
                .ok_or_else(|| Error::malformed(format!("no share for point {}", x)))?;
            if *party == self.own_party_index {
                own_share = Some(share);
            } else {
                outgoing_shares.insert(*party, share);
            }
        }
        let own_share = own_share.ok_or_else(|| Error::malformed("own point is not mapped"))?;

        let mut pubkey_map = decomms
            .iter()
            .map(|(party, msg)| (*party, msg.y_i))
            .collect::<HashMap<PartyIndex, GE>>();
        pubkey_map.insert(self.own_party_index, self.keys.y_i);

        Ok(Phase3 {
            params: self.params,
            security: self.security,
            own_party_index: self.own_party_index,
            other_parties: self.other_parties.clone(),
            paillier_keys: self.keys.paillier_keys.clone(),
            bit_commitment: self.keys.bit_commitment.clone(),
            party_broadcasts: self.commitments.clone(),
            pubkey_map,
            points,
            own_share,
            outgoing_shares,
            own_checks: checks,
            timeout: self.timeout,
        })
    }
}

#[trace(pretty, prefix = "Phase2::")]
impl State<KeyGeneratorTraits> for Phase2 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase2 starts");
        Some(vec![OutMsg {
            recipient: Address::Broadcast,
            body: Message::R2(DecommitPublicKey {
                y_i: self.keys.y_i,
                blind_factor: self.comm_scheme.decomm.clone(),
            }),
        }])
    }

    #[trace(disable(input))]
    fn is_message_expected(&self, msg: &InMsg, input: &[InMsg]) -> bool {
        matches!(msg.body, Message::R2(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(input))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<KeyGeneratorTraits> {
        let decomms = match to_hash_map_gen::<PartyIndex, DecommitPublicKey>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase2", e),
        };

        let errors = verify_each(decomms.iter(), |party, decomm| {
            let comm = self
                .commitments
                .get(party)
                .ok_or_else(|| Error::malformed("no commitment"))?;
            let scheme = CommitmentScheme {
                comm: comm.com.clone(),
                decomm: decomm.blind_factor.clone(),
            };
            if scheme.verify_points(&[&decomm.y_i]) {
                Ok(())
            } else {
                Err(Error::proof("decommitment of the partial public key"))
            }
        });
        if !errors.is_empty() {
            return fail("Phase2", errors);
        }

        match self.share_secret(&decomms) {
            Ok(phase3) => Transition::NewState(Box::new(phase3)),
            Err(e) => fail("Phase2", vec![e.into()]),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![KeygenError::Timeout {
            phase: "phase2".to_string(),
        }]))
    }
}

/// Third phase of the protocol: sends Shamir's shares with Feldman's checks to peers and verifies received ones
struct Phase3 {
    params: Parameters,
    security: SecurityParameters,
    own_party_index: PartyIndex,
    other_parties: BTreeSet<PartyIndex>,
    paillier_keys: PaillierKeys,
    bit_commitment: BitCommitmentSetup,
    party_broadcasts: HashMap<PartyIndex, Phase1Broadcast>,
    pubkey_map: HashMap<PartyIndex, GE>,
    points: HashMap<PartyIndex, usize>,
    own_share: SecretShare,
    outgoing_shares: HashMap<PartyIndex, SecretShare>,
    own_checks: Vec<GE>,
    timeout: Option<Duration>,
}

impl Drop for Phase3 {
    fn drop(&mut self) {
        self.own_share.1.zeroize();
        self.outgoing_shares
            .values_mut()
            .for_each(|share| share.1.zeroize());
    }
}

impl Phase3 {
    /// $`X_j = \sum_{d} \sum_k x_j^k \cdot C_{d,k}`$ over all dealers $`d`$
    fn public_shares(
        &self,
        checks: &HashMap<PartyIndex, Vec<GE>>,
    ) -> Result<HashMap<PartyIndex, GE>, Error> {
        self.points
            .iter()
            .map(|(party, x)| {
                let evaluated = checks
                    .values()
                    .map(|c| evaluate_checks(c, *x))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((*party, sum_points(&evaluated)?))
            })
            .collect()
    }

    fn finish(&self, shares: &HashMap<PartyIndex, FeldmanVSS>) -> Result<MultiPartyInfo, Error> {
        let received = shares.values().map(|fvss| &fvss.share.1);
        let mut x_i = sum_scalars(received.chain(std::iter::once(&self.own_share.1)));

        let public_key = sum_points(self.pubkey_map.values())?;

        let mut checks = shares
            .iter()
            .map(|(party, fvss)| (*party, fvss.checks.clone()))
            .collect::<HashMap<_, _>>();
        checks.insert(self.own_party_index, self.own_checks.clone());
        let party_public_shares = self.public_shares(&checks)?;

        let own_public_share = party_public_shares
            .get(&self.own_party_index)
            .ok_or_else(|| Error::malformed("own public share is missing"))?;
        if *own_public_share != GE::generator() * x_i {
            x_i.zeroize();
            return Err(Error::ShareInconsistent {
                index: self.own_share.0,
            });
        }

        Ok(MultiPartyInfo {
            key_params: self.params,
            security: self.security,
            own_party_index: self.own_party_index,
            secret_share: (self.own_share.0, x_i),
            public_key,
            own_he_keys: self.paillier_keys.clone(),
            party_he_keys: self
                .party_broadcasts
                .iter()
                .map(|(party, msg)| (*party, msg.e.clone()))
                .collect(),
            party_to_point_map: Party2PointMap {
                points: self.points.clone(),
            },
            party_public_shares,
            own_bit_commitment: self.bit_commitment.clone(),
            party_bit_commitments: self
                .party_broadcasts
                .iter()
                .map(|(party, msg)| (*party, msg.bit_commitment.clone()))
                .collect(),
        })
    }
}

#[trace(pretty, prefix = "Phase3::")]
impl State<KeyGeneratorTraits> for Phase3 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase3 starts");

        Some(
            self.outgoing_shares
                .iter()
                .map(|(party, share_xy)| OutMsg {
                    recipient: Address::Peer(*party),
                    body: Message::R3(FeldmanVSS {
                        checks: self.own_checks.clone(),
                        share: *share_xy,
                    }),
                })
                .collect::<OutMsgVec>(),
        )
    }

    #[trace(disable(input))]
    fn is_message_expected(&self, msg: &InMsg, input: &[InMsg]) -> bool {
        matches!(msg.body, Message::R3(_)  if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(input))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<KeyGeneratorTraits> {
        let shares = match to_hash_map_gen::<PartyIndex, FeldmanVSS>(current_msg_set) {
            Ok(map) => map,
            Err(e) => return fail("Phase3", e),
        };

        let errors = verify_each(shares.iter(), |party, fvss| {
            let y_j = self
                .pubkey_map
                .get(party)
                .ok_or_else(|| Error::malformed("partial public key is missing"))?;
            fvss.verify(y_j, self.own_share.0, self.params.threshold())
        });
        if !errors.is_empty() {
            return fail("Phase3", errors);
        }

        match self.finish(&shares) {
            Ok(multiparty_shared) => Transition::NewState(Box::new(Phase4 {
                own_party_index: self.own_party_index,
                other_parties: self.other_parties.clone(),
                multiparty_shared,
                timeout: self.timeout,
            })),
            Err(e) => fail("Phase3", vec![e.into()]),
        }
    }

    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![KeygenError::Timeout {
            phase: "phase3".to_string(),
        }]))
    }
    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Last phase of the protocol: broadcasts `DlogProof` for the key share and verifies it against the public share of the sender
struct Phase4 {
    own_party_index: PartyIndex,
    other_parties: BTreeSet<PartyIndex>,
    multiparty_shared: MultiPartyInfo,
    timeout: Option<Duration>,
}

#[trace(pretty, prefix = "Phase4::")]
impl State<KeyGeneratorTraits> for Phase4 {
    fn start(&mut self) -> Option<OutMsgVec> {
        log::debug!("Phase4 starts");
        let dlog_proof = DlogProof::prove(&self.multiparty_shared.own_share());
        Some(vec![OutMsg {
            recipient: Address::Broadcast,
            body: Message::R4(dlog_proof),
        }])
    }

    #[trace(disable(current_msg_set))]
    fn is_message_expected(&self, msg: &InMsg, current_msg_set: &[InMsg]) -> bool {
        matches!(msg.body, Message::R4(_) if self.other_parties.contains(&msg.sender) && !msg.is_duplicate(current_msg_set))
    }

    #[trace(disable(current_msg_set))]
    fn is_input_complete(&self, current_msg_set: &[InMsg]) -> bool {
        is_broadcast_input_complete(current_msg_set, &self.other_parties)
    }

    fn consume(&self, current_msg_set: Vec<InMsg>) -> Transition<KeyGeneratorTraits> {
        let proofs = match to_hash_map_gen::<PartyIndex, DlogProof>(current_msg_set) {
            Ok(p) => p,
            Err(e) => return fail("Phase4", e),
        };

        let errors = verify_each(proofs.iter(), |party, proof| {
            let X_j = self
                .multiparty_shared
                .party_public_shares
                .get(party)
                .ok_or_else(|| Error::malformed("public share is missing"))?;
            if proof.V == *X_j && proof.verify() {
                Ok(())
            } else {
                Err(Error::proof("knowledge of the key share"))
            }
        });

        if errors.is_empty() {
            log::info!(
                "Phase4 ends successfully, party {}",
                self.own_party_index
            );
            Transition::FinalState(Ok(FinalState {
                multiparty_shared_info: self.multiparty_shared.clone(),
            }))
        } else {
            fail("Phase4", errors)
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
    fn timeout_outcome(&self, _current_msg_set: Vec<InMsg>) -> MachineResult {
        Err(ErrorState::new(vec![KeygenError::Timeout {
            phase: "phase4".to_string(),
        }]))
    }
}

/// Map of `PartyIndex` of each party into the x-coordinate of its share
///
/// Used in the calculation of Lagrange's coefficients in the signing protocol as only some parties take part in it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Party2PointMap {
    pub points: HashMap<PartyIndex, usize>,
}

#[trace(pretty)]
impl Party2PointMap {
    pub fn map_signing_parties_to_points(
        &self,
        signing_parties: &[PartyIndex],
    ) -> Result<Vec<usize>, Error> {
        signing_parties
            .iter()
            .map(|party| {
                self.points
                    .get(party)
                    .copied()
                    .ok_or_else(|| Error::malformed(format!("party {} is not mapped", party)))
            })
            .collect()
    }

    /// Lagrange's coefficient of `party` within the set of `signing_parties`
    pub fn calculate_lagrange_multiplier(
        &self,
        signing_parties: &[PartyIndex],
        party: PartyIndex,
    ) -> Result<FE, Error> {
        let position = signing_parties
            .iter()
            .position(|p| *p == party)
            .ok_or_else(|| Error::malformed(format!("party {} does not sign", party)))?;
        let points = self.map_signing_parties_to_points(signing_parties)?;
        let coefficients = lagrange_coefficients(&points)?;
        Ok(coefficients[position])
    }
}

/// Result of key generation protocol
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalState {
    pub multiparty_shared_info: MultiPartyInfo,
}

/// Container of `KeygenError` type
#[derive(Debug)]
pub struct ErrorState {
    errors: Vec<KeygenError>,
}

impl ErrorState {
    pub fn new(errors: Vec<KeygenError>) -> Self {
        ErrorState { errors }
    }

    pub fn errors(&self) -> &[KeygenError] {
        &self.errors
    }

    /// true if any error indicates that a party deviated from the protocol
    pub fn aborts_session(&self) -> bool {
        self.errors.iter().any(|e| e.kind().aborts_session())
    }
}
