//!  Multiparty threshold ECDSA
//!
//!  The scheme follows ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf)
//!  and its successor ["One Round Threshold ECDSA with Identifiable Abort"](https://eprint.iacr.org/2020/540.pdf).
//!
//!  The module implements following protocols:
//! * Key generation, see [`keygen`]
//! * Signing, see [`signature`]
//!
#![allow(non_snake_case)]
use crate::algorithms::bit_commitment::BitCommitmentSetup;
use crate::algorithms::paillier::{DecryptionMode, PaillierKeys};
use crate::algorithms::sha::HSha256;
use crate::algorithms::{invmod, is_zero_scalar, modmul, to_scalar};
use crate::encoding::{scalar_from_bytes, scalar_to_bytes, SCALAR_BYTES};
use crate::error::Error;
use crate::protocol::PartyIndex;
use curv::arithmetic::traits::Samplable;
use curv::cryptographic_primitives::commitments::hash_commitment::HashCommitment;
use curv::cryptographic_primitives::commitments::traits::Commitment;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE, PK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use zeroize::Zeroize;

pub mod keygen;
pub mod messages;
pub mod signature;
#[cfg(test)]
pub(crate) mod test_network;

/// Parameters associated with shared key in threshold schema
///
/// # Key Attributes
///
/// * `share count` - number of parties which hold shards of the key
/// * `threshold` - number of parties required to produce a signature minus 1 so that $` \min N_{required} = threshold + 1 `$
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Parameters {
    threshold: usize,   //t
    share_count: usize, //n
}

impl Parameters {
    /// Constructs new Parameters conditioned they satisfy `2 <= min_signers <= share_count`.
    ///
    /// The threshold is the degree of the polynomial used in sharing, that is `threshold` = `min_signers` - 1
    pub fn new(min_signers: usize, share_count: usize) -> Result<Self, Error> {
        if min_signers < 2 {
            return Err(Error::malformed(format!(
                "number of signers must be at least 2, got {}",
                min_signers
            )));
        }
        if min_signers > share_count {
            return Err(Error::malformed(format!(
                "number of signers {} cannot be greater than number of shares {}",
                min_signers, share_count
            )));
        }
        Ok(Parameters {
            threshold: min_signers - 1,
            share_count,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn share_count(&self) -> usize {
        self.share_count
    }

    pub fn signers(&self) -> usize {
        self.threshold + 1
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{threshold: {}, share_count: {}}}",
            self.threshold, self.share_count
        )
    }
}

/// Sizes of the moduli and the choice of Paillier decryption
///
/// A party generates its own keys with these sizes and rejects keys of other parties which are shorter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityParameters {
    pub paillier_prime_bits: usize,
    pub bit_commitment_prime_bits: usize,
    pub decryption_mode: DecryptionMode,
}

impl Default for SecurityParameters {
    fn default() -> Self {
        Self {
            paillier_prime_bits: 1024,
            bit_commitment_prime_bits: 1024,
            decryption_mode: DecryptionMode::Crt,
        }
    }
}

impl SecurityParameters {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// a product of two primes of `n` bits has at least `2n - 1` bits
    pub fn min_paillier_modulus_bits(&self) -> usize {
        2 * self.paillier_prime_bits - 1
    }

    pub fn min_bit_commitment_modulus_bits(&self) -> usize {
        2 * self.bit_commitment_prime_bits - 1
    }
}

pub type MessageHashType = FE;

/// SHA-256 of the message reduced modulo the order of the curve
pub fn message_hash(message: &[u8]) -> MessageHashType {
    to_scalar(&BigInt::from(&HSha256::digest(message)[..]))
}

///  Initial values for signing algorithm
///
///  The signing algorithm starts knowing `PartyIndexes` of participants and the hash of the message
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SigningParameters {
    pub keygen_params: Parameters,
    pub signing_parties: BTreeSet<PartyIndex>,
    pub message_hash: MessageHashType,
}

impl SigningParameters {
    pub fn signing_party_count(&self) -> usize {
        self.signing_parties.len()
    }
}

/// Keys generated by a party at the start of key generation
///
/// `u_i, y_i` is the key pair whose secret part is shared among parties, it becomes obsolete after the sharing round.
/// Paillier keys and the bit commitment setup are used later in the signing protocol,
/// hence they have to be moved out before `InitialKeys` is dropped.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct InitialKeys {
    pub u_i: FE,
    pub y_i: GE,
    pub paillier_keys: PaillierKeys,
    pub bit_commitment: BitCommitmentSetup,
}

impl InitialKeys {
    pub fn random(security: &SecurityParameters) -> Result<Self, Error> {
        let u_i = FE::new_random();
        let y_i = GE::generator() * u_i;
        let paillier_keys =
            PaillierKeys::random(security.paillier_prime_bits, security.decryption_mode);
        let bit_commitment =
            BitCommitmentSetup::generate(security.bit_commitment_prime_bits, false)?;
        Ok(Self {
            u_i,
            y_i,
            paillier_keys,
            bit_commitment,
        })
    }
}

impl Display for InitialKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialKeys")
            .field("u_i", &"[***]".to_owned())
            .field("y_i", &self.y_i)
            .field("paillier keys", &self.paillier_keys)
            .field("bit commitment", &self.bit_commitment)
            .finish()
    }
}

impl Debug for InitialKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

pub(crate) fn is_valid_curve_point(pk: PK) -> bool {
    PK::from_slice(&pk.serialize_uncompressed()).is_ok()
}

/// Sum of points, fails if the sum is the point at infinity
pub(crate) fn sum_points<'a>(points: impl IntoIterator<Item = &'a GE>) -> Result<GE, Error> {
    let mut it = points.into_iter();
    let first = it
        .next()
        .ok_or_else(|| Error::malformed("sum of no points"))?
        .get_element();
    let sum = it.try_fold(first, |acc, p| {
        acc.combine(&p.get_element())
            .map_err(|e| Error::arithmetic(format!("sum of points: {}", e)))
    })?;
    GE::from_bytes(&sum.serialize_uncompressed()[1..])
        .map_err(|e| Error::arithmetic(format!("sum of points: {:?}", e)))
}

/// $`\sum_i k_i \cdot P_i`$ with integer coefficients, terms with a coefficient divisible by $`q`$ are skipped
pub(crate) fn linear_combination(terms: &[(&GE, &BigInt)]) -> Result<GE, Error> {
    let points = terms
        .iter()
        .map(|(point, k)| (*point, to_scalar(k)))
        .filter(|(_, k)| !is_zero_scalar(k))
        .map(|(point, k)| *point * k)
        .collect::<Vec<_>>();
    sum_points(&points)
}

fn x_coordinate(point: &GE) -> BigInt {
    BigInt::from(&point.get_element().serialize_uncompressed()[1..33])
}

/// The result of ECDSA signing algorithm
///
/// The signature the schema with
///
/// * cyclic group $` \mathcal{G} `$ of prime order $`q`$ and generator $` g `$
/// * message $` m `$ , private key $` x `$
/// * mapping $` F : \mathcal{G} \to \mathbb{Z}_q `$, hash function $` H(t) `$
/// * random  $` k \in \mathbb{Z}_{q} `$
///
/// The signature contains
/// ```math
///    r = F(g^k) , \space s = k^{-1}(H(m) + x r) \mod q
/// ```
/// Signatures produced by the crate are normalized so that $`s \le q/2`$.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub r: FE,
    pub s: FE,
}

impl Signature {
    /// $`r`$ of the signature with nonce point `R`
    pub fn r_from_point(R: &GE) -> FE {
        to_scalar(&x_coordinate(R))
    }

    /// replaces $`s`$ with $`q - s`$ if $`s > q/2`$
    pub fn normalize_s(self) -> Self {
        let q = FE::q();
        let s = self.s.to_big_int();
        if s > (q.clone() >> 1usize) {
            Self {
                r: self.r,
                s: to_scalar(&(q - s)),
            }
        } else {
            self
        }
    }

    pub fn is_low_s(&self) -> bool {
        self.s.to_big_int() <= (FE::q() >> 1usize)
    }

    /// verifies the signature using public key and the hash of the message
    pub fn verify(&self, pubkey: &GE, message: &MessageHashType) -> bool {
        if is_zero_scalar(&self.r) || is_zero_scalar(&self.s) {
            return false;
        }
        let q = FE::q();
        let s_inv = match invmod(&self.s.to_big_int(), &q) {
            Ok(s_inv) => s_inv,
            Err(_) => return false,
        };
        let u1 = modmul(&message.to_big_int(), &s_inv, &q);
        let u2 = modmul(&self.r.to_big_int(), &s_inv, &q);
        match linear_combination(&[(&GE::generator(), &u1), (pubkey, &u2)]) {
            Ok(point) => Self::r_from_point(&point) == self.r,
            Err(_) => false,
        }
    }

    /// $`r \Vert s`$, 64 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = scalar_to_bytes(&self.r);
        bytes.extend(scalar_to_bytes(&self.s));
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 2 * SCALAR_BYTES {
            return Err(Error::malformed(format!(
                "signature has {} bytes, expected {}",
                bytes.len(),
                2 * SCALAR_BYTES
            )));
        }
        Ok(Self {
            r: scalar_from_bytes(&bytes[..SCALAR_BYTES])?,
            s: scalar_from_bytes(&bytes[SCALAR_BYTES..])?,
        })
    }
}

///  Non-malleable commitment scheme
///
/// Hash commitment to a sequence of curve points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommitmentScheme {
    pub comm: BigInt,
    pub decomm: BigInt,
}

impl CommitmentScheme {
    fn message(points: &[&GE]) -> BigInt {
        let bytes = points
            .iter()
            .flat_map(|p| p.get_element().serialize().to_vec())
            .collect::<Vec<_>>();
        BigInt::from(&bytes[..])
    }

    pub fn from_points(points: &[&GE]) -> Self {
        let decomm = BigInt::sample(256);
        let comm = HashCommitment::create_commitment_with_user_defined_randomness(
            &Self::message(points),
            &decomm,
        );
        CommitmentScheme { comm, decomm }
    }

    /// verifies the commitment against the points it is opened with
    pub fn verify_points(&self, points: &[&GE]) -> bool {
        points.iter().all(|p| is_valid_curve_point(p.get_element()))
            && HashCommitment::create_commitment_with_user_defined_randomness(
                &Self::message(points),
                &self.decomm,
            ) == self.comm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::sum_scalars;
    use crate::error::ErrorKind;
    use curv::arithmetic::traits::Converter;

    fn xy_to_key_slice(x: &BigInt, y: &BigInt) -> Vec<u8> {
        let mut v = vec![4u8];
        for coordinate in &[x, y] {
            let bytes = BigInt::to_vec(coordinate);
            v.extend(vec![0u8; 32 - bytes.len()]);
            v.extend(bytes);
        }
        v
    }

    #[test]
    fn pk_utilities() {
        assert!(is_valid_curve_point(GE::random_point().get_element()));
        let xpk = xy_to_key_slice(
            &BigInt::sample_below(&FE::q()),
            &BigInt::sample_below(&FE::q()),
        );
        assert!(PK::from_slice(xpk.as_slice()).is_err());
    }

    #[test]
    fn parameters() {
        let params = Parameters::new(2, 3).unwrap();
        assert_eq!(params.threshold(), 1);
        assert_eq!(params.signers(), 2);
        assert_eq!(params.share_count(), 3);
        assert_eq!(
            Parameters::new(1, 3).unwrap_err().kind(),
            ErrorKind::MalformedInput
        );
        assert!(Parameters::new(4, 3).is_err());
    }

    #[test]
    fn security_parameters_from_json() -> anyhow::Result<()> {
        let params = SecurityParameters::from_json(r#"{"paillier_prime_bits": 512}"#)?;
        assert_eq!(params.paillier_prime_bits, 512);
        assert_eq!(params.bit_commitment_prime_bits, 1024);
        assert_eq!(params.decryption_mode, DecryptionMode::Crt);

        let params = SecurityParameters::from_json(r#"{"decryption_mode": "Totient"}"#)?;
        assert_eq!(params.decryption_mode, DecryptionMode::Totient);
        assert!(SecurityParameters::from_json("[]").is_err());
        Ok(())
    }

    fn sign_locally(x: &FE, m: &FE) -> Signature {
        let q = FE::q();
        loop {
            let k = FE::new_random();
            let r = Signature::r_from_point(&(GE::generator() * k));
            if is_zero_scalar(&r) {
                continue;
            }
            let rx = modmul(&r.to_big_int(), &x.to_big_int(), &q);
            let k_inv = invmod(&k.to_big_int(), &q).unwrap();
            let s = to_scalar(&modmul(&k_inv, &(m.to_big_int() + rx), &q));
            if !is_zero_scalar(&s) {
                return Signature { r, s };
            }
        }
    }

    #[test]
    fn signature_verification() -> anyhow::Result<()> {
        let x = FE::new_random();
        let public_key = GE::generator() * x;
        let m = message_hash(b"ecdsa");
        let signature = sign_locally(&x, &m);
        assert!(signature.verify(&public_key, &m));

        let normalized = signature.normalize_s();
        assert!(normalized.is_low_s());
        assert!(normalized.verify(&public_key, &m));
        assert_eq!(normalized.normalize_s(), normalized);

        assert!(!signature.verify(&public_key, &message_hash(b"another message")));
        assert!(!signature.verify(&(GE::generator() * FE::new_random()), &m));
        let zero_s = Signature {
            s: FE::zero(),
            ..signature
        };
        assert!(!zero_s.verify(&public_key, &m));

        let bytes = normalized.to_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!(Signature::from_bytes(&bytes)?, normalized);
        assert!(Signature::from_bytes(&bytes[1..]).is_err());
        Ok(())
    }

    #[test]
    fn points_and_commitments() -> anyhow::Result<()> {
        let a = FE::new_random();
        let b = FE::new_random();
        let g = GE::generator();
        let A = g * a;
        let B = g * b;
        assert_eq!(sum_points(&[A, B])?, g * sum_scalars(&[a, b]));

        let minus_a = to_scalar(&(FE::q() - a.to_big_int()));
        assert_eq!(
            sum_points(&[A, g * minus_a]).unwrap_err().kind(),
            ErrorKind::ArithmeticFailure
        );
        assert_eq!(
            linear_combination(&[(&A, &BigInt::from(2)), (&B, &FE::q())])?,
            A + A
        );

        let scheme = CommitmentScheme::from_points(&[&A, &B]);
        assert!(scheme.verify_points(&[&A, &B]));
        assert!(!scheme.verify_points(&[&B, &A]));
        assert!(!scheme.verify_points(&[&A]));
        Ok(())
    }
}
