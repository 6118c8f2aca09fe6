//! Implements Hash trait for SHA-256 and the Fiat-Shamir helpers built on top of it
//!
//! Every integer is absorbed with its big-endian length prefix, so distinct sequences of inputs never
//! collide by concatenation.
use curv::arithmetic::traits::Converter;
use curv::cryptographic_primitives::hashing::traits::Hash;
use curv::elliptic::curves::traits::ECPoint;
use curv::{BigInt, FE, GE};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

pub struct HSha256;

/// Hash value along with the nonce which makes it fall into the required range
pub type HashWithNonce = (BigInt, BigInt);

impl HSha256 {
    const MAX_ITERATIONS_IN_REJECTION_SAMPLING: usize = 256;
    pub const DIGEST_BIT_LENGTH: usize = 256;
    const NONCE_SIZE_BYTES: usize = 8;

    pub fn can_handle_curve_modulo(q: &BigInt) -> bool {
        Self::DIGEST_BIT_LENGTH == q.bit_length()
    }

    fn absorb_bytes(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.input((bytes.len() as u32).to_be_bytes());
        hasher.input(bytes);
    }

    fn absorb(hasher: &mut Sha256, big_ints: &[&BigInt]) {
        for value in big_ints {
            Self::absorb_bytes(hasher, &BigInt::to_vec(value));
        }
    }

    pub fn create_hash_with_random_nonce(big_ints: &[&BigInt]) -> HashWithNonce {
        let mut nonce = [0u8; Self::NONCE_SIZE_BYTES];
        thread_rng().fill(&mut nonce[..]);
        Self::create_hash_with_nonce(big_ints, &BigInt::from(&nonce[..]))
    }

    pub fn create_hash_with_nonce(big_ints: &[&BigInt], nonce: &BigInt) -> HashWithNonce {
        let mut hasher = Sha256::new();
        let mut input = [0u8; Self::NONCE_SIZE_BYTES];
        let nonce_bytes = BigInt::to_vec(nonce);
        // an oversized nonce is absorbed truncated and fails the comparison in the verifier
        let len = nonce_bytes.len().min(Self::NONCE_SIZE_BYTES);
        input[Self::NONCE_SIZE_BYTES - len..].copy_from_slice(&nonce_bytes[..len]);

        hasher.input(input);
        Self::absorb(&mut hasher, big_ints);
        (BigInt::from(&hasher.result()[..]), nonce.clone())
    }

    /// Rejection sampling of the hash until it falls below `q`, the nonce has to accompany the hash
    pub fn create_hash_bounded_by_q(big_ints: &[&BigInt], q: &BigInt) -> HashWithNonce {
        for _ in 0..Self::MAX_ITERATIONS_IN_REJECTION_SAMPLING {
            let (hash, nonce) = Self::create_hash_with_random_nonce(big_ints);
            if hash < *q {
                return (hash, nonce);
            }
        }
        // If the condition in can_handle_curve_modulo() is true,
        // the probability of hitting next statement is no more than approx. 1/2^(MAX_ITERATIONS)
        unreachable!(
            "rejection sampling exceeded {} iterations in create_hash_bounded_by_q()",
            Self::MAX_ITERATIONS_IN_REJECTION_SAMPLING
        )
    }

    /// Recomputes the hash with the nonce supplied by a prover and compares it with the claimed value
    pub fn verify_hash_with_nonce(big_ints: &[&BigInt], claimed: &HashWithNonce) -> bool {
        let (hash, nonce) = claimed;
        let (expected, _) = Self::create_hash_with_nonce(big_ints, nonce);
        expected == *hash
    }

    /// Digest binding the identity of the prover and optional associated data
    pub fn create_digest_with_context(
        big_ints: &[&BigInt],
        id: &[u8],
        ad: Option<&[u8]>,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        Self::absorb(&mut hasher, big_ints);
        Self::absorb_bytes(&mut hasher, id);
        if let Some(ad) = ad {
            Self::absorb_bytes(&mut hasher, ad);
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.result()[..]);
        digest
    }

    /// Fiat-Shamir challenge modulo the order of the curve
    pub fn challenge_from_points(points: &[&GE]) -> FE {
        Self::create_hash_from_ge(points)
    }

    /// Digest of a message as a single block of bytes
    pub fn digest(bytes: &[u8]) -> [u8; 32] {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes)[..]);
        digest
    }
}

impl Hash for HSha256 {
    fn create_hash(big_ints: &[&BigInt]) -> BigInt {
        let mut hasher = Sha256::new();
        Self::absorb(&mut hasher, big_ints);
        BigInt::from(&hasher.result()[..])
    }

    fn create_hash_from_slice(byte_slice: &[u8]) -> BigInt {
        BigInt::from(&Self::digest(byte_slice)[..])
    }

    fn create_hash_from_ge(ge_vec: &[&GE]) -> FE {
        let mut hasher = Sha256::new();
        for value in ge_vec {
            Self::absorb_bytes(&mut hasher, &value.pk_to_key_slice());
        }
        let result = BigInt::from(&hasher.result()[..]);
        crate::algorithms::to_scalar(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::{HSha256, FE};
    use curv::arithmetic::traits::Samplable;
    use curv::cryptographic_primitives::hashing::traits::Hash;
    use curv::elliptic::curves::traits::ECScalar;
    use curv::BigInt;

    #[test]
    fn hash_with_random_nonce() {
        (1..1000).for_each(|_| {
            let alpha = BigInt::sample_below(&FE::q().pow(3));
            let beta = BigInt::sample_below(&FE::q().pow(3));
            let gamma = BigInt::sample_below(&alpha);
            let input_slice = [&alpha, &beta, &gamma, &alpha, &beta, &gamma];
            let (hash, nonce) = HSha256::create_hash_with_random_nonce(&input_slice);
            let (hash_prim, nonce_prim) = HSha256::create_hash_with_nonce(&input_slice, &nonce);
            assert_eq!(hash, hash_prim);
            assert_eq!(nonce, nonce_prim);
        });
    }

    #[test]
    fn bounded_hash_is_verifiable() {
        let q = FE::q();
        let x = BigInt::sample_below(&q);
        let claimed = HSha256::create_hash_bounded_by_q(&[&x, &q], &q);
        assert!(claimed.0 < q);
        assert!(HSha256::verify_hash_with_nonce(&[&x, &q], &claimed));
        assert!(!HSha256::verify_hash_with_nonce(&[&q, &x], &claimed));
    }

    #[test]
    fn length_prefix_separates_inputs() {
        // 0x0102 || 0x03 and 0x01 || 0x0203 hash differently
        let a = HSha256::create_hash(&[&BigInt::from(0x0102), &BigInt::from(0x03)]);
        let b = HSha256::create_hash(&[&BigInt::from(0x01), &BigInt::from(0x0203)]);
        assert_ne!(a, b);
    }

    #[test]
    fn context_is_bound() {
        let x = BigInt::from(12345);
        let plain = HSha256::create_digest_with_context(&[&x], b"alice", None);
        assert_ne!(plain, HSha256::create_digest_with_context(&[&x], b"bob", None));
        assert_ne!(
            plain,
            HSha256::create_digest_with_context(&[&x], b"alice", Some(&b"session-1"[..]))
        );
        assert_eq!(plain, HSha256::create_digest_with_context(&[&x], b"alice", None));
    }

    #[test]
    fn sha256_test_vector() {
        assert_eq!(
            hex::encode(HSha256::digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
