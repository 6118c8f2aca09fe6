//!  Non interactive zero knowledge proof for Paillier and square-free N, as described in *"Efficient Noninteractive Certification
//!  of RSA Moduli and Beyond"*, chapter 3.2, [`link`](https://eprint.iacr.org/2018/057.pdf) .
//!
//!  The Paillier cryptosystem requires a modulus $`N`$ to be relatively prime to $`\phi(N)`$, which is proven in ZK by taking $`N`$th roots of several random points.
//!  The points are derived from the hash of the modulus, the identity of the prover and optional associated data,
//!  hence a proof can't be replayed by another party or in another session.

use crate::algorithms::primes::small_primes;
use crate::algorithms::sha::HSha256;
use crate::error::Error;
use curv::cryptographic_primitives::hashing::traits::Hash;
use paillier::{extract_nroot, BigInt, DecryptionKey};
use serde::{Deserialize, Serialize};
use std::ops::Shl;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SquareFreeError {
    #[error("square-free proof: wrong size")]
    WrongSizeOfProof,
    #[error("square-free proof: incorrect root")]
    IncorrectRoot,
    #[error("square-free proof: modulus has a small factor")]
    SmallFactor,
    #[error("square-free proof: N can be too small: {0} ")]
    WrongSizeOfN(usize),
}

impl From<SquareFreeError> for Error {
    fn from(e: SquareFreeError) -> Self {
        match e {
            SquareFreeError::WrongSizeOfProof | SquareFreeError::WrongSizeOfN(_) => {
                Error::MalformedInput(e.to_string())
            }
            SquareFreeError::IncorrectRoot | SquareFreeError::SmallFactor => {
                Error::ProofInvalid(e.to_string())
            }
        }
    }
}

/// Number of roots in the proof
pub const M: usize = 10;

/// Corresponds to $`\alpha = 6370 `$ (as in the whitepaper)
const ALPHA: usize = 6370;

/// The output size of the hash function used in the algorithm
const DIGEST_SIZE: usize = 256;

const MAX_ITERATIONS_IN_REJECTION_SAMPLING: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SquareFreeProof {
    sigmas: Vec<BigInt>,
}

impl SquareFreeProof {
    /// Generates non-interactive proof of correctness of the modulus $`N = pq`$
    pub fn prove(dk: &DecryptionKey, id: &[u8], ad: Option<&[u8]>) -> Result<Self, Error> {
        let n = &dk.p * &dk.q;
        let sigmas = rho_vec(&n, id, ad)?
            .iter()
            .map(|rho| extract_nroot(dk, rho))
            .collect();
        Ok(SquareFreeProof { sigmas })
    }

    /// Verifies the proof and checks whether the modulus has expected bit size
    pub fn verify(
        &self,
        n: &BigInt,
        id: &[u8],
        ad: Option<&[u8]>,
        min_bit_length: usize,
    ) -> Result<(), SquareFreeError> {
        if self.sigmas.len() != M {
            return Err(SquareFreeError::WrongSizeOfProof);
        }

        let bit_length_of_n = n.bit_length();
        if bit_length_of_n < min_bit_length {
            return Err(SquareFreeError::WrongSizeOfN(bit_length_of_n));
        }
        check_divisibility(n)?;

        let rhos = rho_vec(n, id, ad).map_err(|_| SquareFreeError::IncorrectRoot)?;
        let zero = BigInt::zero();
        let roots_correct = self
            .sigmas
            .iter()
            .zip(rhos.iter())
            .all(|(sigma, rho)| *sigma > zero && sigma < n && *rho == sigma.powm_sec(n, n));
        if roots_correct {
            Ok(())
        } else {
            Err(SquareFreeError::IncorrectRoot)
        }
    }
}

/// Rejects moduli divisible by any prime below $`\alpha`$
pub fn check_divisibility(n: &BigInt) -> Result<(), SquareFreeError> {
    let primorial = small_primes(ALPHA)
        .into_iter()
        .fold(BigInt::one(), |acc, p| acc * BigInt::from(p as u64));
    if primorial.gcd(n) == BigInt::one() {
        Ok(())
    } else {
        Err(SquareFreeError::SmallFactor)
    }
}

/// generates the vector of $` \rho_{i} `$ of size M
///
/// implements rejection sampling algorithm for $`\rho`$ as described in the [whitepaper](https://eprint.iacr.org/2018/057.pdf) , section C.4
fn rho_vec(n: &BigInt, id: &[u8], ad: Option<&[u8]>) -> Result<Vec<BigInt>, Error> {
    let one = BigInt::one();
    let key_length = n.bit_length();
    if key_length < 2 {
        return Err(Error::malformed("modulus is too small"));
    }

    (0..M as u64)
        .map(|i| {
            (1u64..MAX_ITERATIONS_IN_REJECTION_SAMPLING)
                .map(|j| {
                    let seed = HSha256::create_digest_with_context(
                        &[n, &BigInt::from(i), &BigInt::from(j)],
                        id,
                        ad,
                    );
                    gen_mask(key_length, &BigInt::from(&seed[..]))
                })
                .find(|rho| !rho.is_zero() && rho < n && rho.gcd(n) == one)
                .ok_or_else(|| Error::arithmetic("can't sample rho"))
        })
        .collect()
}

/// Mask generation function, as described in [rfc8017](https://tools.ietf.org/html/rfc8017/#appendix-B.2.1), section B.2.1,
/// truncated to `mask_length` bits
fn gen_mask(mask_length: usize, seed: &BigInt) -> BigInt {
    let counter = ((mask_length - 1) / DIGEST_SIZE) as u64;

    let mask = (0..=counter)
        .map(|i| HSha256::create_hash(&[seed, &BigInt::from(i)]))
        .fold(BigInt::zero(), |acc, v| acc.shl(DIGEST_SIZE) + v);
    mask.mod_floor(&BigInt::one().shl(mask_length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paillier::KeyGeneration;
    use paillier::Paillier;

    const TEST_MODULUS_BITS: usize = 1024;

    #[test]
    fn correct_proof() -> anyhow::Result<()> {
        let (encryption, decryption) =
            Paillier::keypair_with_modulus_size(TEST_MODULUS_BITS).keys();
        let proof = SquareFreeProof::prove(&decryption, b"party-1", None)?;
        proof.verify(&encryption.n, b"party-1", None, TEST_MODULUS_BITS - 1)?;
        Ok(())
    }

    #[test]
    fn proof_is_bound_to_identity_and_size() -> anyhow::Result<()> {
        let (encryption, decryption) =
            Paillier::keypair_with_modulus_size(TEST_MODULUS_BITS).keys();
        let ad = b"session";
        let proof = SquareFreeProof::prove(&decryption, b"party-1", Some(&ad[..]))?;
        proof.verify(&encryption.n, b"party-1", Some(&ad[..]), TEST_MODULUS_BITS - 1)?;

        assert!(proof
            .verify(&encryption.n, b"party-2", Some(&ad[..]), TEST_MODULUS_BITS - 1)
            .is_err());
        assert!(proof
            .verify(&encryption.n, b"party-1", None, TEST_MODULUS_BITS - 1)
            .is_err());
        assert!(matches!(
            proof.verify(&encryption.n, b"party-1", Some(&ad[..]), 2 * TEST_MODULUS_BITS),
            Err(SquareFreeError::WrongSizeOfN(_))
        ));
        Ok(())
    }

    #[test]
    fn modulus_with_small_factor_is_rejected() {
        let n = BigInt::from(6361u64) * BigInt::from(6367u64);
        assert!(matches!(
            check_divisibility(&n),
            Err(SquareFreeError::SmallFactor)
        ));
    }
}
