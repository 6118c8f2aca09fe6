//! Bit commitment setup: the hidden order group used by MtA range proofs
//!
//! The setup consists of private values: safe primes $`P = 2p'+1`$, $`Q = 2q'+1`$, exponents $`\alpha, \beta`$ invertible modulo $`p'q'`$,
//! and public values $`N = PQ`$, $`b_0`$ generating the subgroup of order $`p'q'`$ of $`Z^{*}_N`$,
//! $`b_1 = b_0^{\alpha}`$ and optionally $`b_2 = b_0^{\beta}`$.
//!
//! The owner of the setup proves in zero knowledge that it knows $`\alpha`$ and $`\alpha^{-1}`$ so that
//! $`b_1 = b_0^{\alpha}`$ and $`b_0 = b_1^{\alpha^{-1}}`$, i.e. both generators span the same subgroup.
//! A setup without such a proof must not be used in range proofs, since a prover who knows the relation between
//! the generators can forge range proofs.
use crate::algorithms::dlog_proof::{sample_invertible_exponent, HiddenOrderDlogProof};
use crate::algorithms::primes::PairOfSafePrimes;
use crate::algorithms::{is_in_multiplicative_group, sample_generator_of_rsa_group};
use crate::error::Error;
use curv::arithmetic::traits::ZeroizeBN;
use curv::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Formatter};
use zeroize::Zeroize;

/// Private part of the exponent pair
#[derive(Clone, Serialize, Deserialize)]
struct Exponent {
    value: BigInt,
    inverse: BigInt,
}

impl Zeroize for Exponent {
    fn zeroize(&mut self) {
        self.value.zeroize_bn();
        self.inverse.zeroize_bn();
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BitCommitmentSetup {
    P: BigInt,
    Q: BigInt,
    p_prim: BigInt,
    q_prim: BigInt,
    alpha: Exponent,
    beta: Option<Exponent>,
    pub N: BigInt,
    pub b0: BigInt,
    pub b1: BigInt,
    pub b2: Option<BigInt>,
}

/// Public part of the setup, has to be shared with other parties along with [`BitCommitmentProof`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitCommitmentPublic {
    pub N: BigInt,
    pub b0: BigInt,
    pub b1: BigInt,
    pub b2: Option<BigInt>,
}

/// Proof of well-formedness of the setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitCommitmentProof {
    b1_proof: HiddenOrderDlogProof,
    b0_proof: HiddenOrderDlogProof,
    b2_proofs: Option<(HiddenOrderDlogProof, HiddenOrderDlogProof)>,
}

impl Zeroize for BitCommitmentSetup {
    fn zeroize(&mut self) {
        self.P.zeroize_bn();
        self.Q.zeroize_bn();
        self.p_prim.zeroize_bn();
        self.q_prim.zeroize_bn();
        self.alpha.zeroize();
        if let Some(beta) = self.beta.as_mut() {
            beta.zeroize();
        }
    }
}

impl Drop for BitCommitmentSetup {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Debug for BitCommitmentSetup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitCommitmentSetup")
            .field("private", &"[***]".to_owned())
            .field("N", &self.N)
            .field("b0", &self.b0)
            .field("b1", &self.b1)
            .field("b2", &self.b2)
            .finish()
    }
}

impl BitCommitmentSetup {
    /// Generates a new setup with safe primes of given bit length
    ///
    /// The 2-generator variant additionally produces $`b_2 = b_0^{\beta}`$.
    pub fn generate(prime_bit_length: usize, with_b2: bool) -> Result<Self, Error> {
        let primes = PairOfSafePrimes::generate(prime_bit_length)?;
        Self::from_safe_primes(primes, with_b2)
    }

    pub fn from_safe_primes(primes: PairOfSafePrimes, with_b2: bool) -> Result<Self, Error> {
        let PairOfSafePrimes {
            p: P,
            p_prim,
            q: Q,
            q_prim,
        } = primes;
        let N = &P * &Q;
        let order = &p_prim * &q_prim;
        let b0 = sample_generator_of_rsa_group(&P, &Q)?;

        let alpha = Self::sample_exponent(&order)?;
        let b1 = b0.powm_sec(&alpha.value, &N);

        let (beta, b2) = if with_b2 {
            let beta = Self::sample_exponent(&order)?;
            let b2 = b0.powm_sec(&beta.value, &N);
            (Some(beta), Some(b2))
        } else {
            (None, None)
        };

        Ok(Self {
            P,
            Q,
            p_prim,
            q_prim,
            alpha,
            beta,
            N,
            b0,
            b1,
            b2,
        })
    }

    fn sample_exponent(order: &BigInt) -> Result<Exponent, Error> {
        let (value, inverse) = sample_invertible_exponent(order)?;
        Ok(Exponent { value, inverse })
    }

    /// order $`p'q'`$ of the subgroup generated by $`b_0`$
    fn order(&self) -> BigInt {
        &self.p_prim * &self.q_prim
    }

    pub fn public(&self) -> BitCommitmentPublic {
        BitCommitmentPublic {
            N: self.N.clone(),
            b0: self.b0.clone(),
            b1: self.b1.clone(),
            b2: self.b2.clone(),
        }
    }

    /// Proves knowledge of $`\alpha, \alpha^{-1}`$ (and $`\beta, \beta^{-1}`$) binding the identity of the prover
    /// and optional associated data
    pub fn prove(&self, id: &[u8], ad: Option<&[u8]>) -> BitCommitmentProof {
        let order = self.order();
        let prove_pair = |base: &BigInt, target: &BigInt, exponent: &Exponent| {
            (
                HiddenOrderDlogProof::create(&self.N, base, target, &exponent.value, &order, id, ad),
                HiddenOrderDlogProof::create(
                    &self.N,
                    target,
                    base,
                    &exponent.inverse,
                    &order,
                    id,
                    ad,
                ),
            )
        };

        let (b1_proof, b0_proof) = prove_pair(&self.b0, &self.b1, &self.alpha);
        let b2_proofs = match (&self.b2, &self.beta) {
            (Some(b2), Some(beta)) => Some(prove_pair(&self.b0, b2, beta)),
            _ => None,
        };
        BitCommitmentProof {
            b1_proof,
            b0_proof,
            b2_proofs,
        }
    }
}

impl BitCommitmentPublic {
    /// Verifies the well-formedness proof and the size of the modulus
    pub fn verify(
        &self,
        proof: &BitCommitmentProof,
        id: &[u8],
        ad: Option<&[u8]>,
        min_bit_length: usize,
    ) -> Result<(), Error> {
        if self.N.bit_length() < min_bit_length {
            return Err(Error::malformed(format!(
                "bit commitment modulus has {} bits, expected at least {}",
                self.N.bit_length(),
                min_bit_length
            )));
        }
        let one = BigInt::one();
        let generators = std::iter::once(&self.b0)
            .chain(std::iter::once(&self.b1))
            .chain(self.b2.iter());
        for b in generators {
            if !is_in_multiplicative_group(b, &self.N) || *b == one {
                return Err(Error::malformed("bit commitment generator out of range"));
            }
        }

        let N = &self.N;
        let verify_pair = |target: &BigInt, proofs: (&HiddenOrderDlogProof, &HiddenOrderDlogProof)| {
            proofs.0.verify(N, &self.b0, target, id, ad) && proofs.1.verify(N, target, &self.b0, id, ad)
        };

        if !verify_pair(&self.b1, (&proof.b1_proof, &proof.b0_proof)) {
            return Err(Error::proof("bit commitment setup: b0, b1"));
        }
        match (&self.b2, &proof.b2_proofs) {
            (None, None) => Ok(()),
            (Some(b2), Some((b2_proof, b0_proof))) => {
                if verify_pair(b2, (b2_proof, b0_proof)) {
                    Ok(())
                } else {
                    Err(Error::proof("bit commitment setup: b0, b2"))
                }
            }
            _ => Err(Error::malformed(
                "bit commitment proof does not match the number of generators",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const TEST_PRIME_BITS: usize = 256;
    const TEST_MIN_MODULUS_BITS: usize = 2 * TEST_PRIME_BITS - 1;

    #[test]
    fn honest_setup_is_accepted() -> anyhow::Result<()> {
        let setup = BitCommitmentSetup::generate(TEST_PRIME_BITS, false)?;
        let proof = setup.prove(b"party-1", None);
        setup
            .public()
            .verify(&proof, b"party-1", None, TEST_MIN_MODULUS_BITS)?;

        assert_eq!(setup.b1.powm_sec(&setup.alpha.inverse, &setup.N), setup.b0);
        Ok(())
    }

    #[test]
    fn two_generator_setup() -> anyhow::Result<()> {
        let setup = BitCommitmentSetup::generate(TEST_PRIME_BITS, true)?;
        let ad = b"session 7";
        let proof = setup.prove(b"party-1", Some(&ad[..]));
        let public = setup.public();
        public.verify(&proof, b"party-1", Some(&ad[..]), TEST_MIN_MODULUS_BITS)?;

        let without_b2 = BitCommitmentPublic {
            b2: None,
            ..public.clone()
        };
        assert_eq!(
            without_b2
                .verify(&proof, b"party-1", Some(&ad[..]), TEST_MIN_MODULUS_BITS)
                .unwrap_err()
                .kind(),
            ErrorKind::MalformedInput
        );
        assert!(public
            .verify(&proof, b"party-1", None, TEST_MIN_MODULUS_BITS)
            .is_err());
        Ok(())
    }

    #[test]
    fn swapped_proof_components_are_rejected() -> anyhow::Result<()> {
        let setup = BitCommitmentSetup::generate(TEST_PRIME_BITS, false)?;
        let proof = setup.prove(b"party-1", None);
        let swapped = BitCommitmentProof {
            b1_proof: proof.b0_proof.clone(),
            b0_proof: proof.b1_proof.clone(),
            b2_proofs: None,
        };
        let err = setup
            .public()
            .verify(&swapped, b"party-1", None, TEST_MIN_MODULUS_BITS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofInvalid);

        assert!(setup
            .public()
            .verify(&proof, b"party-2", None, TEST_MIN_MODULUS_BITS)
            .is_err());
        Ok(())
    }

    #[test]
    fn small_modulus_is_rejected() -> anyhow::Result<()> {
        let setup = BitCommitmentSetup::generate(TEST_PRIME_BITS, false)?;
        let proof = setup.prove(b"party-1", None);
        let err = setup
            .public()
            .verify(&proof, b"party-1", None, 2 * TEST_MIN_MODULUS_BITS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        Ok(())
    }
}
