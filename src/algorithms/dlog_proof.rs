//! Proof of knowledge of the discrete logarithm in a group of hidden order
//!
//! The prover knows the factorization of $`N = PQ`$, $`P = 2p'+1`$, $`Q = 2q'+1`$, and the order $`p'q'`$ of the
//! base $`g`$. It proves knowledge of $`x`$ such that $`v = g^x \bmod N`$ to a verifier which knows $`N, g, v`$ only.
//!
//! The proof runs [`ITERATIONS`] parallel instances of the protocol with binary challenges:
//! ```math
//! \rho_i = g^{r_i},\quad t_i = r_i - c_i x \bmod p'q', \qquad g^{t_i} v^{c_i} \overset{?}{=} \rho_i
//! ```
//! The challenge bits are taken from the hash of all public values, the identity of the prover and optional
//! associated data.
use crate::algorithms::sha::HSha256;
use crate::algorithms::{invmod, modmul, modsub};
use crate::error::Error;
use curv::arithmetic::traits::{Samplable, ZeroizeBN};
use curv::BigInt;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Number of parallel instances, each contributes one bit of soundness
pub const ITERATIONS: usize = 128;

/// Length of the challenge in bytes
pub const CHALLENGE_SIZE: usize = ITERATIONS / 8;

pub type Challenge = [u8; CHALLENGE_SIZE];

/// Commitment randomness $`r_i`$ of the prover
pub struct HiddenDlogSecrets {
    r: Vec<BigInt>,
}

impl Zeroize for HiddenDlogSecrets {
    fn zeroize(&mut self) {
        self.r.iter_mut().for_each(|r| r.zeroize_bn());
    }
}

impl Drop for HiddenDlogSecrets {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// First move of the prover: samples $`r_i \in [0, ord)`$ and computes $`\rho_i = g^{r_i} \bmod N`$
pub fn commit(N: &BigInt, g: &BigInt, order: &BigInt) -> (HiddenDlogSecrets, Vec<BigInt>) {
    let r = (0..ITERATIONS)
        .map(|_| BigInt::sample_below(order))
        .collect::<Vec<_>>();
    let rho = r.iter().map(|r_i| g.powm_sec(r_i, N)).collect();
    (HiddenDlogSecrets { r }, rho)
}

/// Fiat-Shamir challenge
pub fn challenge(
    N: &BigInt,
    g: &BigInt,
    v: &BigInt,
    rho: &[BigInt],
    id: &[u8],
    ad: Option<&[u8]>,
) -> Challenge {
    let mut public_values = vec![N, g, v];
    public_values.extend(rho.iter());
    let digest = HSha256::create_digest_with_context(&public_values, id, ad);
    let mut c = [0u8; CHALLENGE_SIZE];
    c.copy_from_slice(&digest[..CHALLENGE_SIZE]);
    c
}

fn challenge_bit(c: &Challenge, i: usize) -> bool {
    (c[i / 8] >> (7 - i % 8)) & 1 == 1
}

/// Responses $`t_i = r_i - c_i x \bmod ord`$
pub fn prove(
    secrets: &HiddenDlogSecrets,
    c: &Challenge,
    x: &BigInt,
    order: &BigInt,
) -> Vec<BigInt> {
    secrets
        .r
        .iter()
        .enumerate()
        .map(|(i, r_i)| {
            if challenge_bit(c, i) {
                modsub(r_i, x, order)
            } else {
                r_i.clone()
            }
        })
        .collect()
}

/// Checks $`g^{t_i} v^{c_i} = \rho_i \bmod N`$ for each instance
pub fn verify(
    N: &BigInt,
    g: &BigInt,
    v: &BigInt,
    rho: &[BigInt],
    c: &Challenge,
    t: &[BigInt],
) -> bool {
    if rho.len() != ITERATIONS || t.len() != ITERATIONS {
        return false;
    }
    let zero = BigInt::zero();
    rho.iter().zip(t.iter()).enumerate().all(|(i, (rho_i, t_i))| {
        if *t_i < zero || t_i >= N {
            return false;
        }
        let g_t = g.powm_sec(t_i, N);
        let lhs = if challenge_bit(c, i) {
            modmul(&g_t, v, N)
        } else {
            g_t
        };
        lhs == *rho_i
    })
}

/// Non-interactive proof of knowledge of $`x = \log_g v`$ modulo $`N`$
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenOrderDlogProof {
    rho: Vec<BigInt>,
    t: Vec<BigInt>,
}

#[allow(non_snake_case)]
impl HiddenOrderDlogProof {
    pub fn create(
        N: &BigInt,
        g: &BigInt,
        v: &BigInt,
        x: &BigInt,
        order: &BigInt,
        id: &[u8],
        ad: Option<&[u8]>,
    ) -> Self {
        let (secrets, rho) = commit(N, g, order);
        let c = challenge(N, g, v, &rho, id, ad);
        let t = prove(&secrets, &c, x, order);
        Self { rho, t }
    }

    pub fn verify(&self, N: &BigInt, g: &BigInt, v: &BigInt, id: &[u8], ad: Option<&[u8]>) -> bool {
        let c = challenge(N, g, v, &self.rho, id, ad);
        verify(N, g, v, &self.rho, &c, &self.t)
    }
}

/// Samples an exponent invertible modulo the order of the group
pub(crate) fn sample_invertible_exponent(order: &BigInt) -> Result<(BigInt, BigInt), Error> {
    const MAX_ITERATIONS_IN_REJECTION_SAMPLING: usize = 256;
    for _ in 0..MAX_ITERATIONS_IN_REJECTION_SAMPLING {
        let x = BigInt::sample_below(order);
        if let Ok(x_inv) = invmod(&x, order) {
            return Ok((x, x_inv));
        }
    }
    Err(Error::arithmetic("can't sample an invertible exponent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::primes::PairOfSafePrimes;
    use crate::algorithms::sample_generator_of_rsa_group;

    fn setup() -> anyhow::Result<(BigInt, BigInt, BigInt)> {
        let primes = PairOfSafePrimes::generate(256)?;
        let N = &primes.p * &primes.q;
        let order = &primes.p_prim * &primes.q_prim;
        let g = sample_generator_of_rsa_group(&primes.p, &primes.q)?;
        Ok((N, g, order))
    }

    #[test]
    fn valid_proof() -> anyhow::Result<()> {
        let (N, g, order) = setup()?;
        let (x, _) = sample_invertible_exponent(&order)?;
        let v = g.powm_sec(&x, &N);
        let proof = HiddenOrderDlogProof::create(&N, &g, &v, &x, &order, b"id", None);
        assert!(proof.verify(&N, &g, &v, b"id", None));
        assert!(!proof.verify(&N, &g, &v, b"another id", None));
        assert!(!proof.verify(&N, &v, &g, b"id", None));
        Ok(())
    }

    #[test]
    fn wrong_witness_is_rejected() -> anyhow::Result<()> {
        let (N, g, order) = setup()?;
        let (x, _) = sample_invertible_exponent(&order)?;
        let v = g.powm_sec(&x, &N);
        let wrong = &x + BigInt::one();
        let proof = HiddenOrderDlogProof::create(&N, &g, &v, &wrong, &order, b"id", None);
        assert!(!proof.verify(&N, &g, &v, b"id", None));
        Ok(())
    }

    #[test]
    fn tampered_response_is_rejected() -> anyhow::Result<()> {
        let (N, g, order) = setup()?;
        let (x, _) = sample_invertible_exponent(&order)?;
        let v = g.powm_sec(&x, &N);
        let (secrets, rho) = commit(&N, &g, &order);
        let c = challenge(&N, &g, &v, &rho, b"id", Some(&b"ad"[..]));
        let mut t = prove(&secrets, &c, &x, &order);
        assert!(verify(&N, &g, &v, &rho, &c, &t));

        t[5] = &t[5] + BigInt::one();
        assert!(!verify(&N, &g, &v, &rho, &c, &t));
        assert!(!verify(&N, &g, &v, &rho[1..], &c, &t[1..]));
        Ok(())
    }
}
