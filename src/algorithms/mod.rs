//! Modular arithmetic kernel and the cryptographic building blocks of the threshold scheme
//!
//! The functions of this module operate on non-negative residues: every result is reduced into $`[0,p)`$
//! regardless of the sign of the intermediate value. Non-invertible elements are reported
//! as [`Error::ArithmeticFailure`](crate::Error::ArithmeticFailure) so that a caller is unable to use a zero
//! in place of an inverse.
#![allow(non_snake_case)]
pub mod bit_commitment;
pub mod dlog_proof;
pub mod mta;
pub mod paillier;
pub mod primes;
pub mod schnorr;
pub mod sha;
pub mod shamir;
pub mod square_free;

use crate::algorithms::primes::jacobi;
use crate::error::Error;
use curv::arithmetic::traits::Samplable;
use curv::elliptic::curves::traits::ECScalar;
use curv::{BigInt, FE};

/// Greatest common divisor
pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    a.gcd(b)
}

pub fn modadd(a: &BigInt, b: &BigInt, p: &BigInt) -> BigInt {
    (a + b).mod_floor(p)
}

pub fn modsub(a: &BigInt, b: &BigInt, p: &BigInt) -> BigInt {
    (a - b).mod_floor(p)
}

pub fn modmul(a: &BigInt, b: &BigInt, p: &BigInt) -> BigInt {
    (a * b).mod_floor(p)
}

/// Computes $`a \cdot b^{-1} \mod p`$
pub fn moddiv(a: &BigInt, b: &BigInt, p: &BigInt) -> Result<BigInt, Error> {
    Ok(modmul(a, &invmod(b, p)?, p))
}

/// Modular inverse via the extended Euclidean algorithm
///
/// Fails if $`gcd(a,m) \ne 1`$ or the modulus is not greater than 1.
pub fn invmod(a: &BigInt, m: &BigInt) -> Result<BigInt, Error> {
    if *m <= BigInt::one() {
        return Err(Error::malformed("modulus of the inverse must be greater than 1"));
    }
    a.mod_floor(m)
        .invert(m)
        .ok_or_else(|| Error::arithmetic("element is not invertible"))
}

/// Combines residues $`r_p \bmod p`$ and $`r_q \bmod q`$ into the unique residue modulo $`pq`$
///
/// ```math
/// x = r_p + p \cdot ((r_q - r_p) \cdot p^{-1} \bmod q)
/// ```
pub fn crt(rp: &BigInt, rq: &BigInt, p: &BigInt, q: &BigInt) -> Result<BigInt, Error> {
    let p_inv = invmod(p, q)?;
    let h = modmul(&modsub(rq, rp, q), &p_inv, q);
    Ok((rp.mod_floor(p) + p * h).mod_floor(&(p * q)))
}

/// Solves the system of simultaneous congruences (CRT) with Gauss' algorithm
///
/// See "Handbook of applied cryptography", algorithm 2.121
pub fn crt_solver(reminders: &[&BigInt], moduli: &[&BigInt]) -> Result<BigInt, Error> {
    if reminders.len() != moduli.len() || moduli.is_empty() {
        return Err(Error::malformed("reminders and moduli differ in count"));
    }
    let n = moduli.iter().fold(BigInt::one(), |x, &ni| x * ni);
    let mut result = BigInt::zero();
    for (&ai, &ni) in reminders.iter().zip(moduli) {
        let Ni: BigInt = &n / ni;
        let Mi = invmod(&Ni, ni)?;
        result = modadd(&result, &(ai * Ni * Mi), &n);
    }
    Ok(result)
}

/// Samples a generator of the subgroup of quadratic residues of $`Z^{*}_P`$ for a safe prime $`P = 2p + 1`$
///
/// The subgroup has prime order $`p`$, hence every residue other than 1 generates it.
/// Elements of order 2 are non-residues and never pass the Jacobi filter.
pub fn sample_generator_of_cyclic_subgroup(safe_prime: &BigInt) -> Result<BigInt, Error> {
    const MAX_ITERATIONS_IN_REJECTION_SAMPLING: usize = 256;
    let One = BigInt::one();
    for _ in 0..MAX_ITERATIONS_IN_REJECTION_SAMPLING {
        let h = BigInt::sample_below(safe_prime);
        if h <= One {
            continue;
        }
        if jacobi(&h, safe_prime)? == 1 {
            return Ok(h);
        }
    }
    Err(Error::arithmetic(format!(
        "rejection sampling exceeded {} iterations while looking for a generator",
        MAX_ITERATIONS_IN_REJECTION_SAMPLING
    )))
}

/// Samples a generator of the subgroup of order $`pq`$ in $`Z^{*}_{N}`$, $`N = PQ`$,
/// where $`P = 2p+1`$ and $`Q = 2q+1`$ are safe primes
///
/// Generators of the prime order subgroups modulo $`P`$ and $`Q`$ are combined with CRT.
pub fn sample_generator_of_rsa_group(safe_p: &BigInt, safe_q: &BigInt) -> Result<BigInt, Error> {
    let g_p = sample_generator_of_cyclic_subgroup(safe_p)?;
    let g_q = sample_generator_of_cyclic_subgroup(safe_q)?;
    crt(&g_p, &g_q, safe_p, safe_q)
}

/// Sampling of invertible residues
pub trait SampleFromMultiplicativeGroup {
    fn from_modulo(N: &BigInt) -> BigInt;
}

impl SampleFromMultiplicativeGroup for BigInt {
    fn from_modulo(N: &BigInt) -> BigInt {
        let One = BigInt::one();
        loop {
            let r = Self::sample_below(N);
            if r.gcd(N) == One {
                return r;
            }
        }
    }
}

/// Reduces an integer modulo the curve order
///
/// Unlike `ECScalar::from`, accepts values which are congruent to zero.
pub fn to_scalar(value: &BigInt) -> FE {
    let reduced = value.mod_floor(&FE::q());
    if reduced.is_zero() {
        FE::zero()
    } else {
        ECScalar::from(&reduced)
    }
}

/// Sum of scalars computed over integers, safe when the sum is zero
pub fn sum_scalars<'a>(values: impl IntoIterator<Item = &'a FE>) -> FE {
    let q = FE::q();
    let sum = values
        .into_iter()
        .fold(BigInt::zero(), |acc, x| modadd(&acc, &x.to_big_int(), &q));
    to_scalar(&sum)
}

pub(crate) fn is_zero_scalar(x: &FE) -> bool {
    x.to_big_int().is_zero()
}

/// Checks $`0 < x < N`$ and $`gcd(x, N) = 1`$
pub(crate) fn is_in_multiplicative_group(x: &BigInt, N: &BigInt) -> bool {
    *x > BigInt::zero() && x < N && x.gcd(N) == BigInt::one()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::primes::PairOfSafePrimes;
    use crate::error::ErrorKind;

    #[test]
    fn negative_results_are_reduced() {
        let p = BigInt::from(17);
        assert_eq!(modsub(&BigInt::from(3), &BigInt::from(5), &p), BigInt::from(15));
        assert_eq!(modadd(&BigInt::from(-20), &BigInt::from(1), &p), BigInt::from(15));
        assert_eq!(modmul(&BigInt::from(-2), &BigInt::from(3), &p), BigInt::from(11));
        assert_eq!(
            moddiv(&BigInt::from(1), &BigInt::from(3), &p).unwrap(),
            BigInt::from(6)
        );
    }

    #[test]
    fn inverse_of_non_coprime_element_fails() {
        let err = invmod(&BigInt::from(6), &BigInt::from(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArithmeticFailure);
        assert!(invmod(&BigInt::from(3), &BigInt::one()).is_err());
        assert_eq!(
            invmod(&BigInt::from(-1), &BigInt::from(7)).unwrap(),
            BigInt::from(6)
        );
    }

    #[test]
    fn crt_combines_residues() -> anyhow::Result<()> {
        let (p, q) = (BigInt::from(11), BigInt::from(13));
        for x in 0..143 {
            let x = BigInt::from(x);
            let combined = crt(&x.mod_floor(&p), &x.mod_floor(&q), &p, &q)?;
            assert_eq!(combined, x);
        }
        let general = crt_solver(
            &[&BigInt::from(2), &BigInt::from(3), &BigInt::from(2)],
            &[&BigInt::from(3), &BigInt::from(5), &BigInt::from(7)],
        )?;
        assert_eq!(general, BigInt::from(23));
        Ok(())
    }

    #[test]
    fn generator_of_rsa_group_has_expected_order() -> anyhow::Result<()> {
        let PairOfSafePrimes { p, p_prim, q, q_prim } = PairOfSafePrimes::generate(128)?;
        let N = &p * &q;
        let g = sample_generator_of_rsa_group(&p, &q)?;
        let one = BigInt::one();
        assert_eq!(g.powm_sec(&(&p_prim * &q_prim), &N), one);
        assert_ne!(g.powm_sec(&p_prim, &N), one);
        assert_ne!(g.powm_sec(&q_prim, &N), one);
        Ok(())
    }

    #[test]
    fn zero_scalar_conversion() {
        assert!(is_zero_scalar(&to_scalar(&FE::q())));
        let x: FE = ECScalar::new_random();
        let minus_x = to_scalar(&(FE::q() - x.to_big_int()));
        assert!(is_zero_scalar(&sum_scalars(&[x, minus_x])));
    }
}
