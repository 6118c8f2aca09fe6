//! Primality testing, safe prime generation and the Jacobi symbol
//!
//! Candidates are sieved against small primes before Miller-Rabin rounds with random witnesses are applied.
use crate::error::Error;
use curv::arithmetic::traits::Samplable;
use curv::BigInt;
use serde::{Deserialize, Serialize};
use std::cmp::max;

/// Minimal number of random Miller-Rabin witnesses
pub const MIN_MILLER_RABIN_ROUNDS: usize = 10;

/// Product of primes from 3 to 19
const SMALL_PRIMES_PRODUCT: u64 = 4_849_845;
const SMALL_PRIMES: [u64; 8] = [2, 3, 5, 7, 11, 13, 17, 19];
/// Upper bound of the sieve used when searching for safe primes
const SIEVE_BOUND: usize = 2000;

/// A pair of safe primes $`p = 2p'+1`$, $`q = 2q'+1`$ along with their Sophie Germain counterparts
#[derive(Clone, Serialize, Deserialize)]
pub struct PairOfSafePrimes {
    pub p: BigInt,
    pub p_prim: BigInt,
    pub q: BigInt,
    pub q_prim: BigInt,
}

impl std::fmt::Debug for PairOfSafePrimes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PairOfSafePrimes {{ [***] }}")
    }
}

impl PairOfSafePrimes {
    /// Generates two distinct safe primes of given bit length
    pub fn generate(bit_length: usize) -> Result<Self, Error> {
        let (p, p_prim) = random_safe_prime(bit_length)?;
        loop {
            let (q, q_prim) = random_safe_prime(bit_length)?;
            if q != p {
                return Ok(PairOfSafePrimes {
                    p,
                    p_prim,
                    q,
                    q_prim,
                });
            }
        }
    }
}

/// Probabilistic primality test
///
/// Rejects multiples of primes up to 19 by a single gcd, then runs at least [`MIN_MILLER_RABIN_ROUNDS`]
/// Miller-Rabin rounds with random witnesses.
pub fn is_prime(n: &BigInt, rounds: usize) -> bool {
    let two = BigInt::from(2);
    if *n < two {
        return false;
    }
    if SMALL_PRIMES.iter().any(|&p| BigInt::from(p) == *n) {
        return true;
    }
    if n.gcd(&(BigInt::from(SMALL_PRIMES_PRODUCT) * &two)) != BigInt::one() {
        return false;
    }
    miller_rabin(n, max(rounds, MIN_MILLER_RABIN_ROUNDS))
}

/// Tests if $`n`$ is a safe prime, i.e. both $`n`$ and $`(n-1)/2`$ are prime
pub fn is_safe_prime(n: &BigInt, rounds: usize) -> bool {
    let one = BigInt::one();
    if *n < BigInt::from(5) {
        return false;
    }
    let p_prim = (n - &one).div_floor(&BigInt::from(2));
    is_prime(&p_prim, rounds) && is_prime(n, rounds)
}

/// Generates a safe prime $`p = 2p'+1`$ of exactly `bit_length` bits, returns $`(p, p')`$
pub fn random_safe_prime(bit_length: usize) -> Result<(BigInt, BigInt), Error> {
    if bit_length < 8 {
        return Err(Error::malformed(format!(
            "safe prime of {} bits requested",
            bit_length
        )));
    }
    let one = BigInt::one();
    let two = BigInt::from(2);
    let sieve = small_primes(SIEVE_BOUND)
        .into_iter()
        .skip(1)
        .map(|p| BigInt::from(p as u64))
        .collect::<Vec<_>>();

    loop {
        let mut p_prim = BigInt::sample(bit_length - 1);
        p_prim.setbit(bit_length - 2);
        p_prim.setbit(0);
        let p = &p_prim * &two + &one;

        let survives_sieve = sieve.iter().all(|prime| {
            (p_prim == *prime || !p_prim.mod_floor(prime).is_zero())
                && (p == *prime || !p.mod_floor(prime).is_zero())
        });
        if !survives_sieve {
            continue;
        }
        // a single round discards most candidates before the expensive checks
        if !miller_rabin(&p_prim, 1) || !miller_rabin(&p, 1) {
            continue;
        }
        if is_prime(&p_prim, MIN_MILLER_RABIN_ROUNDS) && is_prime(&p, MIN_MILLER_RABIN_ROUNDS) {
            return Ok((p, p_prim));
        }
    }
}

/// Jacobi symbol $`\left(\frac{a}{n}\right)`$
///
/// Defined for odd positive $`n`$ only. The value 0 means $`gcd(a,n) \ne 1`$.
pub fn jacobi(a: &BigInt, n: &BigInt) -> Result<i32, Error> {
    let zero = BigInt::zero();
    let two = BigInt::from(2);
    if *n <= zero || n.mod_floor(&two).is_zero() {
        return Err(Error::malformed("Jacobi symbol requires odd positive modulus"));
    }
    let three = BigInt::from(3);
    let four = BigInt::from(4);
    let five = BigInt::from(5);
    let eight = BigInt::from(8);

    let mut a = a.mod_floor(n);
    let mut n = n.clone();
    let mut result = 1;
    while !a.is_zero() {
        while a.mod_floor(&two).is_zero() {
            a = a.div_floor(&two);
            let r = n.mod_floor(&eight);
            if r == three || r == five {
                result = -result;
            }
        }
        std::mem::swap(&mut a, &mut n);
        if a.mod_floor(&four) == three && n.mod_floor(&four) == three {
            result = -result;
        }
        a = a.mod_floor(&n);
    }
    if n == BigInt::one() {
        Ok(result)
    } else {
        Ok(0)
    }
}

/// Primes below `bound`, sieve of Eratosthenes
pub(crate) fn small_primes(bound: usize) -> Vec<usize> {
    let mut composite = vec![false; bound];
    let mut primes = Vec::new();
    for i in 2..bound {
        if !composite[i] {
            primes.push(i);
            let mut j = i * i;
            while j < bound {
                composite[j] = true;
                j += i;
            }
        }
    }
    primes
}

/// Miller-Rabin test of an odd $`n > 3`$ with random witnesses in $`[2, n-2]`$
fn miller_rabin(n: &BigInt, rounds: usize) -> bool {
    let one = BigInt::one();
    let two = BigInt::from(2);
    let n_minus_one = n - &one;

    let mut d = n_minus_one.clone();
    let mut s = 0usize;
    while d.mod_floor(&two).is_zero() {
        d = d.div_floor(&two);
        s += 1;
    }

    let witness_bound = n - &BigInt::from(3);
    'witness: for _ in 0..rounds {
        let a = BigInt::sample_below(&witness_bound) + &two;
        let mut x = a.powm_sec(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x).mod_floor(n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primality_of_small_numbers() {
        let primes = small_primes(300);
        for n in 0..300usize {
            assert_eq!(
                is_prime(&BigInt::from(n as u64), MIN_MILLER_RABIN_ROUNDS),
                primes.contains(&n),
                "n = {}",
                n
            );
        }
    }

    #[test]
    fn carmichael_numbers_are_composite() {
        for n in &[561u64, 1105, 1729, 2465, 2821, 6601, 8911, 41041, 825_265] {
            assert!(!is_prime(&BigInt::from(*n), MIN_MILLER_RABIN_ROUNDS));
        }
        // 2^127 - 1
        let m127 = (BigInt::one() << 127) - BigInt::one();
        assert!(is_prime(&m127, MIN_MILLER_RABIN_ROUNDS));
        assert!(!is_prime(&(&m127 * &m127), MIN_MILLER_RABIN_ROUNDS));
    }

    #[test]
    fn safe_prime_generation() -> anyhow::Result<()> {
        let (p, p_prim) = random_safe_prime(128)?;
        assert_eq!(p.bit_length(), 128);
        assert_eq!(p, &p_prim * BigInt::from(2) + BigInt::one());
        assert!(is_safe_prime(&p, MIN_MILLER_RABIN_ROUNDS));
        assert!(!is_safe_prime(&BigInt::from(13), MIN_MILLER_RABIN_ROUNDS));
        assert!(is_safe_prime(&BigInt::from(23), MIN_MILLER_RABIN_ROUNDS));
        assert!(random_safe_prime(4).is_err());
        Ok(())
    }

    #[test]
    fn jacobi_symbol() -> anyhow::Result<()> {
        // values from the table of Jacobi symbols for n = 15
        let expected = [0, 1, 1, 0, 1, 0, 0, -1, 1, 0, 0, -1, 0, -1, -1];
        for (a, &j) in expected.iter().enumerate() {
            assert_eq!(jacobi(&BigInt::from(a as u64), &BigInt::from(15))?, j);
        }
        assert_eq!(jacobi(&BigInt::from(-1), &BigInt::from(7))?, -1);
        assert!(jacobi(&BigInt::from(3), &BigInt::from(8)).is_err());
        assert!(jacobi(&BigInt::from(3), &BigInt::from(-7)).is_err());
        Ok(())
    }
}
