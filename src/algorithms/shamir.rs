//! Shamir secret sharing with Feldman checks
//!
//! A secret $`s`$ is shared with a random polynomial $`f`$ of degree $`t-1`$, $`f(0) = s`$.
//! Party $`j`$ receives $`(x_j, f(x_j))`$ where $`x_j = j`$, $`j = 1 \ldots n`$.
//! The dealer publishes checks $`C_k = a_k \cdot G`$ for each coefficient $`a_k`$ of the polynomial,
//! so that each party can verify its share without learning anything about the secret:
//! ```math
//! f(x_j) \cdot G \overset{?}{=} \sum_{k} x_j^k \cdot C_k
//! ```
//! Any $`t`$ shares reconstruct the secret by interpolation at zero.
use crate::algorithms::{invmod, is_zero_scalar, modmul, modsub, sum_scalars, to_scalar};
use crate::error::Error;
use curv::cryptographic_primitives::secret_sharing::feldman_vss::VerifiableSS;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE, PK};
use std::collections::BTreeSet;
use trace::trace;

/// Shamir's secret share
///
/// Contains x and y-coordinate of the point
pub type SecretShare = (usize, FE);

/// Splits `secret` into `n` shares so that any `t` of them reconstruct it
///
/// A random secret is sampled if none is given. Returns the secret, shares for $`x = 1 \ldots n`$ and
/// the checks $`C_0 \ldots C_{t-1}`$.
pub fn make_shares(
    t: usize,
    n: usize,
    secret: Option<FE>,
) -> Result<(FE, Vec<SecretShare>, Vec<GE>), Error> {
    if t < 1 || t > n {
        return Err(Error::malformed(format!(
            "threshold {} is outside of range [1, {}]",
            t, n
        )));
    }
    let secret = secret.unwrap_or_else(FE::new_random);
    let (vss, ys) = VerifiableSS::share(t - 1, n, &secret);
    let shares = ys.into_iter().enumerate().map(|(i, y)| (i + 1, y)).collect();
    Ok((secret, shares, vss.commitments))
}

/// $`\sum_k x^k \cdot C_k`$, `None` stands for the point at infinity
fn evaluate_at(checks: &[GE], x: usize) -> Option<GE> {
    let q = FE::q();
    let x = BigInt::from(x as u64);
    let mut power = BigInt::one();
    let mut sum: Option<PK> = None;
    for check in checks {
        let term = (*check * to_scalar(&power)).get_element();
        // combine fails when the sum is the point at infinity
        sum = match sum {
            None => Some(term),
            Some(acc) => acc.combine(&term).ok(),
        };
        power = modmul(&power, &x, &q);
    }
    sum.and_then(|p| GE::from_bytes(&p.serialize_uncompressed()[1..]).ok())
}

/// $`\sum_k x^k \cdot C_k`$
pub fn evaluate_checks(checks: &[GE], x: usize) -> Result<GE, Error> {
    if checks.is_empty() || x == 0 {
        return Err(Error::malformed("no checks or zero x-coordinate"));
    }
    evaluate_at(checks, x)
        .ok_or_else(|| Error::arithmetic("checks evaluate to the point at infinity"))
}

/// Checks $`y \cdot G = \sum_k x^k \cdot C_k`$
///
/// A zero share is valid when the checks evaluate to the point at infinity.
pub fn verify_share(checks: &[GE], share: &SecretShare) -> bool {
    let (x, y) = share;
    if checks.is_empty() || *x == 0 {
        return false;
    }
    let expected = evaluate_at(checks, *x);
    if is_zero_scalar(y) {
        expected.is_none()
    } else {
        expected == Some(GE::generator() * *y)
    }
}

/// Lagrange coefficients $`\lambda_i = \prod_{j \ne i} \frac{x_j}{x_j - x_i}`$ for interpolation at zero
///
/// The x-coordinates have to be distinct and non-zero modulo the order of the curve.
#[trace(pretty)]
pub fn lagrange_coefficients(xs: &[usize]) -> Result<Vec<FE>, Error> {
    let q = FE::q();
    let points = xs
        .iter()
        .map(|x| BigInt::from(*x as u64).mod_floor(&q))
        .collect::<Vec<_>>();
    if points.iter().any(BigInt::is_zero) {
        return Err(Error::malformed("zero x-coordinate"));
    }
    if points.iter().collect::<BTreeSet<_>>().len() != points.len() {
        return Err(Error::malformed("x-coordinates are not distinct"));
    }

    points
        .iter()
        .map(|x_i| {
            let (num, denom) = points.iter().filter(|x_j| *x_j != x_i).fold(
                (BigInt::one(), BigInt::one()),
                |(num, denom), x_j| {
                    (
                        modmul(&num, x_j, &q),
                        modmul(&denom, &modsub(x_j, x_i, &q), &q),
                    )
                },
            );
            Ok(to_scalar(&modmul(&num, &invmod(&denom, &q)?, &q)))
        })
        .collect()
}

/// $`\sum_i \lambda_i y_i`$
pub fn reconstruct(coefficients: &[FE], ys: &[FE]) -> Result<FE, Error> {
    if coefficients.len() != ys.len() {
        return Err(Error::malformed(format!(
            "{} coefficients for {} shares",
            coefficients.len(),
            ys.len()
        )));
    }
    let q = FE::q();
    let terms = coefficients
        .iter()
        .zip(ys.iter())
        .map(|(l, y)| to_scalar(&modmul(&l.to_big_int(), &y.to_big_int(), &q)))
        .collect::<Vec<_>>();
    Ok(sum_scalars(&terms))
}

/// Reconstructs the secret from at least `t` shares
pub fn reconstruct_secret(t: usize, shares: &[SecretShare]) -> Result<FE, Error> {
    if shares.len() < t {
        return Err(Error::ThresholdUnmet {
            required: t,
            supplied: shares.len(),
        });
    }
    let xs = shares.iter().map(|(x, _)| *x).collect::<Vec<_>>();
    let ys = shares.iter().map(|(_, y)| *y).collect::<Vec<_>>();
    reconstruct(&lagrange_coefficients(&xs)?, &ys)
}

/// Converts the share of party with x-coordinate `x_i` into its additive share $`\lambda_i y_i`$
/// with respect to the set of x-coordinates `xs`
pub fn to_additive(xs: &[usize], x_i: usize, y_i: &FE) -> Result<FE, Error> {
    let position = xs
        .iter()
        .position(|x| *x == x_i)
        .ok_or_else(|| Error::malformed(format!("x-coordinate {} is not in the set", x_i)))?;
    let coefficients = lagrange_coefficients(xs)?;
    reconstruct(&coefficients[position..=position], &[*y_i])
}
