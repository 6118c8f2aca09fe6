//! Schnorr proofs of knowledge over the curve
//!
//! * [`DlogProof`] proves knowledge of $`x`$ such that $`V = x \cdot G`$:
//! ```math
//! C = r \cdot G,\quad e = H(G, V, C),\quad p = r - e x, \qquad p \cdot G + e \cdot V \overset{?}{=} C
//! ```
//! * [`DoubleDlogProof`] proves knowledge of $`s, l`$ such that $`V = s \cdot R + l \cdot G`$:
//! ```math
//! C = a \cdot R + b \cdot G,\quad c = H(G, R, V, C),\quad t = a + c s,\ u = b + c l, \qquad t \cdot R + u \cdot G \overset{?}{=} C + c \cdot V
//! ```
//!
//! Both proofs are also exposed as separate commit, challenge, prove and verify steps.
use crate::algorithms::sha::HSha256;
use crate::algorithms::{is_zero_scalar, modmul, modsub, to_scalar};
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use serde::{Deserialize, Serialize};
use trace::trace;

fn random_nonzero_scalar() -> FE {
    loop {
        let r = FE::new_random();
        if !is_zero_scalar(&r) {
            return r;
        }
    }
}

/// samples $`r`$, returns $`(r, C = r \cdot G)`$
pub fn commit() -> (FE, GE) {
    let r = random_nonzero_scalar();
    (r, GE::generator() * r)
}

/// $`e = H(G, V, C)`$
pub fn challenge(V: &GE, C: &GE) -> FE {
    HSha256::challenge_from_points(&[&GE::generator(), V, C])
}

/// $`p = r - e x`$
pub fn prove(r: &FE, e: &FE, x: &FE) -> FE {
    let q = FE::q();
    let ex = modmul(&e.to_big_int(), &x.to_big_int(), &q);
    to_scalar(&modsub(&r.to_big_int(), &ex, &q))
}

/// checks $`p \cdot G + e \cdot V = C`$
pub fn verify(V: &GE, C: &GE, e: &FE, p: &FE) -> bool {
    match (is_zero_scalar(e), is_zero_scalar(p)) {
        (true, _) => false,
        (false, true) => *V * *e == *C,
        (false, false) => {
            let lhs_g = GE::generator() * *p;
            let lhs_v = *V * *e;
            // the sum is the point at infinity
            if lhs_g == lhs_v.neg_point() {
                return false;
            }
            lhs_g + lhs_v == *C
        }
    }
}

trait NegPoint {
    fn neg_point(&self) -> Self;
}

impl NegPoint for GE {
    fn neg_point(&self) -> Self {
        let minus_one = to_scalar(&(FE::q() - BigInt::one()));
        *self * minus_one
    }
}

/// Non-interactive proof of knowledge of $`x = \log_G V`$
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DlogProof {
    pub V: GE,
    C: GE,
    p: FE,
}

#[trace(pretty, prefix = "DlogProof::")]
impl DlogProof {
    #[trace(disable(x))]
    pub fn prove(x: &FE) -> Self {
        let V = GE::generator() * *x;
        let (r, C) = commit();
        let e = challenge(&V, &C);
        let p = prove(&r, &e, x);
        Self { V, C, p }
    }

    pub fn verify(&self) -> bool {
        let e = challenge(&self.V, &self.C);
        verify(&self.V, &self.C, &e, &self.p)
    }
}

/// samples $`a, b`$, returns $`(a, b, C = a \cdot R + b \cdot G)`$
pub fn double_commit(R: &GE) -> (FE, FE, GE) {
    let a = random_nonzero_scalar();
    loop {
        let b = random_nonzero_scalar();
        let aR = *R * a;
        let bG = GE::generator() * b;
        if aR != bG.neg_point() {
            return (a, b, aR + bG);
        }
    }
}

/// $`c = H(G, R, V, C)`$
pub fn double_challenge(R: &GE, V: &GE, C: &GE) -> FE {
    HSha256::challenge_from_points(&[&GE::generator(), R, V, C])
}

/// $`t = a + c s,\ u = b + c l`$
pub fn double_prove(a: &FE, b: &FE, c: &FE, s: &FE, l: &FE) -> (FE, FE) {
    let q = FE::q();
    let response = |nonce: &FE, witness: &FE| {
        let cw = modmul(&c.to_big_int(), &witness.to_big_int(), &q);
        to_scalar(&(nonce.to_big_int() + cw))
    };
    (response(a, s), response(b, l))
}

/// checks $`t \cdot R + u \cdot G = C + c \cdot V`$
pub fn double_verify(R: &GE, V: &GE, C: &GE, c: &FE, t: &FE, u: &FE) -> bool {
    if is_zero_scalar(c) || is_zero_scalar(t) || is_zero_scalar(u) {
        return false;
    }
    let tR = *R * *t;
    let uG = GE::generator() * *u;
    let cV = *V * *c;
    if tR == uG.neg_point() || *C == cV.neg_point() {
        return false;
    }
    tR + uG == *C + cV
}

/// Non-interactive proof of knowledge of $`s, l`$ such that $`V = s \cdot R + l \cdot G`$
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleDlogProof {
    C: GE,
    t: FE,
    u: FE,
}

#[trace(pretty, prefix = "DoubleDlogProof::")]
impl DoubleDlogProof {
    #[trace(disable(s, l))]
    pub fn prove(R: &GE, V: &GE, s: &FE, l: &FE) -> Self {
        let (a, b, C) = double_commit(R);
        let c = double_challenge(R, V, &C);
        let (t, u) = double_prove(&a, &b, &c, s, l);
        Self { C, t, u }
    }

    pub fn verify(&self, R: &GE, V: &GE) -> bool {
        let c = double_challenge(R, V, &self.C);
        double_verify(R, V, &self.C, &c, &self.t, &self.u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlog_proof() {
        let _ = env_logger::builder().is_test(true).try_init();
        let x = FE::new_random();
        let proof = DlogProof::prove(&x);
        assert!(proof.verify());
        assert_eq!(proof.V, GE::generator() * x);
    }

    #[test]
    fn altered_dlog_proof_is_rejected() {
        let x = FE::new_random();
        let V = GE::generator() * x;
        let (r, C) = commit();
        let e = challenge(&V, &C);
        let p = prove(&r, &e, &x);
        assert!(verify(&V, &C, &e, &p));

        let other = GE::generator() * FE::new_random();
        let another_scalar = FE::new_random();
        assert!(!verify(&other, &C, &e, &p));
        assert!(!verify(&V, &other, &e, &p));
        assert!(!verify(&V, &C, &another_scalar, &p));
        assert!(!verify(&V, &C, &e, &another_scalar));
        assert!(!verify(&V, &C, &FE::zero(), &p));

        let proof = DlogProof { V: other, ..DlogProof::prove(&x) };
        assert!(!proof.verify());
    }

    #[test]
    fn double_dlog_proof() {
        let R = GE::generator() * FE::new_random();
        let s = FE::new_random();
        let l = FE::new_random();
        let V = R * s + GE::generator() * l;

        let proof = DoubleDlogProof::prove(&R, &V, &s, &l);
        assert!(proof.verify(&R, &V));

        let other = GE::generator() * FE::new_random();
        assert!(!proof.verify(&other, &V));
        assert!(!proof.verify(&R, &other));

        let wrong = DoubleDlogProof::prove(&R, &V, &s, &FE::new_random());
        assert!(!wrong.verify(&R, &V));

        let tampered = DoubleDlogProof {
            t: FE::new_random(),
            ..proof
        };
        assert!(!tampered.verify(&R, &V));
    }
}
