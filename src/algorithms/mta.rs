//! Multiplicative-to-additive share conversion (MtA) and its zero knowledge proofs
//!
//! Alice holds $`a`$, Bob holds $`b`$. After the protocol Alice holds $`\alpha`$ and Bob holds $`\beta`$ such that
//! ```math
//! \alpha + \beta = a \cdot b \mod q
//! ```
//! 1. Alice sends $`c_a = Enc_A(a)`$ along with the range proof $`a < q^3`$ built over Bob's bit commitment setup
//! 2. Bob samples $`\beta' \in [0,q)`$, replies with $`c_b = c_a^{b} \cdot Enc_A(\beta')`$ and keeps $`\beta = -\beta' \bmod q`$.
//!    Bob proves in zero knowledge over Alice's setup that $`b`$ and $`\beta'`$ are bounded and consistent with $`c_b`$.
//!    In the MtAwc mode the proof additionally shows that $`b`$ is the discrete logarithm of the point $`X = b \cdot G`$.
//! 3. Alice decrypts $`\alpha = Dec_A(c_b) \bmod q`$
//!
//! See ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf), Appendix A.
//!
//! Each proof follows the commit, challenge, prove, verify shape: `*Secrets::sample` draws the randomness,
//! `*Commitment::new` commits, the challenge is the hash of all public values, `*Response::new` proves.
use crate::algorithms::bit_commitment::BitCommitmentPublic;
use crate::algorithms::paillier::{
    add, encrypt, mult, validate_ciphertext, EncryptionRandomness, PaillierKeys,
};
use crate::algorithms::sha::{HSha256, HashWithNonce};
use crate::algorithms::{
    is_in_multiplicative_group, is_zero_scalar, to_scalar, SampleFromMultiplicativeGroup,
};
use crate::error::Error;
use curv::arithmetic::traits::{Samplable, ZeroizeBN};
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Formatter};
use trace::trace;
use zeroize::Zeroize;

/// enumerates the subtype of Bob's proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MtaMode {
    MtA,
    MtAwc,
}

/// Bob's state after [`receive`]: the reply to Alice and Bob's additive share
pub struct MtaResponse {
    pub c_b: BigInt,
    pub beta: FE,
    beta_prim: BigInt,
    randomness: EncryptionRandomness,
}

impl Zeroize for MtaResponse {
    fn zeroize(&mut self) {
        self.beta.zeroize();
        self.beta_prim.zeroize_bn();
        self.randomness.zeroize();
    }
}

impl Drop for MtaResponse {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Debug for MtaResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MtaResponse")
            .field("c_b", &self.c_b)
            .field("beta", &"[***]".to_owned())
            .finish()
    }
}

/// Alice: $`c_a = Enc_A(a)`$
pub fn initiate(alice_ek: &EncryptionKey, a: &FE) -> Result<(BigInt, EncryptionRandomness), Error> {
    encrypt(alice_ek, &a.to_big_int(), None)
}

/// Bob: $`c_b = c_a^{b} \cdot Enc_A(\beta')`$, $`\beta = -\beta' \bmod q`$
pub fn receive(alice_ek: &EncryptionKey, c_a: &BigInt, b: &FE) -> Result<MtaResponse, Error> {
    validate_ciphertext(alice_ek, c_a)?;
    let q = FE::q();
    let beta_prim = BigInt::sample_below(&q);
    let (enc_beta_prim, randomness) = encrypt(alice_ek, &beta_prim, None)?;
    let b_times_enc_a = mult(alice_ek, c_a, &b.to_big_int());
    let c_b = add(alice_ek, &b_times_enc_a, &enc_beta_prim);
    let beta = to_scalar(&(q - &beta_prim));
    Ok(MtaResponse {
        c_b,
        beta,
        beta_prim,
        randomness,
    })
}

/// Alice: $`\alpha = Dec_A(c_b) \bmod q`$
pub fn complete(alice_keys: &PaillierKeys, c_b: &BigInt) -> Result<FE, Error> {
    let mut plaintext = alice_keys.decrypt(c_b)?;
    let alpha = to_scalar(&plaintext);
    plaintext.zeroize_bn();
    Ok(alpha)
}

fn commit_to(setup: &BitCommitmentPublic, x: &BigInt, r: &BigInt) -> BigInt {
    (setup.b0.powm_sec(x, &setup.N) * setup.b1.powm_sec(r, &setup.N)) % &setup.N
}

fn is_positive_below(x: &BigInt, bound: &BigInt) -> bool {
    *x > BigInt::zero() && x < bound
}

/// Randomness of Alice's range proof, new values have to be sampled for each proof
pub struct RangeProofSecrets {
    alpha: BigInt,
    beta: BigInt,
    gamma: BigInt,
    ro: BigInt,
}

impl Zeroize for RangeProofSecrets {
    fn zeroize(&mut self) {
        self.alpha.zeroize_bn();
        self.beta.zeroize_bn();
        self.gamma.zeroize_bn();
        self.ro.zeroize_bn();
    }
}

impl Drop for RangeProofSecrets {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl RangeProofSecrets {
    ///  `alice_ek` - Alice's Paillier public key
    ///
    ///  `bob_setup` - Bob's bit commitment setup
    pub fn sample(alice_ek: &EncryptionKey, bob_setup: &BitCommitmentPublic) -> Self {
        let q = FE::q();
        Self {
            alpha: BigInt::sample_below(&q.pow(3)),
            beta: BigInt::from_modulo(&alice_ek.n),
            gamma: BigInt::sample_below(&(q.pow(3) * &bob_setup.N)),
            ro: BigInt::sample_below(&(&q * &bob_setup.N)),
        }
    }
}

/// First move of Alice's range proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeProofCommitment {
    z: BigInt,
    u: BigInt,
    w: BigInt,
}

impl RangeProofCommitment {
    pub fn new(
        secrets: &RangeProofSecrets,
        a: &BigInt,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
    ) -> Self {
        let N = &alice_ek.n;
        let NN = &alice_ek.nn;
        Self {
            z: commit_to(bob_setup, a, &secrets.ro),
            u: ((&secrets.alpha * N + BigInt::one()) * secrets.beta.powm_sec(N, NN)) % NN,
            w: commit_to(bob_setup, &secrets.alpha, &secrets.gamma),
        }
    }
}

/// Response of Alice's range proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeProofResponse {
    s: BigInt,
    s1: BigInt,
    s2: BigInt,
}

impl RangeProofResponse {
    /// `r` - randomness of the encryption of `a`
    pub fn new(
        secrets: &RangeProofSecrets,
        e: &BigInt,
        a: &BigInt,
        r: &EncryptionRandomness,
        alice_ek: &EncryptionKey,
    ) -> Self {
        let N = &alice_ek.n;
        Self {
            s: (r.value().powm_sec(e, N) * &secrets.beta) % N,
            s1: e * a + &secrets.alpha,
            s2: e * &secrets.ro + &secrets.gamma,
        }
    }
}

/// Alice's proof that the plaintext of $`c_a`$ is less than $`q^3`$
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeProof {
    commitment: RangeProofCommitment,
    e: HashWithNonce,
    response: RangeProofResponse,
}

impl RangeProof {
    fn public_values<'a>(
        cipher: &'a BigInt,
        alice_ek: &'a EncryptionKey,
        bob_setup: &'a BitCommitmentPublic,
        commitment: &'a RangeProofCommitment,
    ) -> Vec<&'a BigInt> {
        vec![
            &alice_ek.n,
            &bob_setup.N,
            &bob_setup.b0,
            &bob_setup.b1,
            cipher,
            &commitment.z,
            &commitment.u,
            &commitment.w,
        ]
    }

    /// replaces $`s_1`$ with a value above $`q^3`$, the challenge stays valid
    #[cfg(test)]
    pub(crate) fn tamper_s1(&mut self) {
        self.response.s1 = FE::q().pow(3) + BigInt::one();
    }
}

#[trace(pretty, prefix = "RangeProof::")]
impl RangeProof {
    /// Fiat-Shamir challenge $`e < q`$
    pub fn challenge(
        cipher: &BigInt,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
        commitment: &RangeProofCommitment,
    ) -> HashWithNonce {
        HSha256::create_hash_bounded_by_q(
            &Self::public_values(cipher, alice_ek, bob_setup, commitment),
            &FE::q(),
        )
    }

    /// create the proof using Alice's secret `a`, the randomness used for encrypting it and Bob's setup
    #[trace(disable(a, r))]
    pub fn generate(
        a: &BigInt,
        cipher: &BigInt,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
        r: &EncryptionRandomness,
    ) -> Self {
        let secrets = RangeProofSecrets::sample(alice_ek, bob_setup);
        let commitment = RangeProofCommitment::new(&secrets, a, alice_ek, bob_setup);
        let e = Self::challenge(cipher, alice_ek, bob_setup, &commitment);
        let response = RangeProofResponse::new(&secrets, &e.0, a, r, alice_ek);
        Self {
            commitment,
            e,
            response,
        }
    }

    /// verify Alice's proof using Alice's public key and the verifier's own setup
    pub fn verify(
        &self,
        cipher: &BigInt,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
    ) -> bool {
        let N = &alice_ek.n;
        let NN = &alice_ek.nn;
        let N_tilde = &bob_setup.N;
        let q = FE::q();
        let RangeProofCommitment { z, u, w } = &self.commitment;
        let RangeProofResponse { s, s1, s2 } = &self.response;

        if !HSha256::verify_hash_with_nonce(
            &Self::public_values(cipher, alice_ek, bob_setup, &self.commitment),
            &self.e,
        ) || !is_positive_below(&self.e.0, &q)
        {
            log::trace!("hash doesn't match");
            return false;
        }

        if !is_positive_below(s1, &q.pow(3)) {
            log::trace!("proof.s1 is larger than q^3");
            return false;
        }
        if *s2 <= BigInt::zero()
            || !is_in_multiplicative_group(s, N)
            || !is_in_multiplicative_group(z, N_tilde)
            || !is_in_multiplicative_group(w, N_tilde)
            || !is_in_multiplicative_group(u, NN)
            || !is_in_multiplicative_group(cipher, NN)
        {
            log::trace!("proof values out of range");
            return false;
        }

        let e = &self.e.0;
        // h1^s1 h2^s2 = w z^e
        if commit_to(bob_setup, s1, s2) != (w * z.powm_sec(e, N_tilde)) % N_tilde {
            log::trace!("proof.w does not hold right value");
            return false;
        }

        // (1 + s1 N) s^N = u c^e
        let gs1 = (s1 * N + BigInt::one()) % NN;
        if (gs1 * s.powm_sec(N, NN)) % NN != (u * cipher.powm_sec(e, NN)) % NN {
            log::trace!("proof.u does not hold right value");
            return false;
        }

        true
    }
}

/// Randomness of Bob's proof, new values have to be sampled for each proof
pub struct MtaProofSecrets {
    alpha: BigInt,
    beta: BigInt,
    gamma: BigInt,
    ro: BigInt,
    ro_prim: BigInt,
    sigma: BigInt,
    tau: BigInt,
}

impl Zeroize for MtaProofSecrets {
    fn zeroize(&mut self) {
        self.alpha.zeroize_bn();
        self.beta.zeroize_bn();
        self.gamma.zeroize_bn();
        self.ro.zeroize_bn();
        self.ro_prim.zeroize_bn();
        self.sigma.zeroize_bn();
        self.tau.zeroize_bn();
    }
}

impl Drop for MtaProofSecrets {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl MtaProofSecrets {
    pub fn sample(alice_ek: &EncryptionKey, alice_setup: &BitCommitmentPublic) -> Self {
        let q = FE::q();
        let N_tilde = &alice_setup.N;
        Self {
            alpha: BigInt::sample_below(&q.pow(3)),
            beta: BigInt::from_modulo(&alice_ek.n),
            gamma: BigInt::sample_below(&(q.pow(2) * &alice_ek.n)),
            ro: BigInt::sample_below(&(&q * N_tilde)),
            ro_prim: BigInt::sample_below(&(q.pow(3) * N_tilde)),
            sigma: BigInt::sample_below(&(&q * N_tilde)),
            tau: BigInt::sample_below(&(q.pow(3) * N_tilde)),
        }
    }

    /// $`u = \alpha \cdot G`$, used by the MtAwc proof
    fn u(&self) -> GE {
        GE::generator() * to_scalar(&self.alpha)
    }
}

/// First move of Bob's proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaProofCommitment {
    z: BigInt,
    z_prim: BigInt,
    t: BigInt,
    v: BigInt,
    w: BigInt,
}

impl MtaProofCommitment {
    /// `b` - Bob's secret
    /// `beta_prim`  - randomly chosen in `MtA` by Bob
    /// `a_encrypted` - Alice's secret encrypted by Alice
    pub fn new(
        secrets: &MtaProofSecrets,
        b: &BigInt,
        beta_prim: &BigInt,
        a_encrypted: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
    ) -> Self {
        let N = &alice_ek.n;
        let NN = &alice_ek.nn;
        Self {
            z: commit_to(alice_setup, b, &secrets.ro),
            z_prim: commit_to(alice_setup, &secrets.alpha, &secrets.ro_prim),
            t: commit_to(alice_setup, beta_prim, &secrets.sigma),
            w: commit_to(alice_setup, &secrets.gamma, &secrets.tau),
            v: (a_encrypted.powm_sec(&secrets.alpha, NN)
                * (&secrets.gamma * N + BigInt::one())
                * secrets.beta.powm_sec(N, NN))
                % NN,
        }
    }
}

/// Response of Bob's proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaProofResponse {
    s: BigInt,
    s1: BigInt,
    s2: BigInt,
    t1: BigInt,
    t2: BigInt,
}

impl MtaProofResponse {
    /// `e` - the challenge
    /// `r` - randomness used by Bob on Alice's public Paillier key to encrypt `beta_prim`
    pub fn new(
        secrets: &MtaProofSecrets,
        e: &BigInt,
        b: &BigInt,
        beta_prim: &BigInt,
        r: &EncryptionRandomness,
        alice_ek: &EncryptionKey,
    ) -> Self {
        let N = &alice_ek.n;
        Self {
            s: (r.value().powm_sec(e, N) * &secrets.beta) % N,
            s1: e * b + &secrets.alpha,
            s2: e * &secrets.ro + &secrets.ro_prim,
            t1: e * beta_prim + &secrets.gamma,
            t2: e * &secrets.sigma + &secrets.tau,
        }
    }
}

/// Bob's proof that $`b < q^3`$ and $`c_b`$ is formed as $`c_a^b \cdot Enc(\beta')`$
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaProof {
    commitment: MtaProofCommitment,
    e: HashWithNonce,
    response: MtaProofResponse,
}

/// Bob's proof with check, adds the knowledge of $`X = b \cdot G`$
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaWcProof {
    proof: MtaProof,
    u: GE,
    X: GE,
}

/// Public values of Bob's proof which enter the challenge
struct MtaStatement<'a> {
    a_enc: &'a BigInt,
    mta_out: &'a BigInt,
    alice_ek: &'a EncryptionKey,
    alice_setup: &'a BitCommitmentPublic,
}

impl<'a> MtaStatement<'a> {
    fn public_values(&self, commitment: &'a MtaProofCommitment) -> Vec<&'a BigInt> {
        vec![
            &self.alice_ek.n,
            &self.alice_setup.N,
            &self.alice_setup.b0,
            &self.alice_setup.b1,
            self.a_enc,
            self.mta_out,
            &commitment.z,
            &commitment.z_prim,
            &commitment.t,
            &commitment.v,
            &commitment.w,
        ]
    }
}

fn point_coordinates(point: &GE) -> Option<(BigInt, BigInt)> {
    Some((point.x_coor()?, point.y_coor()?))
}

impl MtaProof {
    fn generate_with_extra(
        statement: &MtaStatement,
        secrets: &MtaProofSecrets,
        b: &BigInt,
        beta_prim: &BigInt,
        r: &EncryptionRandomness,
        extra: &[&BigInt],
    ) -> Self {
        let commitment = MtaProofCommitment::new(
            secrets,
            b,
            beta_prim,
            statement.a_enc,
            statement.alice_ek,
            statement.alice_setup,
        );
        let mut public_values = extra.to_vec();
        public_values.extend(statement.public_values(&commitment));
        let e = HSha256::create_hash_bounded_by_q(&public_values, &FE::q());
        let response =
            MtaProofResponse::new(secrets, &e.0, b, beta_prim, r, statement.alice_ek);
        Self {
            commitment,
            e,
            response,
        }
    }

    fn verify_with_extra(&self, statement: &MtaStatement, extra: &[&BigInt]) -> bool {
        let N = &statement.alice_ek.n;
        let NN = &statement.alice_ek.nn;
        let N_tilde = &statement.alice_setup.N;
        let q = FE::q();
        let MtaProofCommitment {
            z,
            z_prim,
            t,
            v,
            w,
        } = &self.commitment;
        let MtaProofResponse { s, s1, s2, t1, t2 } = &self.response;

        let mut public_values = extra.to_vec();
        public_values.extend(statement.public_values(&self.commitment));
        if !HSha256::verify_hash_with_nonce(&public_values, &self.e)
            || !is_positive_below(&self.e.0, &q)
        {
            log::trace!("hash doesn't match");
            return false;
        }

        if !is_positive_below(s1, &q.pow(3)) {
            log::trace!("proof.s1 is larger than q^3");
            return false;
        }
        let zero = BigInt::zero();
        if *s2 <= zero
            || *t1 <= zero
            || *t2 <= zero
            || !is_in_multiplicative_group(s, N)
            || ![z, z_prim, t, w]
                .iter()
                .all(|x| is_in_multiplicative_group(x, N_tilde))
            || ![v, statement.a_enc, statement.mta_out]
                .iter()
                .all(|x| is_in_multiplicative_group(x, NN))
        {
            log::trace!("proof values out of range");
            return false;
        }

        let e = &self.e.0;
        let setup = statement.alice_setup;
        // h1^s1 h2^s2 = z^e z'
        if commit_to(setup, s1, s2) != (z.powm_sec(e, N_tilde) * z_prim) % N_tilde {
            log::trace!("proof.z doesn't hold right value");
            return false;
        }

        // c1^s1 s^N (1 + t1 N) = c2^e v
        let lc1 = (statement.a_enc.powm_sec(s1, NN) * s.powm_sec(N, NN) * (t1 * N + BigInt::one()))
            % NN;
        let lc2 = (statement.mta_out.powm_sec(e, NN) * v) % NN;
        if lc1 != lc2 {
            log::trace!("proof.c2.v doesn't hold right value");
            return false;
        }

        // h1^t1 h2^t2 = t^e w
        if commit_to(setup, t1, t2) != (t.powm_sec(e, N_tilde) * w) % N_tilde {
            log::trace!("proof.t.w doesn't hold right value");
            return false;
        }

        true
    }
}

#[allow(clippy::too_many_arguments)]
#[trace(pretty, prefix = "MtaProof::")]
impl MtaProof {
    #[trace(disable(b, beta_prim, r))]
    pub fn generate(
        a_encrypted: &BigInt,
        mta_encrypted: &BigInt,
        b: &BigInt,
        beta_prim: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
        r: &EncryptionRandomness,
    ) -> Self {
        let secrets = MtaProofSecrets::sample(alice_ek, alice_setup);
        let statement = MtaStatement {
            a_enc: a_encrypted,
            mta_out: mta_encrypted,
            alice_ek,
            alice_setup,
        };
        Self::generate_with_extra(&statement, &secrets, b, beta_prim, r, &[])
    }

    pub fn verify(
        &self,
        a_enc: &BigInt,
        mta_avc_out: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
    ) -> bool {
        let statement = MtaStatement {
            a_enc,
            mta_out: mta_avc_out,
            alice_ek,
            alice_setup,
        };
        self.verify_with_extra(&statement, &[])
    }
}

#[allow(clippy::too_many_arguments)]
#[trace(pretty, prefix = "MtaWcProof::")]
impl MtaWcProof {
    #[trace(disable(b, beta_prim, r))]
    pub fn generate(
        a_encrypted: &BigInt,
        mta_encrypted: &BigInt,
        b: &FE,
        beta_prim: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
        r: &EncryptionRandomness,
    ) -> Result<Self, Error> {
        let secrets = MtaProofSecrets::sample(alice_ek, alice_setup);
        let X = GE::generator() * *b;
        let u = secrets.u();
        let (X_x, X_y) =
            point_coordinates(&X).ok_or_else(|| Error::malformed("X is the point at infinity"))?;
        let (u_x, u_y) =
            point_coordinates(&u).ok_or_else(|| Error::malformed("u is the point at infinity"))?;

        let statement = MtaStatement {
            a_enc: a_encrypted,
            mta_out: mta_encrypted,
            alice_ek,
            alice_setup,
        };
        let proof = MtaProof::generate_with_extra(
            &statement,
            &secrets,
            &b.to_big_int(),
            beta_prim,
            r,
            &[&X_x, &X_y, &u_x, &u_y],
        );
        Ok(Self { proof, u, X })
    }

    pub fn verify(
        &self,
        a_enc: &BigInt,
        mta_avc_out: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
    ) -> bool {
        let (X_x, X_y, u_x, u_y) = match (point_coordinates(&self.X), point_coordinates(&self.u)) {
            (Some((X_x, X_y)), Some((u_x, u_y))) => (X_x, X_y, u_x, u_y),
            _ => return false,
        };
        let statement = MtaStatement {
            a_enc,
            mta_out: mta_avc_out,
            alice_ek,
            alice_setup,
        };

        // check basic proof first
        if !self
            .proof
            .verify_with_extra(&statement, &[&X_x, &X_y, &u_x, &u_y])
        {
            return false;
        }

        // s1 G = e X + u
        let s1 = to_scalar(&self.proof.response.s1);
        let e: FE = to_scalar(&self.proof.e.0);
        if is_zero_scalar(&s1) {
            return false;
        }
        if GE::generator() * s1 != (self.X * e) + self.u {
            log::trace!("proof.X doesn't hold right value");
            return false;
        }

        true
    }

    /// the point $`X = b \cdot G`$ the proof is bound to
    pub fn X(&self) -> &GE {
        &self.X
    }
}

/// Alice's message: encrypted share along with the range proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageA {
    pub c: BigInt,
    pub range_proof: RangeProof,
}

#[trace(pretty, prefix = "MessageA::")]
impl MessageA {
    /// `a` - Alice 's secret
    #[trace(disable(a))]
    pub fn new(
        a: &FE,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
    ) -> Result<Self, Error> {
        let (c, r) = initiate(alice_ek, a)?;
        let range_proof = RangeProof::generate(&a.to_big_int(), &c, alice_ek, bob_setup, &r);
        Ok(Self { c, range_proof })
    }

    /// Bob verifies the range proof against his own setup
    pub fn verify(
        &self,
        alice_ek: &EncryptionKey,
        bob_setup: &BitCommitmentPublic,
    ) -> Result<(), Error> {
        validate_ciphertext(alice_ek, &self.c)?;
        if self.range_proof.verify(&self.c, alice_ek, bob_setup) {
            Ok(())
        } else {
            Err(Error::proof("MtA range proof"))
        }
    }
}

/// enumerates types of proofs Bob can use in the protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MtaProofVariant {
    MtA(MtaProof),
    MtAwc(MtaWcProof),
}

/// the response to Alice's messageA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageB {
    pub c: BigInt,
    pub proof: MtaProofVariant,
}

impl MessageB {
    /// b  is Bob's secret
    /// returns ( Message, new Bob's secret )
    pub fn new(
        b: &FE,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
        alice_msg: &MessageA,
        mta_mode: MtaMode,
    ) -> Result<(Self, FE), Error> {
        let response = receive(alice_ek, &alice_msg.c, b)?;
        let proof = match mta_mode {
            MtaMode::MtA => MtaProofVariant::MtA(MtaProof::generate(
                &alice_msg.c,
                &response.c_b,
                &b.to_big_int(),
                &response.beta_prim,
                alice_ek,
                alice_setup,
                &response.randomness,
            )),
            MtaMode::MtAwc => MtaProofVariant::MtAwc(MtaWcProof::generate(
                &alice_msg.c,
                &response.c_b,
                b,
                &response.beta_prim,
                alice_ek,
                alice_setup,
                &response.randomness,
            )?),
        };
        Ok((
            Self {
                c: response.c_b.clone(),
                proof,
            },
            response.beta,
        ))
    }

    /// Alice verifies Bob's proof against her own setup, the variant of the proof has to match `mode`
    pub fn verify(
        &self,
        a_enc: &BigInt,
        alice_ek: &EncryptionKey,
        alice_setup: &BitCommitmentPublic,
        mode: MtaMode,
    ) -> Result<(), Error> {
        validate_ciphertext(alice_ek, &self.c)?;
        let valid = match (&self.proof, mode) {
            (MtaProofVariant::MtA(proof), MtaMode::MtA) => {
                proof.verify(a_enc, &self.c, alice_ek, alice_setup)
            }
            (MtaProofVariant::MtAwc(proof), MtaMode::MtAwc) => {
                proof.verify(a_enc, &self.c, alice_ek, alice_setup)
            }
            _ => {
                return Err(Error::malformed(format!(
                    "unexpected variant of the proof, expected {}",
                    mode
                )))
            }
        };
        if valid {
            Ok(())
        } else {
            Err(Error::proof(format!("{} proof", mode)))
        }
    }

    /// the point $`X = b \cdot G`$ Bob's share is bound to, available in MtAwc mode only
    pub fn committed_point(&self) -> Option<&GE> {
        match &self.proof {
            MtaProofVariant::MtAwc(proof) => Some(proof.X()),
            MtaProofVariant::MtA(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::bit_commitment::BitCommitmentSetup;
    use crate::algorithms::paillier::DecryptionMode;
    use crate::algorithms::sum_scalars;
    use crate::error::ErrorKind;

    const TEST_PAILLIER_PRIME_BITS: usize = 512;
    const TEST_SAFE_PRIME_BITS: usize = 256;

    #[derive(Debug)]
    pub struct AliceOrBob {
        pub paillier_keys: PaillierKeys,
        pub setup: BitCommitmentSetup,
    }

    impl AliceOrBob {
        pub fn new() -> anyhow::Result<Self> {
            Ok(Self {
                paillier_keys: PaillierKeys::random(TEST_PAILLIER_PRIME_BITS, DecryptionMode::Crt),
                setup: BitCommitmentSetup::generate(TEST_SAFE_PRIME_BITS, false)?,
            })
        }
    }

    #[test]
    fn plain_mta_yields_additive_shares() -> anyhow::Result<()> {
        let keys = PaillierKeys::random(TEST_PAILLIER_PRIME_BITS, DecryptionMode::Totient);
        let mut inputs = vec![(FE::new_random(), FE::new_random())];
        // edge values of the field
        let q_minus_one = to_scalar(&(FE::q() - BigInt::one()));
        inputs.push((q_minus_one, q_minus_one));
        inputs.push((FE::new_random(), to_scalar(&BigInt::one())));

        for (a, b) in inputs {
            let (c_a, _) = initiate(&keys.ek, &a)?;
            let response = receive(&keys.ek, &c_a, &b)?;
            let alpha = complete(&keys, &response.c_b)?;
            assert_eq!(sum_scalars(&[alpha, response.beta]), a * b);
        }
        Ok(())
    }

    #[test]
    fn alice_range_proof() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let bob = AliceOrBob::new()?;
        let alice = AliceOrBob::new()?;
        let bob_public_setup = bob.setup.public();

        let a = FE::new_random();
        let message = MessageA::new(&a, &alice.paillier_keys.ek, &bob_public_setup)?;
        message.verify(&alice.paillier_keys.ek, &bob_public_setup)?;

        // the proof is bound to Bob's setup
        let err = message
            .verify(&alice.paillier_keys.ek, &alice.setup.public())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofInvalid);
        Ok(())
    }

    #[test]
    fn tampered_range_proof_is_rejected() -> anyhow::Result<()> {
        let bob = AliceOrBob::new()?;
        let alice = AliceOrBob::new()?;
        let bob_public_setup = bob.setup.public();
        let ek = &alice.paillier_keys.ek;

        let a = FE::new_random();
        let message = MessageA::new(&a, ek, &bob_public_setup)?;

        let mut tampered = message.clone();
        tampered.range_proof.response.s1 = &tampered.range_proof.response.s1 + BigInt::one();
        assert!(!tampered.range_proof.verify(&tampered.c, ek, &bob_public_setup));

        let mut tampered = message.clone();
        tampered.range_proof.response.s1 = FE::q().pow(3) + BigInt::one();
        assert!(!tampered.range_proof.verify(&tampered.c, ek, &bob_public_setup));

        let mut tampered = message.clone();
        tampered.range_proof.e.0 = &tampered.range_proof.e.0 + BigInt::one();
        assert!(!tampered.range_proof.verify(&tampered.c, ek, &bob_public_setup));

        // ciphertext of another value
        let mut tampered = message;
        tampered.c = initiate(ek, &FE::new_random())?.0;
        assert!(!tampered.range_proof.verify(&tampered.c, ek, &bob_public_setup));
        Ok(())
    }

    #[test]
    fn out_of_range_value_is_rejected() -> anyhow::Result<()> {
        let bob = AliceOrBob::new()?;
        let alice = AliceOrBob::new()?;
        let bob_public_setup = bob.setup.public();
        let ek = &alice.paillier_keys.ek;

        // a dishonest Alice encrypts a value much larger than q^3
        let a = FE::q().pow(4);
        let (c, r) = encrypt(ek, &a, None)?;
        let proof = RangeProof::generate(&a, &c, ek, &bob_public_setup, &r);
        assert!(!proof.verify(&c, ek, &bob_public_setup));
        Ok(())
    }

    #[test]
    fn bob_proofs() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let alice = AliceOrBob::new()?;
        let alice_public_setup = alice.setup.public();
        let alice_ek = &alice.paillier_keys.ek;
        let bob = AliceOrBob::new()?;
        let bob_public_setup = bob.setup.public();

        for _ in 0..3 {
            let a = FE::new_random();
            let msga = MessageA::new(&a, alice_ek, &bob_public_setup)?;
            msga.verify(alice_ek, &bob_public_setup)?;

            let b = FE::new_random();
            // Bob follows MtA
            let (msgb, beta) = MessageB::new(&b, alice_ek, &alice_public_setup, &msga, MtaMode::MtA)?;
            msgb.verify(&msga.c, alice_ek, &alice_public_setup, MtaMode::MtA)?;
            assert!(msgb.committed_point().is_none());
            let alpha = complete(&alice.paillier_keys, &msgb.c)?;
            assert_eq!(a * b, sum_scalars(&[alpha, beta]));

            // Bob follows MtAwc
            let (msgb, beta) =
                MessageB::new(&b, alice_ek, &alice_public_setup, &msga, MtaMode::MtAwc)?;
            msgb.verify(&msga.c, alice_ek, &alice_public_setup, MtaMode::MtAwc)?;
            assert_eq!(msgb.committed_point(), Some(&(GE::generator() * b)));
            let alpha = complete(&alice.paillier_keys, &msgb.c)?;
            assert_eq!(a * b, sum_scalars(&[alpha, beta]));

            // a proof of the other mode is refused
            let err = msgb
                .verify(&msga.c, alice_ek, &alice_public_setup, MtaMode::MtA)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput);
        }
        Ok(())
    }

    #[test]
    fn tampered_bob_proofs_are_rejected() -> anyhow::Result<()> {
        let alice = AliceOrBob::new()?;
        let alice_public_setup = alice.setup.public();
        let alice_ek = &alice.paillier_keys.ek;
        let bob = AliceOrBob::new()?;

        let a = FE::new_random();
        let msga = MessageA::new(&a, alice_ek, &bob.setup.public())?;
        let b = FE::new_random();

        let (msgb, _) = MessageB::new(&b, alice_ek, &alice_public_setup, &msga, MtaMode::MtA)?;
        if let MtaProofVariant::MtA(proof) = &msgb.proof {
            let mut tampered = proof.clone();
            tampered.response.t1 = &tampered.response.t1 + BigInt::one();
            assert!(!tampered.verify(&msga.c, &msgb.c, alice_ek, &alice_public_setup));
            // c_b of a different MtA instance
            let (other, _) =
                MessageB::new(&b, alice_ek, &alice_public_setup, &msga, MtaMode::MtA)?;
            assert!(!proof.verify(&msga.c, &other.c, alice_ek, &alice_public_setup));
        } else {
            panic!("unexpected proof variant");
        }

        let (msgb, _) = MessageB::new(&b, alice_ek, &alice_public_setup, &msga, MtaMode::MtAwc)?;
        if let MtaProofVariant::MtAwc(proof) = &msgb.proof {
            let mut tampered = proof.clone();
            tampered.X = GE::generator() * FE::new_random();
            assert!(!tampered.verify(&msga.c, &msgb.c, alice_ek, &alice_public_setup));
        } else {
            panic!("unexpected proof variant");
        }
        Ok(())
    }
}
