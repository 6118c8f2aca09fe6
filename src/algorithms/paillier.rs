//! Paillier additively homomorphic cryptosystem
//!
//! Encryption and homomorphic operations are delegated to the `paillier` crate. The decryption is available
//! in two interchangeable forms, selected by [`DecryptionMode`]:
//!
//! * the textbook form with $`\lambda = (p-1)(q-1)`$ and $`\mu = \lambda^{-1} \bmod n`$:
//! ```math
//! m = L(c^{\lambda} \bmod n^2) \cdot \mu \bmod n, \quad L(x) = \frac{x-1}{n}
//! ```
//! * the CRT form computing the plaintext modulo $`p`$ and $`q`$ with half-size exponents and combining the results.
//!
//! Both forms produce identical plaintexts for every ciphertext in $`Z^{*}_{n^2}`$.

use crate::algorithms::primes::{is_prime, MIN_MILLER_RABIN_ROUNDS};
use crate::algorithms::{
    invmod, is_in_multiplicative_group, modmul, modsub, SampleFromMultiplicativeGroup,
};
use crate::error::Error;
use curv::arithmetic::traits::ZeroizeBN;
use curv::BigInt;
use paillier::{
    Add, DecryptionKey, EncryptWithChosenRandomness, EncryptionKey, KeyGeneration, Mul, Paillier,
    Randomness, RawCiphertext, RawPlaintext,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::OnceLock;
use zeroize::Zeroize;

/// Selects the implementation of Paillier decryption
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum DecryptionMode {
    /// single exponentiation modulo $`n^2`$ with the totient $`\lambda`$
    Totient,
    /// two half-size exponentiations combined by CRT
    Crt,
}

impl Default for DecryptionMode {
    fn default() -> Self {
        DecryptionMode::Crt
    }
}

/// Private Paillier key in the form ready for decryption
pub trait PaillierDecryption {
    /// Decrypts a ciphertext which is required to belong to $`Z^{*}_{n^2}`$
    fn decrypt_raw(&self, c: &BigInt) -> BigInt;
}

/// $`L(x) = (x-1)/d`$
fn l_function(x: &BigInt, d: &BigInt) -> BigInt {
    (x - BigInt::one()).div_floor(d)
}

#[derive(Clone)]
pub struct TotientDecryptionKey {
    n: BigInt,
    nn: BigInt,
    lambda: BigInt,
    mu: BigInt,
}

impl TotientDecryptionKey {
    pub fn new(dk: &DecryptionKey) -> Result<Self, Error> {
        let one = BigInt::one();
        let n = &dk.p * &dk.q;
        let nn = &n * &n;
        let lambda = (&dk.p - &one) * (&dk.q - &one);
        let mu = invmod(&lambda, &n)?;
        Ok(Self { n, nn, lambda, mu })
    }
}

impl PaillierDecryption for TotientDecryptionKey {
    fn decrypt_raw(&self, c: &BigInt) -> BigInt {
        let u = c.powm_sec(&self.lambda, &self.nn);
        (l_function(&u, &self.n) * &self.mu).mod_floor(&self.n)
    }
}

impl Zeroize for TotientDecryptionKey {
    fn zeroize(&mut self) {
        self.lambda.zeroize_bn();
        self.mu.zeroize_bn();
    }
}

impl Drop for TotientDecryptionKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// CRT-split private key $`(p, q, l_p, l_q, m_p, m_q)`$ along with $`p^{-1} \bmod q`$
#[derive(Clone)]
pub struct CrtDecryptionKey {
    p: BigInt,
    q: BigInt,
    pp: BigInt,
    qq: BigInt,
    lp: BigInt,
    lq: BigInt,
    mp: BigInt,
    mq: BigInt,
    p_inv: BigInt,
}

impl CrtDecryptionKey {
    pub fn new(dk: &DecryptionKey) -> Result<Self, Error> {
        let one = BigInt::one();
        let n = &dk.p * &dk.q;
        let g = &n + &one;
        let pp = &dk.p * &dk.p;
        let qq = &dk.q * &dk.q;
        let lp = &dk.p - &one;
        let lq = &dk.q - &one;
        let mp = invmod(&l_function(&g.powm_sec(&lp, &pp), &dk.p), &dk.p)?;
        let mq = invmod(&l_function(&g.powm_sec(&lq, &qq), &dk.q), &dk.q)?;
        let p_inv = invmod(&dk.p, &dk.q)?;
        Ok(Self {
            p: dk.p.clone(),
            q: dk.q.clone(),
            pp,
            qq,
            lp,
            lq,
            mp,
            mq,
            p_inv,
        })
    }

    fn half_decrypt(c: &BigInt, prime: &BigInt, square: &BigInt, l: &BigInt, m: &BigInt) -> BigInt {
        let u = c.mod_floor(square).powm_sec(l, square);
        (l_function(&u, prime) * m).mod_floor(prime)
    }
}

impl PaillierDecryption for CrtDecryptionKey {
    fn decrypt_raw(&self, c: &BigInt) -> BigInt {
        let m_p = Self::half_decrypt(c, &self.p, &self.pp, &self.lp, &self.mp);
        let m_q = Self::half_decrypt(c, &self.q, &self.qq, &self.lq, &self.mq);
        let h = modmul(&modsub(&m_q, &m_p, &self.q), &self.p_inv, &self.q);
        m_p + &self.p * h
    }
}

impl Zeroize for CrtDecryptionKey {
    fn zeroize(&mut self) {
        self.p.zeroize_bn();
        self.q.zeroize_bn();
        self.pp.zeroize_bn();
        self.qq.zeroize_bn();
        self.lp.zeroize_bn();
        self.lq.zeroize_bn();
        self.mp.zeroize_bn();
        self.mq.zeroize_bn();
        self.p_inv.zeroize_bn();
    }
}

impl Drop for CrtDecryptionKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Randomness $`r \in Z^{*}_n`$ of a Paillier encryption
///
/// $`r^n \bmod n^2`$ depends on $`r \bmod n`$ only, so the ciphertexts are distributed as with $`r`$ sampled from $`[2, n^2)`$.
///
/// Outside of tests the value is always sampled, a caller can't choose it.
pub struct EncryptionRandomness(BigInt);

impl EncryptionRandomness {
    pub fn sample(ek: &EncryptionKey) -> Self {
        EncryptionRandomness(BigInt::from_modulo(&ek.n))
    }

    /// Fixed randomness for reproducible test vectors
    #[cfg(any(test, feature = "test-vectors"))]
    pub fn fixed(r: BigInt) -> Self {
        EncryptionRandomness(r)
    }

    pub(crate) fn value(&self) -> &BigInt {
        &self.0
    }
}

impl Debug for EncryptionRandomness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionRandomness([***])")
    }
}

impl Zeroize for EncryptionRandomness {
    fn zeroize(&mut self) {
        self.0.zeroize_bn();
    }
}

impl Drop for EncryptionRandomness {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Encrypts $`m \in [0,n)`$ as $`c = r^n \cdot g^m \bmod n^2`$
///
/// Samples the randomness if none is supplied. Returns the ciphertext along with the randomness used.
pub fn encrypt(
    ek: &EncryptionKey,
    m: &BigInt,
    r: Option<EncryptionRandomness>,
) -> Result<(BigInt, EncryptionRandomness), Error> {
    if *m < BigInt::zero() || *m >= ek.n {
        return Err(Error::malformed("plaintext out of range [0,n)"));
    }
    let r = r.unwrap_or_else(|| EncryptionRandomness::sample(ek));
    if !is_in_multiplicative_group(r.value(), &ek.n) {
        return Err(Error::malformed("encryption randomness is not in Z*_n"));
    }
    let c = Paillier::encrypt_with_chosen_randomness(
        ek,
        RawPlaintext::from(m),
        &Randomness::from(r.value()),
    )
    .0
    .into_owned();
    Ok((c, r))
}

/// Homomorphic addition of plaintexts, $`c_1 \cdot c_2 \bmod n^2`$
pub fn add(ek: &EncryptionKey, c1: &BigInt, c2: &BigInt) -> BigInt {
    Paillier::add(ek, RawCiphertext::from(c1), RawCiphertext::from(c2))
        .0
        .into_owned()
}

/// Homomorphic multiplication of the plaintext by public $`k`$, $`c^k \bmod n^2`$
pub fn mult(ek: &EncryptionKey, c: &BigInt, k: &BigInt) -> BigInt {
    Paillier::mul(ek, RawCiphertext::from(c), RawPlaintext::from(k))
        .0
        .into_owned()
}

/// Checks that the ciphertext belongs to $`Z^{*}_{n^2}`$
pub fn validate_ciphertext(ek: &EncryptionKey, c: &BigInt) -> Result<(), Error> {
    if is_in_multiplicative_group(c, &ek.nn) {
        Ok(())
    } else {
        Err(Error::malformed("ciphertext is not in Z*_{n^2}"))
    }
}

/// Private key in the form selected by [`DecryptionMode`]
#[derive(Clone)]
enum PreparedKey {
    Totient(TotientDecryptionKey),
    Crt(CrtDecryptionKey),
}

impl PreparedKey {
    fn new(dk: &DecryptionKey, mode: DecryptionMode) -> Result<Self, Error> {
        Ok(match mode {
            DecryptionMode::Totient => PreparedKey::Totient(TotientDecryptionKey::new(dk)?),
            DecryptionMode::Crt => PreparedKey::Crt(CrtDecryptionKey::new(dk)?),
        })
    }
}

impl PaillierDecryption for PreparedKey {
    fn decrypt_raw(&self, c: &BigInt) -> BigInt {
        match self {
            PreparedKey::Totient(key) => key.decrypt_raw(c),
            PreparedKey::Crt(key) => key.decrypt_raw(c),
        }
    }
}

impl Zeroize for PreparedKey {
    fn zeroize(&mut self) {
        match self {
            PreparedKey::Totient(key) => key.zeroize(),
            PreparedKey::Crt(key) => key.zeroize(),
        }
    }
}

/// Public/private key pair for additive homomorphic encryption schema
///
/// The private key is prepared for decryption once, at construction or, for deserialized keys, at the first decryption.
#[derive(Clone, Serialize, Deserialize)]
pub struct PaillierKeys {
    pub dk: DecryptionKey,
    pub ek: EncryptionKey,
    #[serde(default)]
    pub mode: DecryptionMode,
    #[serde(skip)]
    prepared: OnceLock<PreparedKey>,
}

impl PartialEq for PaillierKeys {
    fn eq(&self, other: &Self) -> bool {
        self.dk == other.dk && self.ek == other.ek && self.mode == other.mode
    }
}

impl Zeroize for PaillierKeys {
    fn zeroize(&mut self) {
        self.dk.p.zeroize_bn();
        self.dk.q.zeroize_bn();
        self.ek.n.zeroize_bn();
        self.ek.nn.zeroize_bn();
        if let Some(mut key) = self.prepared.take() {
            key.zeroize();
        }
    }
}

impl Drop for PaillierKeys {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PaillierKeys {
    /// produces new Paillier key pair with primes of given bit length
    pub fn random(prime_bit_length: usize, mode: DecryptionMode) -> Self {
        let (ek, dk) = Paillier::keypair_with_modulus_size(2 * prime_bit_length).keys();
        Self::new(ek, dk, mode)
    }

    /// Key pair with the private key prepared for decryption in `mode`
    ///
    /// An inconsistent private key is reported by the first call of [`decrypt`](#method.decrypt).
    pub fn new(ek: EncryptionKey, dk: DecryptionKey, mode: DecryptionMode) -> Self {
        let prepared = OnceLock::new();
        if let Ok(key) = PreparedKey::new(&dk, mode) {
            let _ = prepared.set(key);
        }
        Self {
            dk,
            ek,
            mode,
            prepared,
        }
    }

    fn decryption_key(&self) -> Result<&PreparedKey, Error> {
        if let Some(key) = self.prepared.get() {
            return Ok(key);
        }
        let key = PreparedKey::new(&self.dk, self.mode)?;
        Ok(self.prepared.get_or_init(|| key))
    }

    /// decrypts given value `c`
    pub fn decrypt(&self, c: &BigInt) -> Result<BigInt, Error> {
        validate_ciphertext(&self.ek, c)?;
        Ok(self.decryption_key()?.decrypt_raw(c))
    }

    /// checks whether Paillier's setup is valid and consistent
    pub fn is_valid(ek: &EncryptionKey, dk: &DecryptionKey) -> bool {
        dk.p != dk.q
            && is_prime(&dk.p, MIN_MILLER_RABIN_ROUNDS)
            && is_prime(&dk.q, MIN_MILLER_RABIN_ROUNDS)
            && ek.n == &dk.p * &dk.q
            && ek.nn == ek.n.pow(2)
    }
}

impl Display for PaillierKeys {
    /// hides private key of the schema
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierKeys")
            .field("dk", &"[***]".to_owned())
            .field("ek", &self.ek)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Debug for PaillierKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use curv::arithmetic::traits::Samplable;
    use paillier::Decrypt;
    use strum::IntoEnumIterator;

    const TEST_PRIME_BITS: usize = 512;

    #[test]
    fn homomorphic_properties_hold_in_both_modes() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        for mode in DecryptionMode::iter() {
            let keys = PaillierKeys::random(TEST_PRIME_BITS, mode);
            let n = &keys.ek.n;
            for _ in 0..5 {
                let m1 = BigInt::sample_below(n);
                let m2 = BigInt::sample_below(n);
                let (c1, _) = encrypt(&keys.ek, &m1, None)?;
                let (c2, _) = encrypt(&keys.ek, &m2, None)?;

                assert_eq!(keys.decrypt(&c1)?, m1, "mode {}", mode);
                assert_eq!(
                    keys.decrypt(&add(&keys.ek, &c1, &c2))?,
                    (&m1 + &m2).mod_floor(n)
                );
                assert_eq!(
                    keys.decrypt(&mult(&keys.ek, &c1, &m2))?,
                    (&m1 * &m2).mod_floor(n)
                );
            }
        }
        Ok(())
    }

    #[test]
    fn decryption_modes_agree() -> anyhow::Result<()> {
        let keys = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Totient);
        let totient = TotientDecryptionKey::new(&keys.dk)?;
        let crt = CrtDecryptionKey::new(&keys.dk)?;
        for _ in 0..10 {
            // any element of Z*_{n^2} is a valid ciphertext
            let c = BigInt::from_modulo(&keys.ek.nn);
            let expected = Paillier::decrypt(&keys.dk, RawCiphertext::from(&c))
                .0
                .into_owned();
            assert_eq!(totient.decrypt_raw(&c), expected);
            assert_eq!(crt.decrypt_raw(&c), expected);
        }
        Ok(())
    }

    #[test]
    fn fixed_randomness_is_reproducible() -> anyhow::Result<()> {
        let keys = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Crt);
        let m = BigInt::from(42);
        let r = BigInt::from_modulo(&keys.ek.n);
        let (c1, _) = encrypt(&keys.ek, &m, Some(EncryptionRandomness::fixed(r.clone())))?;
        let (c2, _) = encrypt(&keys.ek, &m, Some(EncryptionRandomness::fixed(r)))?;
        assert_eq!(c1, c2);
        let (c3, _) = encrypt(&keys.ek, &m, None)?;
        assert_ne!(c1, c3);
        Ok(())
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let keys = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Crt);
        let ek = &keys.ek;
        assert_eq!(
            encrypt(ek, &ek.n, None).unwrap_err().kind(),
            ErrorKind::MalformedInput
        );
        assert!(encrypt(ek, &BigInt::from(-1), None).is_err());
        assert!(encrypt(
            ek,
            &BigInt::one(),
            Some(EncryptionRandomness::fixed(keys.dk.p.clone()))
        )
        .is_err());

        for c in &[BigInt::zero(), ek.nn.clone(), keys.dk.q.clone()] {
            assert_eq!(
                keys.decrypt(c).unwrap_err().kind(),
                ErrorKind::MalformedInput
            );
        }
    }

    #[test]
    fn decryption_key_is_prepared_once() -> anyhow::Result<()> {
        let keys = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Crt);
        let prepared = keys.prepared.get().map(|k| k as *const PreparedKey);
        assert!(prepared.is_some());

        let m = BigInt::from(7);
        let (c, _) = encrypt(&keys.ek, &m, None)?;
        assert_eq!(keys.decrypt(&c)?, m);
        assert_eq!(keys.prepared.get().map(|k| k as *const PreparedKey), prepared);

        // deserialized keys are prepared by the first decryption
        let restored: PaillierKeys = serde_json::from_str(&serde_json::to_string(&keys)?)?;
        assert!(restored.prepared.get().is_none());
        assert_eq!(restored, keys);
        assert_eq!(restored.decrypt(&c)?, m);
        assert!(restored.prepared.get().is_some());
        Ok(())
    }

    #[test]
    fn key_validity() {
        let keys = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Crt);
        assert!(PaillierKeys::is_valid(&keys.ek, &keys.dk));
        let other = PaillierKeys::random(TEST_PRIME_BITS, DecryptionMode::Crt);
        assert!(!PaillierKeys::is_valid(&other.ek, &keys.dk));
    }
}
