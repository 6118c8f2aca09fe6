//! Canonical fixed-width encodings of the values exchanged by parties
//!
//! All integers are big-endian and left-padded with zeros to the width of their modulus.
//! Decoders reject input of a wrong width or out of range before any cryptographic operation.
use crate::algorithms::{is_in_multiplicative_group, to_scalar};
use crate::error::Error;
use curv::arithmetic::traits::Converter;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE, PK};
use paillier::EncryptionKey;

/// Width of an encoded scalar
pub const SCALAR_BYTES: usize = 32;
/// Width of a compressed point
pub const COMPRESSED_POINT_BYTES: usize = 33;
/// Width of an uncompressed point
pub const UNCOMPRESSED_POINT_BYTES: usize = 65;

fn byte_length(modulus: &BigInt) -> usize {
    (modulus.bit_length() + 7) / 8
}

/// left pads the big-endian representation of `x` up to `width` bytes
fn to_fixed_width(x: &BigInt, width: usize) -> Result<Vec<u8>, Error> {
    let bytes = if x.is_zero() { vec![] } else { BigInt::to_vec(x) };
    if bytes.len() > width {
        return Err(Error::malformed(format!(
            "value needs {} bytes, expected at most {}",
            bytes.len(),
            width
        )));
    }
    let mut result = vec![0u8; width - bytes.len()];
    result.extend_from_slice(&bytes);
    Ok(result)
}

fn from_fixed_width(bytes: &[u8], width: usize) -> Result<BigInt, Error> {
    if bytes.len() != width {
        return Err(Error::malformed(format!(
            "expected {} bytes, got {}",
            width,
            bytes.len()
        )));
    }
    Ok(BigInt::from(bytes))
}

pub fn scalar_to_bytes(x: &FE) -> Vec<u8> {
    let mut result = vec![0u8; SCALAR_BYTES];
    let bytes = BigInt::to_vec(&x.to_big_int());
    if !x.to_big_int().is_zero() {
        result[SCALAR_BYTES - bytes.len()..].copy_from_slice(&bytes);
    }
    result
}

/// Parses a scalar, rejects values which are not reduced modulo the order of the curve
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<FE, Error> {
    let x = from_fixed_width(bytes, SCALAR_BYTES)?;
    if x >= FE::q() {
        return Err(Error::malformed("scalar is not reduced modulo q"));
    }
    Ok(to_scalar(&x))
}

/// Ciphertext as `2 bytes(n)` bytes
pub fn ciphertext_to_bytes(ek: &EncryptionKey, c: &BigInt) -> Result<Vec<u8>, Error> {
    to_fixed_width(c, 2 * byte_length(&ek.n))
}

/// Parses a ciphertext, rejects values outside of $`Z^{*}_{n^2}`$
pub fn ciphertext_from_bytes(ek: &EncryptionKey, bytes: &[u8]) -> Result<BigInt, Error> {
    let c = from_fixed_width(bytes, 2 * byte_length(&ek.n))?;
    if !is_in_multiplicative_group(&c, &ek.nn) {
        return Err(Error::malformed("ciphertext is not in Z*_{n^2}"));
    }
    Ok(c)
}

/// SEC1 encoding of the point, either compressed or uncompressed
pub fn point_to_bytes(point: &GE, compressed: bool) -> Vec<u8> {
    let pk = point.get_element();
    if compressed {
        pk.serialize().to_vec()
    } else {
        pk.serialize_uncompressed().to_vec()
    }
}

/// Parses SEC1 encoding, rejects points which are not on the curve
pub fn point_from_bytes(bytes: &[u8]) -> Result<GE, Error> {
    if bytes.len() != COMPRESSED_POINT_BYTES && bytes.len() != UNCOMPRESSED_POINT_BYTES {
        return Err(Error::malformed(format!(
            "point encoding has {} bytes",
            bytes.len()
        )));
    }
    let pk = PK::from_slice(bytes).map_err(|e| Error::malformed(format!("point: {}", e)))?;
    GE::from_bytes(&pk.serialize_uncompressed()[1..])
        .map_err(|e| Error::malformed(format!("point: {:?}", e)))
}

/// Element of $`Z_N`$ as `bytes(N)` bytes
pub fn modulus_element_to_bytes(modulus: &BigInt, x: &BigInt) -> Result<Vec<u8>, Error> {
    if *x < BigInt::zero() || x >= modulus {
        return Err(Error::malformed("value is not reduced modulo N"));
    }
    to_fixed_width(x, byte_length(modulus))
}

pub fn modulus_element_from_bytes(modulus: &BigInt, bytes: &[u8]) -> Result<BigInt, Error> {
    let x = from_fixed_width(bytes, byte_length(modulus))?;
    if x >= *modulus {
        return Err(Error::malformed("value is not reduced modulo N"));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::paillier::{encrypt, DecryptionMode, PaillierKeys};
    use crate::error::ErrorKind;

    #[test]
    fn scalars() -> anyhow::Result<()> {
        let x = FE::new_random();
        let bytes = scalar_to_bytes(&x);
        assert_eq!(bytes.len(), SCALAR_BYTES);
        assert_eq!(scalar_from_bytes(&bytes)?, x);

        let small = to_scalar(&BigInt::from(7));
        let bytes = scalar_to_bytes(&small);
        assert_eq!(bytes[..31], [0u8; 31]);
        assert_eq!(bytes[31], 7);

        let q_bytes = BigInt::to_vec(&FE::q());
        assert_eq!(
            scalar_from_bytes(&q_bytes).unwrap_err().kind(),
            ErrorKind::MalformedInput
        );
        assert!(scalar_from_bytes(&bytes[1..]).is_err());
        Ok(())
    }

    #[test]
    fn points() -> anyhow::Result<()> {
        let point = GE::generator() * FE::new_random();
        let compressed = point_to_bytes(&point, true);
        let uncompressed = point_to_bytes(&point, false);
        assert_eq!(compressed.len(), COMPRESSED_POINT_BYTES);
        assert_eq!(uncompressed.len(), UNCOMPRESSED_POINT_BYTES);
        assert_eq!(point_from_bytes(&compressed)?, point);
        assert_eq!(point_from_bytes(&uncompressed)?, point);

        let mut not_on_curve = compressed;
        not_on_curve[0] = 0x05;
        assert!(point_from_bytes(&not_on_curve).is_err());
        assert!(point_from_bytes(&uncompressed[..64]).is_err());
        Ok(())
    }

    #[test]
    fn ciphertexts() -> anyhow::Result<()> {
        let keys = PaillierKeys::random(512, DecryptionMode::Crt);
        let (c, _) = encrypt(&keys.ek, &BigInt::from(42), None)?;
        let bytes = ciphertext_to_bytes(&keys.ek, &c)?;
        assert_eq!(bytes.len(), 2 * byte_length(&keys.ek.n));
        assert_eq!(ciphertext_from_bytes(&keys.ek, &bytes)?, c);

        let zero = vec![0u8; bytes.len()];
        assert!(ciphertext_from_bytes(&keys.ek, &zero).is_err());
        Ok(())
    }

    #[test]
    fn modulus_elements() -> anyhow::Result<()> {
        let modulus = BigInt::from(0xFFFF_FFF1u64);
        let bytes = modulus_element_to_bytes(&modulus, &BigInt::from(3))?;
        assert_eq!(bytes, vec![0, 0, 0, 3]);
        assert_eq!(modulus_element_from_bytes(&modulus, &bytes)?, BigInt::from(3));
        assert!(modulus_element_from_bytes(&modulus, &[0xFF; 4]).is_err());
        assert!(modulus_element_to_bytes(&modulus, &modulus).is_err());
        Ok(())
    }
}
