//! Party identities and message envelopes exchanged by the state machines

#![allow(clippy::large_enum_variant)]
use anyhow::bail;
use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Width of a party index in bytes
pub const PARTY_INDEX_BYTES: usize = 32;

/// Index of a party in the multiparty computation
///
/// The binding of an index to a network address is defined outside of the crate.
/// 32 bytes fit a compressed coordinate of a public key, so that a party can be identified by its long term key.
/// Bytes are stored little-endian: the textual form is the reversed hex string, and indices compare as 256-bit numbers.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Default)]
pub struct PartyIndex(pub [u8; PARTY_INDEX_BYTES]);

impl PartyIndex {
    pub fn from_slice(slice: &[u8]) -> anyhow::Result<Self> {
        if slice.len() != PARTY_INDEX_BYTES {
            bail!(
                "party index has to be {} bytes long, got {}",
                PARTY_INDEX_BYTES,
                slice.len()
            );
        }
        let mut result = [0u8; PARTY_INDEX_BYTES];
        result.copy_from_slice(slice);
        Ok(PartyIndex(result))
    }

    /// Bytes bound into the Fiat-Shamir challenges of proofs made by this party
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn to_hex(&self) -> String {
        self.0.iter().rev().map(|b| format!("{:02X}", b)).collect()
    }
}

impl Display for PartyIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for PartyIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<usize> for PartyIndex {
    fn from(x: usize) -> Self {
        let mut result = [0u8; PARTY_INDEX_BYTES];
        let bytes = x.to_le_bytes();
        result[..bytes.len()].copy_from_slice(&bytes);
        PartyIndex(result)
    }
}

impl Ord for PartyIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for PartyIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for PartyIndex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for PartyIndex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        struct HexVisitor;

        impl<'a> Visitor<'a> for HexVisitor {
            type Value = PartyIndex;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                write!(formatter, "{} bytes in hex notation", PARTY_INDEX_BYTES)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let mut bytes = hex::decode(v).map_err(|e| E::custom(e.to_string()))?;
                if bytes.len() != PARTY_INDEX_BYTES {
                    return Err(E::invalid_length(bytes.len(), &self));
                }
                bytes.reverse();
                PartyIndex::from_slice(&bytes).map_err(|e| E::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

/// Destination of an outgoing message
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum Address {
    Peer(PartyIndex),
    Broadcast,
}

/// Message received from the party `sender`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputMessage<BodyType> {
    pub sender: PartyIndex,
    pub body: BodyType,
}

/// Message to be delivered to `recipient` by the transport
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputMessage<BodyType> {
    pub recipient: Address,
    pub body: BodyType,
}
