//! Canonical field-element encoding shared by prover and verifier.
//!
//! Every public value of the auth relation travels as a 32-byte big-endian
//! integer that must be strictly less than the BN254 scalar field modulus.
//! Non-canonical encodings are rejected rather than reduced, so a value has
//! exactly one wire representation.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, UniformRand};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

use super::error::{ZkError, ZkResult};

/// Width of an encoded field element in bytes.
pub const FIELD_BYTES: usize = 32;

/// Longest device id accepted, in UTF-8 bytes.
///
/// 31 bytes is below 2^248, which is always smaller than the field modulus,
/// so an accepted id can never wrap.
pub const MAX_DEVICE_ID_LEN: usize = FIELD_BYTES - 1;

/// A canonical field element in 32-byte big-endian form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Zeroize)]
pub struct FieldBytes([u8; FIELD_BYTES]);

impl FieldBytes {
    /// Wrap raw bytes without checking canonicity.
    pub const fn from_bytes_unchecked(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Wrap raw bytes, rejecting values that are not below the modulus.
    pub fn from_bytes(bytes: [u8; FIELD_BYTES]) -> ZkResult<Self> {
        let candidate = Self(bytes);
        candidate.to_field()?;
        Ok(candidate)
    }

    /// Encode a field element.
    pub fn from_field(value: &Fr) -> Self {
        let raw = value.into_bigint().to_bytes_be();
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - raw.len()..].copy_from_slice(&raw);
        Self(out)
    }

    /// Decode a hex string of exactly 64 characters.
    pub fn from_hex(encoded: &str) -> ZkResult<Self> {
        let decoded = hex::decode(encoded.trim())
            .map_err(|e| ZkError::InvalidEncoding(format!("invalid hex: {}", e)))?;
        let bytes: [u8; FIELD_BYTES] = decoded.as_slice().try_into().map_err(|_| {
            ZkError::InvalidEncoding(format!(
                "expected {} bytes, got {}",
                FIELD_BYTES,
                decoded.len()
            ))
        })?;
        Self::from_bytes(bytes)
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Decode into a field element, rejecting values at or above the modulus.
    pub fn to_field(&self) -> ZkResult<Fr> {
        let value = Fr::from_be_bytes_mod_order(&self.0);
        if Self::from_field(&value).0 != self.0 {
            return Err(ZkError::InvalidEncoding(
                "value is not a canonical field element".to_string(),
            ));
        }
        Ok(value)
    }

    /// Draw a uniformly random field element.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_field(&Fr::rand(rng))
    }
}

impl fmt::Debug for FieldBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldBytes({})", self.to_hex())
    }
}

impl fmt::Display for FieldBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for FieldBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Pack a human-readable device id into its field encoding.
///
/// The UTF-8 bytes are interpreted as a big-endian integer and left-padded
/// with zeros to 32 bytes. Ids that are empty or longer than
/// [`MAX_DEVICE_ID_LEN`] bytes are rejected instead of truncated.
pub fn encode_device_id(device_id: &str) -> ZkResult<FieldBytes> {
    let raw = device_id.as_bytes();
    if raw.is_empty() {
        return Err(ZkError::EmptyDeviceId);
    }
    if raw.len() > MAX_DEVICE_ID_LEN {
        return Err(ZkError::DeviceIdTooLong {
            len: raw.len(),
            max: MAX_DEVICE_ID_LEN,
        });
    }
    let mut out = [0u8; FIELD_BYTES];
    out[FIELD_BYTES - raw.len()..].copy_from_slice(raw);
    Ok(FieldBytes(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{Field, One, Zero};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_encode_device_id_left_pads() {
        let encoded = encode_device_id("SENSOR-01").unwrap();
        let bytes = encoded.as_bytes();
        assert!(bytes[..FIELD_BYTES - 9].iter().all(|b| *b == 0));
        assert_eq!(&bytes[FIELD_BYTES - 9..], b"SENSOR-01");
        assert_eq!(
            encoded.to_hex(),
            format!("{}{}", "00".repeat(23), hex::encode("SENSOR-01"))
        );
    }

    #[test]
    fn test_encode_device_id_is_canonical() {
        let encoded = encode_device_id(&"~".repeat(MAX_DEVICE_ID_LEN)).unwrap();
        assert!(encoded.to_field().is_ok());
    }

    #[test]
    fn test_encode_device_id_rejects_over_length() {
        let result = encode_device_id(&"A".repeat(MAX_DEVICE_ID_LEN + 1));
        assert_eq!(
            result,
            Err(ZkError::DeviceIdTooLong {
                len: MAX_DEVICE_ID_LEN + 1,
                max: MAX_DEVICE_ID_LEN
            })
        );
    }

    #[test]
    fn test_encode_device_id_rejects_empty() {
        assert_eq!(encode_device_id(""), Err(ZkError::EmptyDeviceId));
    }

    #[test]
    fn test_field_roundtrip_small_values() {
        let one = FieldBytes::from_field(&Fr::one());
        let mut expected = [0u8; FIELD_BYTES];
        expected[FIELD_BYTES - 1] = 1;
        assert_eq!(one.as_bytes(), &expected);
        assert_eq!(one.to_field().unwrap(), Fr::one());

        let zero = FieldBytes::from_field(&Fr::zero());
        assert_eq!(zero.as_bytes(), &[0u8; FIELD_BYTES]);
    }

    #[test]
    fn test_modulus_rejected() {
        let modulus = Fr::MODULUS.to_bytes_be();
        let bytes: [u8; FIELD_BYTES] = modulus.as_slice().try_into().unwrap();
        assert!(matches!(
            FieldBytes::from_bytes(bytes),
            Err(ZkError::InvalidEncoding(_))
        ));
        assert!(FieldBytes::from_bytes([0xff; FIELD_BYTES]).is_err());
    }

    #[test]
    fn test_largest_element_accepted() {
        let max = -Fr::one();
        let encoded = FieldBytes::from_field(&max);
        assert_eq!(FieldBytes::from_bytes(*encoded.as_bytes()).unwrap(), encoded);
        assert_eq!(encoded.to_field().unwrap().square(), Fr::one());
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(FieldBytes::from_hex("abcd").is_err());
        assert!(FieldBytes::from_hex(&"00".repeat(33)).is_err());
        assert!(FieldBytes::from_hex("zz").is_err());
    }

    #[test]
    fn test_random_is_canonical() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let value = FieldBytes::random(&mut rng);
            let reparsed = FieldBytes::from_hex(&value.to_hex()).unwrap();
            assert_eq!(reparsed, value);
        }
    }

    #[test]
    fn test_serde_as_hex_string() {
        let encoded = encode_device_id("CO2-7").unwrap();
        let json = serde_json::to_string(&encoded).unwrap();
        assert_eq!(json, format!("\"{}\"", encoded.to_hex()));

        let back: FieldBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoded);

        let invalid = format!("\"{}\"", "ff".repeat(FIELD_BYTES));
        assert!(serde_json::from_str::<FieldBytes>(&invalid).is_err());
    }
}
