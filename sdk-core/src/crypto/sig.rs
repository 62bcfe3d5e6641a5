//! RSA PKCS#1 v1.5 signatures over SHA-1, used to prove application identity
//!
//! The key pair arrives as two bare integers (modulus and private exponent),
//! so the signature is computed directly: pad the DigestInfo into a block as
//! wide as the modulus, then raise it to the private exponent.

use super::digest;
use crate::error::{HealthVaultError, Result};
use base64::Engine as _;
use rsa::BigUint;
use std::fmt;

/// DER prefix of a DigestInfo carrying a SHA-1 hash
pub const SHA1_DIGEST_INFO_PREFIX: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

/// Public exponent of application certificates
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Minimum run of 0xFF bytes required by block type 1
const MIN_PADDING_LEN: usize = 8;

/// Application signing key: modulus and private exponent.
#[derive(Clone, PartialEq, Eq)]
pub struct AppKeyPair {
    modulus: BigUint,
    private_exponent: BigUint,
}

impl AppKeyPair {
    pub fn new(modulus: BigUint, private_exponent: BigUint) -> Result<Self> {
        if modulus.bits() == 0 {
            return Err(HealthVaultError::Config("RSA modulus is zero".into()));
        }
        if private_exponent >= modulus {
            return Err(HealthVaultError::Config(
                "RSA private exponent is not smaller than the modulus".into(),
            ));
        }
        Ok(Self {
            modulus,
            private_exponent,
        })
    }

    /// Build from hexadecimal public (modulus) and private exponent strings
    pub fn from_hex(public_key: &str, private_key: &str) -> Result<Self> {
        Self::new(
            parse_hex_integer(public_key)?,
            parse_hex_integer(private_key)?,
        )
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Signature block length in bytes; 256 for a 2048-bit modulus
    pub fn block_len(&self) -> usize {
        (self.modulus.bits() + 7) / 8
    }

    /// Sign `data` and return the base64 signature
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        let block_len = self.block_len();
        let encoded = pkcs1_v15_pad(&digest::sha1(data), block_len)?;

        let message = os2ip(&encoded);
        if message >= self.modulus {
            return Err(HealthVaultError::Signing(
                "padded block is not smaller than the modulus".into(),
            ));
        }

        let signature = message.modpow(&self.private_exponent, &self.modulus);
        let bytes = i2osp(&signature, block_len)?;

        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

impl fmt::Debug for AppKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppKeyPair")
            .field("modulus_bits", &self.modulus.bits())
            .finish_non_exhaustive()
    }
}

/// Parse a hexadecimal integer, tolerating a `0x` prefix and embedded whitespace
pub fn parse_hex_integer(text: &str) -> Result<BigUint> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);

    if digits.is_empty() {
        return Err(HealthVaultError::Config("empty key integer".into()));
    }

    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| HealthVaultError::Config("key integer is not valid hexadecimal".into()))
}

/// EMSA-PKCS1-v1_5 encoding of a SHA-1 digest into an `em_len`-byte block
pub fn pkcs1_v15_pad(digest: &[u8], em_len: usize) -> Result<Vec<u8>> {
    let t_len = SHA1_DIGEST_INFO_PREFIX.len() + digest.len();
    if em_len < t_len + MIN_PADDING_LEN + 3 {
        return Err(HealthVaultError::Signing(format!(
            "{t_len}-byte digest info does not fit a {em_len}-byte block"
        )));
    }

    let mut em = Vec::with_capacity(em_len);
    em.extend_from_slice(&[0x00, 0x01]);
    em.resize(em_len - t_len - 1, 0xff);
    em.push(0x00);
    em.extend_from_slice(&SHA1_DIGEST_INFO_PREFIX);
    em.extend_from_slice(digest);

    Ok(em)
}

/// Integer to big-endian octet string of exactly `len` bytes
pub fn i2osp(value: &BigUint, len: usize) -> Result<Vec<u8>> {
    let bytes = value.to_bytes_be();
    let bytes: &[u8] = if value.bits() == 0 { &[] } else { &bytes };

    if bytes.len() > len {
        return Err(HealthVaultError::Signing(format!(
            "integer too large to encode in {len} octets"
        )));
    }

    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Big-endian octet string to integer
pub fn os2ip(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}
