//! SHA-1 digests and HMAC-SHA1 used in request headers

use crate::error::{HealthVaultError, Result};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

type HmacSha1 = Hmac<Sha1>;

/// Raw SHA-1 digest
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// base64(SHA-1(data)), as embedded in `<info-hash>`
pub fn sha1_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(sha1(data))
}

/// base64(HMAC-SHA1(key, data)), as embedded in `<auth>`
pub fn hmac_sha1_base64(key: &[u8], data: &[u8]) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| HealthVaultError::Signing(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(
            sha1(b"abc"),
            hex!("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
    }

    #[test]
    fn test_sha1_base64_of_empty_info() {
        assert_eq!(sha1_base64(b"<info/>"), sha1_base64(b"<info/>"));
        assert_ne!(sha1_base64(b"<info/>"), sha1_base64(b"<info />"));
    }

    #[test]
    fn test_hmac_rfc2202_case_2() {
        let mac = hmac_sha1_base64(b"Jefe", b"what do ya want for nothing?").unwrap();
        let expected = base64::engine::general_purpose::STANDARD
            .encode(hex!("effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"));
        assert_eq!(mac, expected);
    }
}
