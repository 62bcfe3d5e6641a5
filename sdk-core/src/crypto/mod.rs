//! Cryptographic operations for HealthVault requests

pub mod digest;
pub mod sig;

use crate::error::{HealthVaultError, Result};
use base64::Engine as _;
use rand::{CryptoRng, Rng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw bytes in a notification key before base64.
pub const NOTIFICATION_KEY_BYTES: usize = 64;

/// Per-session HMAC key, kept as the decimal string the platform was given.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random<R: RngCore + CryptoRng>(rng: &mut R, buf: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(buf)
        .map_err(|_| HealthVaultError::EntropyUnavailable)
}

/// Draw a fresh shared secret in `[2^64, 2^65 - 1]`, rendered in decimal.
pub fn generate_shared_secret<R: RngCore + CryptoRng>(rng: &mut R) -> SharedSecret {
    let low = 1u128 << 64;
    let high = (1u128 << 65) - 1;
    SharedSecret(rng.gen_range(low..=high).to_string())
}

/// Generate the base64 key the platform uses to authenticate event callbacks.
pub fn generate_notification_key<R: RngCore + CryptoRng>(rng: &mut R) -> Result<String> {
    let mut raw = [0u8; NOTIFICATION_KEY_BYTES];
    secure_random(rng, &mut raw)?;
    let key = base64::engine::general_purpose::STANDARD.encode(raw);
    raw.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shared_secret_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let secret = generate_shared_secret(&mut rng);
            let value: u128 = secret.expose().parse().unwrap();
            assert!(value >= 1u128 << 64);
            assert!(value < 1u128 << 65);
        }
    }

    #[test]
    fn test_shared_secret_is_deterministic_for_seeded_rng() {
        let a = generate_shared_secret(&mut StdRng::seed_from_u64(42));
        let b = generate_shared_secret(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_secret_debug_is_redacted() {
        let secret = SharedSecret::new("18446744073709551617");
        assert_eq!(format!("{secret:?}"), "SharedSecret(..)");
    }

    #[test]
    fn test_notification_key_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let key = generate_notification_key(&mut rng).unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(&key)
            .unwrap();
        assert_eq!(raw.len(), NOTIFICATION_KEY_BYTES);
        assert_ne!(key, generate_notification_key(&mut rng).unwrap());
    }
}
