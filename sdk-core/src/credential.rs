//! Application identity used to open sessions

use crate::crypto::sig::AppKeyPair;
use crate::error::{HealthVaultError, Result};
use uuid::Uuid;

/// Identity of the calling application, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationCredential {
    application_id: Uuid,
    thumbprint: String,
    keys: AppKeyPair,
}

impl ApplicationCredential {
    /// `thumbprint` is the certificate thumbprint shown in the application
    /// configuration center: 40 hex digits.
    pub fn new(application_id: Uuid, thumbprint: &str, keys: AppKeyPair) -> Result<Self> {
        let thumbprint = thumbprint.trim();
        let decoded = hex::decode(thumbprint)
            .map_err(|e| HealthVaultError::Config(format!("thumbprint is not hex: {e}")))?;
        if decoded.len() != 20 {
            return Err(HealthVaultError::Config(format!(
                "thumbprint must be 40 hex digits, got {}",
                thumbprint.len()
            )));
        }

        Ok(Self {
            application_id,
            thumbprint: thumbprint.to_string(),
            keys,
        })
    }

    pub fn application_id(&self) -> Uuid {
        self.application_id
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn keys(&self) -> &AppKeyPair {
        &self.keys
    }

    /// Base64 RSA signature over `data`
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        self.keys.sign(data)
    }
}
