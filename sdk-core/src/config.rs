//! Connection configuration

use crate::credential::ApplicationCredential;
use crate::crypto::sig::AppKeyPair;
use crate::envelope::{DEFAULT_COUNTRY, DEFAULT_LANGUAGE, DEFAULT_MSG_TTL};
use crate::error::{HealthVaultError, Result};
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_SERVICE_SERVER: &str = "platform.healthvault-ppe.com";
pub const DEFAULT_SHELL_SERVER: &str = "account.healthvault-ppe.com";
pub const DEFAULT_REQUEST_PATH: &str = "/platform/wildcat.ashx";

/// Server settings plus the raw application credential fields
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct HealthVaultConfig {
    pub app_id: String,
    pub app_thumbprint: String,
    pub public_key: String,
    pub private_key: String,
    pub service_server: String,
    pub shell_server: String,
    pub request_path: String,
    pub language: String,
    pub country: String,
    pub msg_ttl: u32,
}

impl Default for HealthVaultConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_thumbprint: String::new(),
            public_key: String::new(),
            private_key: String::new(),
            service_server: DEFAULT_SERVICE_SERVER.to_string(),
            shell_server: DEFAULT_SHELL_SERVER.to_string(),
            request_path: DEFAULT_REQUEST_PATH.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            msg_ttl: DEFAULT_MSG_TTL,
        }
    }
}

impl fmt::Debug for HealthVaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthVaultConfig")
            .field("app_id", &self.app_id)
            .field("app_thumbprint", &self.app_thumbprint)
            .field("service_server", &self.service_server)
            .field("shell_server", &self.shell_server)
            .field("request_path", &self.request_path)
            .field("language", &self.language)
            .field("country", &self.country)
            .field("msg_ttl", &self.msg_ttl)
            .finish_non_exhaustive()
    }
}

impl HealthVaultConfig {
    /// Load from `HV_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HealthVaultError::Config(e.to_string()))
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            app_id: lookup("HV_APPID").unwrap_or(defaults.app_id),
            app_thumbprint: lookup("HV_APP_THUMBPRINT").unwrap_or(defaults.app_thumbprint),
            public_key: lookup("HV_PUBLIC_KEY").unwrap_or(defaults.public_key),
            private_key: lookup("HV_PRIVATE_KEY").unwrap_or(defaults.private_key),
            service_server: lookup("HV_SERVICE_SERVER").unwrap_or(defaults.service_server),
            shell_server: lookup("HV_SHELL_SERVER").unwrap_or(defaults.shell_server),
            ..defaults
        }
    }

    /// Full HTTPS endpoint for method calls
    pub fn endpoint(&self) -> String {
        format!("https://{}{}", self.service_server, self.request_path)
    }

    pub fn application_id(&self) -> Result<Uuid> {
        Uuid::parse_str(self.app_id.trim())
            .map_err(|e| HealthVaultError::Config(format!("application id: {e}")))
    }

    /// Validate the credential fields and build an [`ApplicationCredential`]
    pub fn credential(&self) -> Result<ApplicationCredential> {
        let keys = AppKeyPair::from_hex(&self.public_key, &self.private_key)?;
        ApplicationCredential::new(self.application_id()?, &self.app_thumbprint, keys)
    }
}
