//! High-level envelope operations

use crate::{
    config::HealthVaultConfig,
    credential::ApplicationCredential,
    crypto::SharedSecret,
    envelope::{msg_time_now, RequestEnvelope, CLIENT_VERSION, MSG_TIME_FORMAT, REQUEST_NAMESPACE},
    error::Result,
    xml::escape,
};
use base64::Engine as _;
use chrono::NaiveDateTime;
use uuid::Uuid;

pub const AUTHENTICATE_METHOD: &str = "CreateAuthenticatedSessionToken";
pub const AUTHENTICATE_METHOD_VERSION: u32 = 1;

/// Authentication request stamped with the current time
pub fn build_authentication_request(
    credential: &ApplicationCredential,
    shared_secret: &SharedSecret,
    config: &HealthVaultConfig,
) -> Result<String> {
    EnvelopeOps::authentication_request(credential, shared_secret, config, msg_time_now())
}

/// Envelope operations
pub struct EnvelopeOps;

impl EnvelopeOps {
    /// `<content>` block announcing the shared secret; this is what the
    /// application key signs
    pub fn authentication_content(app_id: Uuid, shared_secret: &SharedSecret) -> String {
        let secret_b64 = base64::engine::general_purpose::STANDARD.encode(shared_secret.as_bytes());
        format!(
            "<content><app-id>{app_id}</app-id><shared-secret>\
             <hmac-alg algName=\"HMACSHA1\">{secret_b64}</hmac-alg>\
             </shared-secret></content>"
        )
    }

    /// Unsigned `CreateAuthenticatedSessionToken` request carrying the
    /// RSA-signed content block
    pub fn authentication_request(
        credential: &ApplicationCredential,
        shared_secret: &SharedSecret,
        config: &HealthVaultConfig,
        msg_time: NaiveDateTime,
    ) -> Result<String> {
        let app_id = credential.application_id();

        // Sign the content block
        let content = Self::authentication_content(app_id, shared_secret);
        let signature = credential.sign(content.as_bytes())?;

        let header = format!(
            "<header><method>{AUTHENTICATE_METHOD}</method>\
             <method-version>{AUTHENTICATE_METHOD_VERSION}</method-version>\
             <app-id>{app_id}</app-id>\
             <language>{language}</language><country>{country}</country>\
             <msg-time>{time}</msg-time><msg-ttl>{ttl}</msg-ttl>\
             <version>{CLIENT_VERSION}</version></header>",
            language = escape(&config.language),
            country = escape(&config.country),
            time = msg_time.format(MSG_TIME_FORMAT),
            ttl = config.msg_ttl,
        );

        let info = format!(
            "<info><auth-info><app-id>{app_id}</app-id><credential><appserver>\
             <sig digestMethod=\"SHA1\" sigMethod=\"RSA-SHA1\" thumbprint=\"{thumbprint}\">{signature}</sig>\
             {content}</appserver></credential></auth-info></info>",
            thumbprint = escape(credential.thumbprint()),
        );

        Ok(format!(
            "<wc-request:request xmlns:wc-request=\"{REQUEST_NAMESPACE}\">{header}{info}</wc-request:request>"
        ))
    }

    /// Sign a method envelope with the session secret
    pub fn sign_request(
        envelope: &RequestEnvelope,
        shared_secret: &SharedSecret,
    ) -> Result<String> {
        envelope.to_xml(shared_secret)
    }
}
