//! Signed request envelope
//!
//! Every method call after authentication is wrapped as
//! `<request><auth/><header/><info/></request>`: the header embeds
//! base64(SHA-1(info)) and the auth block is HMAC-SHA1 over the exact header
//! string, keyed with the session's shared secret.

pub mod operations;

use crate::crypto::{digest, SharedSecret};
use crate::error::Result;
use crate::xml::escape;
use chrono::NaiveDateTime;

pub const REQUEST_NAMESPACE: &str = "urn:com.microsoft.wc.request";

/// Client version reported in every header
pub const CLIENT_VERSION: &str = "0.0.0.1";

/// Message time-to-live in seconds; a hint to the platform, not a client timeout
pub const DEFAULT_MSG_TTL: u32 = 36000;

/// `CCYY-MM-DDThh:mm:ss`
pub const MSG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_COUNTRY: &str = "US";

/// Current UTC time for `msg-time`; sub-second precision is dropped when formatted
pub fn msg_time_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Wrap a method payload in `<info>`
pub fn info_xml(body: &str) -> String {
    if body.is_empty() {
        "<info/>".to_string()
    } else {
        format!("<info>{body}</info>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub method: String,
    pub method_version: u32,
    pub target_person_id: Option<String>,
    pub record_id: Option<String>,
    pub auth_token: String,
    pub user_auth_token: Option<String>,
    pub language: String,
    pub country: String,
    pub msg_time: NaiveDateTime,
    pub msg_ttl: u32,
    /// Complete `<info>` fragment, sent and hashed byte for byte
    pub info: String,
}

impl RequestEnvelope {
    pub fn new(method: &str, method_version: u32, auth_token: &str, info: String) -> Self {
        Self {
            method: method.to_string(),
            method_version,
            target_person_id: None,
            record_id: None,
            auth_token: auth_token.to_string(),
            user_auth_token: None,
            language: DEFAULT_LANGUAGE.into(),
            country: DEFAULT_COUNTRY.into(),
            msg_time: msg_time_now(),
            msg_ttl: DEFAULT_MSG_TTL,
            info,
        }
    }

    pub fn with_target_person_id(mut self, person_id: &str) -> Self {
        self.target_person_id = Some(person_id.to_string());
        self
    }

    pub fn with_record_id(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn with_user_auth_token(mut self, token: &str) -> Self {
        self.user_auth_token = Some(token.to_string());
        self
    }

    pub fn with_locale(mut self, language: &str, country: &str) -> Self {
        self.language = language.to_string();
        self.country = country.to_string();
        self
    }

    pub fn with_msg_ttl(mut self, ttl: u32) -> Self {
        self.msg_ttl = ttl;
        self
    }

    /// Pin the message time, for reproducible envelopes
    pub fn with_msg_time(mut self, msg_time: NaiveDateTime) -> Self {
        self.msg_time = msg_time;
        self
    }

    /// base64(SHA-1(info))
    pub fn info_hash(&self) -> String {
        digest::sha1_base64(self.info.as_bytes())
    }

    /// Header exactly as it is HMAC'd and sent
    pub fn header_xml(&self) -> String {
        let mut header = String::with_capacity(512);
        header.push_str("<header>");
        header.push_str(&format!("<method>{}</method>", escape(&self.method)));
        header.push_str(&format!(
            "<method-version>{}</method-version>",
            self.method_version
        ));
        if let Some(person_id) = &self.target_person_id {
            header.push_str(&format!(
                "<target-person-id>{}</target-person-id>",
                escape(person_id)
            ));
        }
        if let Some(record_id) = &self.record_id {
            header.push_str(&format!("<record-id>{}</record-id>", escape(record_id)));
        }

        header.push_str("<auth-session>");
        header.push_str(&format!(
            "<auth-token>{}</auth-token>",
            escape(&self.auth_token)
        ));
        if let Some(user_token) = &self.user_auth_token {
            header.push_str(&format!(
                "<user-auth-token>{}</user-auth-token>",
                escape(user_token)
            ));
        }
        header.push_str("</auth-session>");

        header.push_str(&format!("<language>{}</language>", escape(&self.language)));
        header.push_str(&format!("<country>{}</country>", escape(&self.country)));
        header.push_str(&format!(
            "<msg-time>{}</msg-time>",
            self.msg_time.format(MSG_TIME_FORMAT)
        ));
        header.push_str(&format!("<msg-ttl>{}</msg-ttl>", self.msg_ttl));
        header.push_str(&format!("<version>{CLIENT_VERSION}</version>"));
        header.push_str(&format!(
            "<info-hash><hash-data algName=\"SHA1\">{}</hash-data></info-hash>",
            self.info_hash()
        ));
        header.push_str("</header>");
        header
    }

    /// Complete signed request body
    pub fn to_xml(&self, shared_secret: &SharedSecret) -> Result<String> {
        let header = self.header_xml();
        let header_mac = digest::hmac_sha1_base64(shared_secret.as_bytes(), header.as_bytes())?;

        Ok(format!(
            "<wc-request:request xmlns:wc-request=\"{REQUEST_NAMESPACE}\">\
             <auth><hmac-data algName=\"HMACSHA1\">{header_mac}</hmac-data></auth>\
             {header}{info}</wc-request:request>",
            info = self.info
        ))
    }
}
