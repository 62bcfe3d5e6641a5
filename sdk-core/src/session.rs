//! Connection and session state machine
//!
//! ```text
//! Unauthenticated --authenticate--> AppSessionEstablished --connect(wctoken)--> Authorized
//!                                          ^                                        |
//!                                          +---- disconnect / token rejected -------+
//! ```
//!
//! The application session (shared secret + auth token) outlives any user
//! binding. The record binding is replaced wholesale on every `connect` and
//! dropped when the platform rejects the user token.

use crate::config::HealthVaultConfig;
use crate::credential::ApplicationCredential;
use crate::crypto::{generate_shared_secret, SharedSecret};
use crate::envelope::operations::{build_authentication_request, EnvelopeOps, AUTHENTICATE_METHOD};
use crate::envelope::{info_xml, RequestEnvelope};
use crate::error::{HealthVaultError, Result};
use crate::events::{
    self, EventSubscription, SubscriptionRequest, EVENT_METHOD_VERSION, GET_SUBSCRIPTIONS_METHOD,
    SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};
use crate::person::{PersonInfo, GET_PERSON_INFO_METHOD, GET_PERSON_INFO_VERSION};
use crate::response::check_response;
use crate::status::codes;
use crate::things::{
    self, BasicDemographics, BloodGlucose, BloodPressure, DataType, Device, Exercise, Height,
    SleepSession, ThingData, ThingQuery, ThingRecord, WeightMeasurement, GET_THINGS_METHOD,
    GET_THINGS_VERSION,
};
use crate::transport::{HttpTransport, Transport};
use crate::urls;
use crate::xml::Element;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Application-level session established by `CreateAuthenticatedSessionToken`
#[derive(Clone, PartialEq, Eq)]
pub struct AppSession {
    shared_secret: SharedSecret,
    auth_token: String,
}

impl AppSession {
    pub fn new(shared_secret: SharedSecret, auth_token: impl Into<String>) -> Self {
        Self {
            shared_secret,
            auth_token: auth_token.into(),
        }
    }

    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl fmt::Debug for AppSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSession").finish_non_exhaustive()
    }
}

/// Record and person resolved from a user token; always set together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBinding {
    pub record_id: String,
    pub person_id: String,
}

#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AppSessionEstablished(AppSession),
    Authorized {
        app: AppSession,
        user_token: String,
        record: RecordBinding,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::AppSessionEstablished(_) => "app-session-established",
            SessionState::Authorized { .. } => "authorized",
        }
    }

    pub fn app(&self) -> Option<&AppSession> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::AppSessionEstablished(app) | SessionState::Authorized { app, .. } => {
                Some(app)
            }
        }
    }

    pub fn record(&self) -> Option<&RecordBinding> {
        match self {
            SessionState::Authorized { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn user_token(&self) -> Option<&str> {
        match self {
            SessionState::Authorized { user_token, .. } => Some(user_token),
            _ => None,
        }
    }

    /// Drop the user binding, keeping the application session
    fn unbind(self) -> Self {
        match self {
            SessionState::Authorized { app, .. } => SessionState::AppSessionEstablished(app),
            other => other,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record() {
            Some(record) => write!(f, "Authorized({record:?})"),
            None => f.write_str(self.name()),
        }
    }
}

/// Identifiers a caller may cache to skip round trips on the next connection.
///
/// Without an `auth_token` the application still authenticates, announcing
/// `shared_secret` instead of a fresh one. Holds the session secret in clear
/// text; store it accordingly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub shared_secret: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub wctoken: Option<String>,
}

impl PersistedSession {
    /// Only a shared secret to authenticate with
    pub fn with_shared_secret(shared_secret: impl Into<String>) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            auth_token: None,
            record_id: None,
            person_id: None,
            wctoken: None,
        }
    }

    fn app_session(&self) -> Option<AppSession> {
        let auth_token = self.auth_token.clone()?;
        Some(AppSession::new(
            SharedSecret::new(self.shared_secret.clone()),
            auth_token,
        ))
    }

    fn record(&self) -> Option<RecordBinding> {
        Some(RecordBinding {
            record_id: self.record_id.clone()?,
            person_id: self.person_id.clone()?,
        })
    }
}

impl fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedSession")
            .field("record_id", &self.record_id)
            .field("person_id", &self.person_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// User token handed back by the shell after authorization
    pub wctoken: Option<String>,
    pub persisted: Option<PersistedSession>,
}

impl ConnectOptions {
    pub fn wctoken(mut self, token: impl Into<String>) -> Self {
        self.wctoken = Some(token.into());
        self
    }

    pub fn persisted(mut self, session: PersistedSession) -> Self {
        self.persisted = Some(session);
        self
    }
}

/// Which optional identifiers a method call carries in its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestScope {
    pub record_id: bool,
    pub person_id: bool,
    pub user_token: bool,
}

impl RequestScope {
    /// Application session only
    pub const APP: Self = Self {
        record_id: false,
        person_id: false,
        user_token: false,
    };
    /// Application session plus the user token
    pub const USER: Self = Self {
        record_id: false,
        person_id: false,
        user_token: true,
    };
    /// User token and the bound record
    pub const RECORD: Self = Self {
        record_id: true,
        person_id: false,
        user_token: true,
    };
}

/// A connection to the platform on behalf of one application
pub struct HealthVaultConn<T: Transport> {
    config: HealthVaultConfig,
    credential: ApplicationCredential,
    transport: T,
    state: SessionState,
}

impl HealthVaultConn<HttpTransport> {
    /// Connect over HTTPS using the credential in `config` and the OS RNG
    pub fn from_config(config: HealthVaultConfig, options: ConnectOptions) -> Result<Self> {
        let credential = config.credential()?;
        let transport = HttpTransport::new(&config)?;
        Self::new(config, credential, transport, options, &mut OsRng)
    }
}

impl<T: Transport> HealthVaultConn<T> {
    /// Establish the application session, then bind a record if a user token
    /// is available.
    ///
    /// A persisted application session skips authentication; a persisted
    /// secret alone is announced in place of a fresh one. A persisted record
    /// binding is reused only together with the token it was resolved from.
    pub fn new<R: RngCore + CryptoRng>(
        config: HealthVaultConfig,
        credential: ApplicationCredential,
        transport: T,
        options: ConnectOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let mut conn = Self {
            config,
            credential,
            transport,
            state: SessionState::Unauthenticated,
        };

        let ConnectOptions { wctoken, persisted } = options;
        let app = match persisted.as_ref().map(|p| (p.app_session(), p)) {
            Some((Some(app), _)) => {
                info!("reusing cached application session");
                app
            }
            Some((None, cached)) => {
                conn.authenticate(SharedSecret::new(cached.shared_secret.clone()))?
            }
            None => conn.authenticate(generate_shared_secret(rng))?,
        };
        conn.state = SessionState::AppSessionEstablished(app);

        let cached_token = persisted.as_ref().and_then(|p| p.wctoken.clone());
        let Some(user_token) = wctoken.or_else(|| cached_token.clone()) else {
            return Ok(conn);
        };

        let cached_record = persisted
            .as_ref()
            .and_then(PersistedSession::record)
            .filter(|_| cached_token.as_deref() == Some(user_token.as_str()));
        match cached_record {
            Some(record) => {
                info!(record_id = %record.record_id, "reusing cached record binding");
                conn.bind(user_token, record);
            }
            None => conn.connect(&user_token)?,
        }
        Ok(conn)
    }

    fn authenticate(&self, shared_secret: SharedSecret) -> Result<AppSession> {
        let body = build_authentication_request(&self.credential, &shared_secret, &self.config)?;
        let root = self.round_trip(AUTHENTICATE_METHOD, &body)?;

        let token = root.text_at(".//token").ok_or_else(|| {
            HealthVaultError::protocol(AUTHENTICATE_METHOD, "response has no session token")
        })?;
        info!(app_id = %self.credential.application_id(), "application session established");
        Ok(AppSession::new(shared_secret, token))
    }

    /// Resolve the record for `wctoken`. Any previous binding is dropped
    /// first, so a failure leaves the connection unauthorized.
    pub fn connect(&mut self, wctoken: &str) -> Result<()> {
        self.disconnect();
        let info = self.person_info_with(wctoken)?;
        self.bind(
            wctoken.to_string(),
            RecordBinding {
                record_id: info.selected_record_id,
                person_id: info.person_id,
            },
        );
        Ok(())
    }

    fn bind(&mut self, user_token: String, record: RecordBinding) {
        let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        self.state = match state.unbind() {
            SessionState::AppSessionEstablished(app) => {
                info!(record_id = %record.record_id, "authorized");
                SessionState::Authorized {
                    app,
                    user_token,
                    record,
                }
            }
            other => other,
        };
    }

    /// Forget the user token and record binding
    pub fn disconnect(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        self.state = state.unbind();
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self.state, SessionState::Authorized { .. })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn record_id(&self) -> Option<&str> {
        self.state.record().map(|r| r.record_id.as_str())
    }

    pub fn person_id(&self) -> Option<&str> {
        self.state.record().map(|r| r.person_id.as_str())
    }

    pub fn config(&self) -> &HealthVaultConfig {
        &self.config
    }

    /// Snapshot for [`ConnectOptions::persisted`]
    pub fn persisted(&self) -> Option<PersistedSession> {
        let app = self.state.app()?;
        let record = self.state.record();
        Some(PersistedSession {
            shared_secret: app.shared_secret().expose().to_string(),
            auth_token: Some(app.auth_token().to_string()),
            record_id: record.map(|r| r.record_id.clone()),
            person_id: record.map(|r| r.person_id.clone()),
            wctoken: self.state.user_token().map(str::to_string),
        })
    }

    /// Shell URL for authorizing this application
    pub fn authorization_url(&self, callback: Option<&str>, record_id: Option<&str>) -> String {
        urls::authorization_url(
            &self.config.shell_server,
            &self.credential.application_id().to_string(),
            callback,
            record_id,
        )
    }

    pub fn signout_url(&self, callback: Option<&str>) -> String {
        urls::signout_url(
            &self.config.shell_server,
            &self.credential.application_id().to_string(),
            callback,
        )
    }

    /// Person and record information for the current user token
    pub fn get_person_info(&mut self) -> Result<PersonInfo> {
        let root = self.call_method(
            GET_PERSON_INFO_METHOD,
            GET_PERSON_INFO_VERSION,
            info_xml(""),
            RequestScope::USER,
        )?;
        PersonInfo::from_response(&root)
    }

    fn person_info_with(&self, wctoken: &str) -> Result<PersonInfo> {
        let app = self.require_app(GET_PERSON_INFO_METHOD)?;
        let envelope = self
            .envelope(GET_PERSON_INFO_METHOD, GET_PERSON_INFO_VERSION, app, info_xml(""))
            .with_user_auth_token(wctoken);
        let body = EnvelopeOps::sign_request(&envelope, app.shared_secret())?;
        let root = self.round_trip(GET_PERSON_INFO_METHOD, &body)?;
        PersonInfo::from_response(&root)
    }

    /// Sign and send one method call, returning the checked response root.
    ///
    /// Asking for an identifier the connection does not have is a usage
    /// error. A rejected user token (codes 7 and 11) on a user-bound call
    /// drops the record binding before the error is returned. An expired
    /// application session (code 65) drops the whole session; build a new
    /// connection to continue.
    pub fn call_method(
        &mut self,
        method: &str,
        version: u32,
        info: String,
        scope: RequestScope,
    ) -> Result<Element> {
        let app = self.require_app(method)?;
        let mut envelope = self.envelope(method, version, app, info);

        if scope.user_token || scope.record_id || scope.person_id {
            let (Some(user_token), Some(record)) = (self.state.user_token(), self.state.record())
            else {
                return Err(HealthVaultError::usage(
                    method,
                    "no user token; call connect() after the user authorizes the application",
                ));
            };
            if scope.user_token {
                envelope = envelope.with_user_auth_token(user_token);
            }
            if scope.record_id {
                envelope = envelope.with_record_id(&record.record_id);
            }
            if scope.person_id {
                envelope = envelope.with_target_person_id(&record.person_id);
            }
        }

        let body = EnvelopeOps::sign_request(&envelope, app.shared_secret())?;
        let result = self.round_trip(method, &body);

        if let Err(HealthVaultError::Status { code, .. }) = &result {
            match *code {
                codes::AUTHENTICATED_SESSION_TOKEN_EXPIRED => {
                    warn!(method, code, "application session expired");
                    self.state = SessionState::Unauthenticated;
                }
                codes::CREDENTIAL_TOKEN_EXPIRED | codes::ACCESS_DENIED if scope.user_token => {
                    warn!(method, code, "user token rejected, dropping record binding");
                    self.disconnect();
                }
                _ => {}
            }
        }
        result
    }

    fn require_app(&self, method: &str) -> Result<&AppSession> {
        self.state
            .app()
            .ok_or_else(|| HealthVaultError::usage(method, "no application session"))
    }

    fn envelope(
        &self,
        method: &str,
        version: u32,
        app: &AppSession,
        info: String,
    ) -> RequestEnvelope {
        RequestEnvelope::new(method, version, app.auth_token(), info)
            .with_locale(&self.config.language, &self.config.country)
            .with_msg_ttl(self.config.msg_ttl)
    }

    fn round_trip(&self, method: &str, body: &str) -> Result<Element> {
        debug!(method, state = self.state.name(), "sending request");
        let response = self.transport.send(method, body)?;
        check_response(method, &response)
    }

    /// Things matching one query
    pub fn get_things(&mut self, query: ThingQuery) -> Result<Vec<ThingRecord>> {
        let mut groups = self.get_things_batch(std::slice::from_ref(&query))?;
        Ok(groups.pop().unwrap_or_default())
    }

    /// One result list per query, in query order
    pub fn get_things_batch(&mut self, queries: &[ThingQuery]) -> Result<Vec<Vec<ThingRecord>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let root = self.call_method(
            GET_THINGS_METHOD,
            GET_THINGS_VERSION,
            things::get_things_info(queries),
            RequestScope::RECORD,
        )?;
        let info = root.required("info")?;
        let groups = things::parse_things_response(info, queries)?;
        debug!(
            groups = groups.len(),
            things = groups.iter().map(Vec::len).sum::<usize>(),
            "parsed things"
        );
        Ok(groups)
    }

    /// Every record of type `D`
    pub fn get_typed<D: ThingData>(&mut self) -> Result<Vec<D>> {
        let records = self.get_things(ThingQuery::new(D::DATA_TYPE))?;
        Ok(records
            .into_iter()
            .filter_map(|r| D::from_thing(r.data))
            .collect())
    }

    pub fn get_basic_demographic_info(&mut self) -> Result<Option<BasicDemographics>> {
        Ok(self.get_typed::<BasicDemographics>()?.into_iter().next())
    }

    pub fn get_blood_glucose_measurements(&mut self) -> Result<Vec<BloodGlucose>> {
        self.get_typed()
    }

    pub fn get_blood_pressure_measurements(&mut self) -> Result<Vec<BloodPressure>> {
        self.get_typed()
    }

    pub fn get_devices(&mut self) -> Result<Vec<Device>> {
        self.get_typed()
    }

    pub fn get_exercise(&mut self) -> Result<Vec<Exercise>> {
        self.get_typed()
    }

    pub fn get_height_measurements(&mut self) -> Result<Vec<Height>> {
        self.get_typed()
    }

    pub fn get_sleep_sessions(&mut self) -> Result<Vec<SleepSession>> {
        self.get_typed()
    }

    pub fn get_weight_measurements(&mut self) -> Result<Vec<WeightMeasurement>> {
        self.get_typed()
    }

    /// Register `url` for change notifications on `data_types`.
    ///
    /// Returns the subscription id and the base64 notification key.
    pub fn subscribe_to_event<R: RngCore + CryptoRng>(
        &mut self,
        url: &str,
        data_types: &[DataType],
        rng: &mut R,
    ) -> Result<(String, String)> {
        let request = SubscriptionRequest::new(url, data_types, rng)?;
        let root = self.call_method(
            SUBSCRIBE_METHOD,
            EVENT_METHOD_VERSION,
            request.info_xml(),
            RequestScope::APP,
        )?;
        let id = events::parse_subscribe_response(&root)?;
        info!(subscription_id = %id, url = request.url(), "subscribed");
        Ok((id, request.notification_key().to_string()))
    }

    pub fn get_event_subscriptions(&mut self) -> Result<Vec<EventSubscription>> {
        let root = self.call_method(
            GET_SUBSCRIPTIONS_METHOD,
            EVENT_METHOD_VERSION,
            info_xml(""),
            RequestScope::APP,
        )?;
        events::parse_subscriptions_response(&root)
    }

    pub fn unsubscribe_to_event(&mut self, subscription_id: &str) -> Result<()> {
        self.call_method(
            UNSUBSCRIBE_METHOD,
            EVENT_METHOD_VERSION,
            events::unsubscribe_info(subscription_id),
            RequestScope::APP,
        )?;
        info!(subscription_id, "unsubscribed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppSession {
        AppSession::new(SharedSecret::new("18446744073709551616"), "APPTOKEN")
    }

    fn record() -> RecordBinding {
        RecordBinding {
            record_id: "r".into(),
            person_id: "p".into(),
        }
    }

    #[test]
    fn test_state_accessors() {
        assert!(SessionState::Unauthenticated.app().is_none());

        let established = SessionState::AppSessionEstablished(app());
        assert_eq!(established.app().unwrap().auth_token(), "APPTOKEN");
        assert!(established.record().is_none());

        let authorized = SessionState::Authorized {
            app: app(),
            user_token: "WC".into(),
            record: record(),
        };
        assert_eq!(authorized.user_token(), Some("WC"));
        assert_eq!(authorized.record(), Some(&record()));
        assert_eq!(authorized.name(), "authorized");
    }

    #[test]
    fn test_unbind_keeps_app_session() {
        let authorized = SessionState::Authorized {
            app: app(),
            user_token: "WC".into(),
            record: record(),
        };
        assert_eq!(authorized.unbind(), SessionState::AppSessionEstablished(app()));
        assert_eq!(
            SessionState::Unauthenticated.unbind(),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let authorized = SessionState::Authorized {
            app: app(),
            user_token: "WCTOKEN-SECRET".into(),
            record: record(),
        };
        let shown = format!("{authorized:?}");
        assert!(!shown.contains("WCTOKEN-SECRET"));
        assert!(!shown.contains("18446744073709551616"));

        let persisted = PersistedSession {
            shared_secret: "18446744073709551616".into(),
            auth_token: Some("APPTOKEN".into()),
            record_id: None,
            person_id: None,
            wctoken: None,
        };
        assert!(!format!("{persisted:?}").contains("APPTOKEN"));
    }

    #[test]
    fn test_persisted_record_requires_both_ids() {
        let mut persisted = PersistedSession {
            shared_secret: "1".into(),
            auth_token: Some("t".into()),
            record_id: Some("r".into()),
            person_id: None,
            wctoken: Some("wc".into()),
        };
        assert_eq!(persisted.record(), None);
        persisted.person_id = Some("p".into());
        assert_eq!(persisted.record(), Some(record()));
    }

    #[test]
    fn test_persisted_session_json() {
        let json = r#"{"shared_secret":"1","auth_token":"t"}"#;
        let persisted: PersistedSession = serde_json::from_str(json).unwrap();
        assert_eq!(persisted.wctoken, None);
        assert_eq!(persisted.record(), None);
        assert!(persisted.app_session().is_some());

        let secret_only: PersistedSession =
            serde_json::from_str(r#"{"shared_secret":"18446744073709551617"}"#).unwrap();
        assert_eq!(
            secret_only,
            PersistedSession::with_shared_secret("18446744073709551617")
        );
        assert!(secret_only.app_session().is_none());
    }
}
