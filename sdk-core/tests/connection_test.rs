use base64::Engine as _;
use healthvault_sdk_core::{
    crypto::{digest, sig::AppKeyPair},
    things::WeightMeasurement,
    xml, ApplicationCredential, ConnectOptions, DataType, ErrorKind, HealthVaultConfig,
    HealthVaultConn, HealthVaultError, PersistedSession, Result, ThingQuery, Transport,
    TransportResponse,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use std::cell::RefCell;
use std::collections::VecDeque;
use uuid::Uuid;

const APP_ID: &str = "bafb1313-d4e0-421c-b3b5-4e3a55639c19";
const PERSON_ID: &str = "6c6a4f7b-0001-4a57-9d4a-1b0a1f0c0001";
const RECORD_ID: &str = "9f2d4f7b-0002-4a57-9d4a-1b0a1f0c0002";

/// Replays canned responses and records every request
#[derive(Default)]
struct ScriptedTransport {
    responses: RefCell<VecDeque<TransportResponse>>,
    requests: RefCell<Vec<(String, String)>>,
}

impl ScriptedTransport {
    fn push(&self, body: String) {
        self.responses
            .borrow_mut()
            .push_back(TransportResponse::ok(body));
    }

    fn push_response(&self, response: TransportResponse) {
        self.responses.borrow_mut().push_back(response);
    }

    fn methods(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    fn last_body(&self) -> String {
        self.requests.borrow().last().unwrap().1.clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, method: &str, payload: &str) -> Result<TransportResponse> {
        self.requests
            .borrow_mut()
            .push((method.to_string(), payload.to_string()));
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .expect("unexpected request"))
    }
}

fn ok(info: &str) -> String {
    format!("<response><status><code>0</code></status>{info}</response>")
}

fn status(code: i32, message: &str) -> String {
    format!(
        "<response><status><code>{code}</code><error><message>{message}</message></error></status></response>"
    )
}

fn auth_response() -> String {
    ok(&format!(
        "<wc:info xmlns:wc=\"urn:com.microsoft.wc.methods.response.CreateAuthenticatedSessionToken\">\
         <token app-id=\"{APP_ID}\">APPTOKEN</token></wc:info>"
    ))
}

fn person_response() -> String {
    ok(&format!(
        "<wc:info xmlns:wc=\"urn:com.microsoft.wc.methods.response.GetPersonInfo\"><person-info>\
         <person-id>{PERSON_ID}</person-id><name>Jo Doe</name>\
         <selected-record-id>{RECORD_ID}</selected-record-id>\
         <record id=\"{RECORD_ID}\" rel-name=\"Self\">Jo Doe</record></person-info></wc:info>"
    ))
}

fn weight_response(group_name: &str) -> String {
    ok(&format!(
        "<wc:info xmlns:wc=\"urn:com.microsoft.wc.methods.response.GetThings\">\
         <group name=\"{group_name}\"><thing><thing-id version-stamp=\"50b1d853-c990-407d-bd93-3cc7563d9171\">\
         10993223-00c5-45bb-b615-ef9feda9410d</thing-id>\
         <type-id name=\"Weight Measurement\">3d34d87e-7fc1-4153-800f-f56592cb0d17</type-id>\
         <thing-state>Active</thing-state><flags>0</flags><eff-date>2012-11-12T11:24:00</eff-date>\
         <data-xml><weight><when><date><y>2012</y><m>11</m><d>12</d></date>\
         <time><h>11</h><m>24</m></time></when><value><kg>11.954880503984493</kg>\
         <display units=\"lbs\" units-code=\"lb\">26.355999999999998</display></value></weight><common />\
         </data-xml></thing></group></wc:info>"
    ))
}

fn key_pair() -> RsaPrivateKey {
    let mut rng = StdRng::seed_from_u64(1234);
    RsaPrivateKey::new(&mut rng, 1024).unwrap()
}

fn credential(private: &RsaPrivateKey) -> ApplicationCredential {
    let keys = AppKeyPair::new(private.n().clone(), private.d().clone()).unwrap();
    ApplicationCredential::new(
        Uuid::parse_str(APP_ID).unwrap(),
        "4CA512B0B5A5CA3E751E6F92F7A1C1E5EBB0309C",
        keys,
    )
    .unwrap()
}

fn config() -> HealthVaultConfig {
    HealthVaultConfig {
        app_id: APP_ID.into(),
        shell_server: "shell.server".into(),
        ..HealthVaultConfig::default()
    }
}

fn connect<'t>(
    transport: &'t ScriptedTransport,
    options: ConnectOptions,
) -> Result<HealthVaultConn<&'t ScriptedTransport>> {
    let private = key_pair();
    HealthVaultConn::new(
        config(),
        credential(&private),
        transport,
        options,
        &mut StdRng::seed_from_u64(9),
    )
}

fn header_of(body: &str) -> &str {
    let start = body.find("<header>").unwrap();
    let end = body.find("</header>").unwrap() + "</header>".len();
    &body[start..end]
}

#[test]
fn test_authentication_request_is_signed() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());

    let conn = connect(&transport, ConnectOptions::default()).unwrap();
    assert!(!conn.is_authorized());
    assert_eq!(transport.methods(), vec!["CreateAuthenticatedSessionToken"]);

    let body = transport.last_body();
    let root = xml::parse(&body).unwrap();
    assert!(root.find("auth").is_none());

    let appserver = root.required("info/auth-info/credential/appserver").unwrap();
    let sig = appserver.required("sig").unwrap();
    assert_eq!(sig.attr("sigMethod"), Some("RSA-SHA1"));

    // Signature covers the literal content block
    let content_start = body.find("<content>").unwrap();
    let content_end = body.find("</content>").unwrap() + "</content>".len();
    let content = &body[content_start..content_end];
    let signature = base64::engine::general_purpose::STANDARD
        .decode(sig.text().unwrap())
        .unwrap();
    let public = key_pair().to_public_key();
    public
        .verify(
            Pkcs1v15Sign::new::<Sha1>(),
            &Sha1::digest(content.as_bytes()),
            &signature,
        )
        .unwrap();

    // The announced secret is the one the session signs with
    let announced = base64::engine::general_purpose::STANDARD
        .decode(appserver.text_at("content/shared-secret/hmac-alg").unwrap())
        .unwrap();
    let persisted = conn.persisted().unwrap();
    assert_eq!(announced, persisted.shared_secret.as_bytes());
    assert_eq!(persisted.auth_token.as_deref(), Some("APPTOKEN"));
    assert_eq!(persisted.record_id, None);
}

#[test]
fn test_connect_then_get_weights() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    let mut conn = connect(&transport, ConnectOptions::default()).unwrap();

    transport.push(person_response());
    conn.connect("WCTOKEN").unwrap();
    assert!(conn.is_authorized());
    assert_eq!(conn.record_id(), Some(RECORD_ID));
    assert_eq!(conn.person_id(), Some(PERSON_ID));

    let person_body = transport.last_body();
    assert!(header_of(&person_body).contains("<user-auth-token>WCTOKEN</user-auth-token>"));
    assert!(!header_of(&person_body).contains("<record-id>"));

    transport.push(weight_response("g0"));
    let weights = conn.get_weight_measurements().unwrap();
    assert_eq!(weights.len(), 1);
    let WeightMeasurement { when, kg, lbs } = &weights[0];
    assert_eq!(when.to_string(), "2012-11-12 11:24:00");
    assert_eq!(*kg, Some(11.954880503984493));
    assert_eq!(*lbs, None);

    // Header is HMAC'd with the session secret and carries the record
    let body = transport.last_body();
    let header = header_of(&body);
    assert!(header.contains(&format!("<record-id>{RECORD_ID}</record-id>")));
    let secret = conn.persisted().unwrap().shared_secret;
    let mac = digest::hmac_sha1_base64(secret.as_bytes(), header.as_bytes()).unwrap();
    let root = xml::parse(&body).unwrap();
    assert_eq!(root.text_at("auth/hmac-data"), Some(mac));
    assert_eq!(
        transport.methods(),
        vec!["CreateAuthenticatedSessionToken", "GetPersonInfo", "GetThings"]
    );
}

#[test]
fn test_wctoken_at_construction_resolves_record() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());

    let conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();
    assert!(conn.is_authorized());
    assert_eq!(conn.persisted().unwrap().wctoken.as_deref(), Some("WCTOKEN"));
}

#[test]
fn test_record_call_before_connect_is_usage_error() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    let mut conn = connect(&transport, ConnectOptions::default()).unwrap();

    let err = conn.get_devices().unwrap_err();
    assert!(matches!(err, HealthVaultError::Usage { ref method, .. } if method == "GetThings"));
    assert_eq!(transport.methods().len(), 1);
}

#[test]
fn test_expired_token_drops_binding() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    transport.push(status(7, "Credential token has expired"));
    let err = conn.get_things(ThingQuery::new(DataType::Height)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TokenExpired));
    assert_eq!(err.code(), Some(7));
    assert!(err.needs_reauthorization());
    assert!(!conn.is_authorized());
    assert_eq!(conn.record_id(), None);
    assert_eq!(conn.person_id(), None);

    // Application session survives
    assert_eq!(
        conn.persisted().unwrap().auth_token.as_deref(),
        Some("APPTOKEN")
    );
}

#[test]
fn test_access_denied_drops_binding() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    transport.push(status(11, "Access denied"));
    let err = conn.get_devices().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::AccessDenied));
    assert!(!conn.is_authorized());
    assert!(conn.state().app().is_some());
}

#[test]
fn test_expired_app_session_drops_everything() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    transport.push(status(65, "Authenticated session token has expired"));
    let err = conn.get_height_measurements().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TokenExpired));
    assert!(!conn.is_authorized());
    assert!(conn.state().app().is_none());
    assert_eq!(conn.persisted(), None);

    // Nothing is sent without an application session
    let err = conn.get_event_subscriptions().unwrap_err();
    assert!(matches!(err, HealthVaultError::Usage { .. }));
    assert_eq!(transport.methods().len(), 3);
}

#[test]
fn test_platform_error_keeps_binding() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    transport.push(status(3, "Invalid XML"));
    let err = conn.get_exercise().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Platform));
    assert!(conn.is_authorized());
}

#[test]
fn test_failed_connect_leaves_no_partial_binding() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    transport.push(ok(&format!(
        "<wc:info xmlns:wc=\"urn:x\"><person-info><person-id>{PERSON_ID}</person-id></person-info></wc:info>"
    )));
    let err = conn.connect("OTHER").unwrap_err();
    assert!(matches!(err, HealthVaultError::Protocol { .. }));
    assert!(!conn.is_authorized());
    assert_eq!(conn.person_id(), None);
}

#[test]
fn test_missing_session_token_is_fatal() {
    let transport = ScriptedTransport::default();
    transport.push(ok("<wc:info xmlns:wc=\"urn:x\"/>"));
    let err = connect(&transport, ConnectOptions::default()).err().unwrap();
    assert!(matches!(err, HealthVaultError::Protocol { .. }));
}

#[test]
fn test_http_failure() {
    let transport = ScriptedTransport::default();
    transport.push_response(TransportResponse {
        status: 503,
        reason: "Service Unavailable".into(),
        body: String::new(),
    });
    let err = connect(&transport, ConnectOptions::default()).err().unwrap();
    assert!(matches!(err, HealthVaultError::Http { status: 503, .. }));
    assert_eq!(err.code(), Some(503));
}

#[test]
fn test_persisted_session_skips_round_trips() {
    let persisted = PersistedSession {
        shared_secret: "36893488147419103231".into(),
        auth_token: Some("CACHED".into()),
        record_id: Some(RECORD_ID.into()),
        person_id: Some(PERSON_ID.into()),
        wctoken: Some("WCTOKEN".into()),
    };

    let transport = ScriptedTransport::default();
    let conn = connect(&transport, ConnectOptions::default().persisted(persisted.clone())).unwrap();
    assert!(conn.is_authorized());
    assert!(transport.methods().is_empty());
    assert_eq!(conn.persisted(), Some(persisted.clone()));

    // A different user token must be resolved again
    let transport = ScriptedTransport::default();
    transport.push(person_response());
    let conn = connect(
        &transport,
        ConnectOptions::default()
            .persisted(persisted)
            .wctoken("NEWTOKEN"),
    )
    .unwrap();
    assert!(conn.is_authorized());
    assert_eq!(transport.methods(), vec!["GetPersonInfo"]);
    assert!(transport.last_body().contains("<auth-token>CACHED</auth-token>"));
}

#[test]
fn test_supplied_shared_secret_is_announced() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());

    let persisted = PersistedSession {
        wctoken: Some("WCTOKEN".into()),
        ..PersistedSession::with_shared_secret("36893488147419103231")
    };
    let conn = connect(&transport, ConnectOptions::default().persisted(persisted)).unwrap();

    assert_eq!(
        transport.methods(),
        vec!["CreateAuthenticatedSessionToken", "GetPersonInfo"]
    );
    let auth_body = transport.requests.borrow()[0].1.clone();
    let announced = xml::parse(&auth_body)
        .unwrap()
        .text_at("info/auth-info/credential/appserver/content/shared-secret/hmac-alg")
        .unwrap();
    let announced = base64::engine::general_purpose::STANDARD
        .decode(announced)
        .unwrap();
    assert_eq!(announced, b"36893488147419103231");

    // Later requests are HMAC'd with the supplied secret
    let body = transport.last_body();
    let mac =
        digest::hmac_sha1_base64(b"36893488147419103231", header_of(&body).as_bytes()).unwrap();
    assert_eq!(xml::parse(&body).unwrap().text_at("auth/hmac-data"), Some(mac));

    let snapshot = conn.persisted().unwrap();
    assert_eq!(snapshot.shared_secret, "36893488147419103231");
    assert_eq!(snapshot.auth_token.as_deref(), Some("APPTOKEN"));
    assert_eq!(conn.record_id(), Some(RECORD_ID));
}

#[test]
fn test_batch_out_of_order_groups() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    transport.push(person_response());
    let mut conn = connect(&transport, ConnectOptions::default().wctoken("WCTOKEN")).unwrap();

    let bp = "<group name=\"g0\"><thing><thing-id>b</thing-id>\
              <type-id>ca3c57f4-f4c1-4e15-be67-0a3caf5414ed</type-id><data-xml><blood-pressure>\
              <when><date><y>2012</y><m>11</m><d>12</d></date></when><systolic>120</systolic>\
              </blood-pressure></data-xml></thing></group>";
    let weights = weight_response("g1");
    let start = weights.find("<group").unwrap();
    let end = weights.find("</wc:info>").unwrap();
    let weights_group = &weights[start..end];
    transport.push(ok(&format!(
        "<wc:info xmlns:wc=\"urn:com.microsoft.wc.methods.response.GetThings\">{weights_group}{bp}</wc:info>"
    )));

    let groups = conn
        .get_things_batch(&[
            ThingQuery::new(DataType::BloodPressure),
            ThingQuery::new(DataType::Weight),
        ])
        .unwrap();
    assert_eq!(groups[0][0].data.data_type(), DataType::BloodPressure);
    assert_eq!(groups[1][0].data.data_type(), DataType::Weight);

    let info = xml::parse(&transport.last_body()).unwrap();
    let names: Vec<_> = info
        .find_all("info/group")
        .into_iter()
        .map(|g| g.attr("name").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["g0", "g1"]);
}

#[test]
fn test_subscriptions_use_app_session_only() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    let mut conn = connect(&transport, ConnectOptions::default()).unwrap();

    transport.push(ok(
        "<wc:info xmlns:wc=\"urn:com.microsoft.wc.methods.response.SubscribeToEvent\">\
         <subscription-id>sub-1</subscription-id></wc:info>",
    ));
    let (id, key) = conn
        .subscribe_to_event(
            "https://example.com/sub/",
            &[DataType::Height],
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap();
    assert_eq!(id, "sub-1");
    assert_eq!(
        base64::engine::general_purpose::STANDARD
            .decode(&key)
            .unwrap()
            .len(),
        64
    );

    let body = transport.last_body();
    assert!(!header_of(&body).contains("user-auth-token"));
    assert!(!header_of(&body).contains("record-id"));
    assert!(body.contains(&key));

    transport.push(ok("<wc:info xmlns:wc=\"urn:x\"/>"));
    conn.unsubscribe_to_event("sub-1").unwrap();
    assert!(transport
        .last_body()
        .contains("<subscription-id>sub-1</subscription-id>"));

    let err = conn
        .subscribe_to_event(
            "http://example.com/",
            &[DataType::Height],
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap_err();
    assert!(matches!(err, HealthVaultError::Usage { .. }));
    assert_eq!(transport.methods().len(), 3);
}

#[test]
fn test_authorization_url_uses_app_id() {
    let transport = ScriptedTransport::default();
    transport.push(auth_response());
    let conn = connect(&transport, ConnectOptions::default()).unwrap();

    let url = conn.authorization_url(Some("http://cb/"), None);
    assert_eq!(
        url,
        format!(
            "https://shell.server/redirect.aspx?targetqs=redirect%3Dhttp%253A%252F%252Fcb%252F%26appid%3D{APP_ID}&target=APPAUTH"
        )
    );
    assert!(conn.signout_url(None).ends_with("&target=APPSIGNOUT"));
}
