//! Event subscriptions and inbound change notifications

use crate::crypto::generate_notification_key;
use crate::error::{HealthVaultError, Result};
use crate::things::DataType;
use crate::xml::{self, escape, Element};
use rand::{CryptoRng, RngCore};
use serde::Serialize;

pub const SUBSCRIBE_METHOD: &str = "SubscribeToEvent";
pub const GET_SUBSCRIPTIONS_METHOD: &str = "GetEventSubscriptions";
pub const UNSUBSCRIBE_METHOD: &str = "UnsubscribeToEvent";
pub const EVENT_METHOD_VERSION: u32 = 1;

/// Version of the notification key we hand out; keys are never rotated in place
const NOTIFICATION_KEY_VERSION: u32 = 1;

/// A `SubscribeToEvent` payload with its freshly generated key
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(Debug))]
pub struct SubscriptionRequest {
    url: String,
    type_ids: Vec<String>,
    notification_key: String,
}

impl SubscriptionRequest {
    /// `url` must be `https://`; the platform refuses plain HTTP callbacks
    pub fn new<R: RngCore + CryptoRng>(
        url: &str,
        data_types: &[DataType],
        rng: &mut R,
    ) -> Result<Self> {
        Self::with_type_ids(
            url,
            data_types.iter().map(|t| t.type_id().to_string()).collect(),
            rng,
        )
    }

    /// Subscribe to arbitrary type identifiers
    pub fn with_type_ids<R: RngCore + CryptoRng>(
        url: &str,
        type_ids: Vec<String>,
        rng: &mut R,
    ) -> Result<Self> {
        if !url.starts_with("https://") {
            return Err(HealthVaultError::usage(
                SUBSCRIBE_METHOD,
                format!("callback URL must start with https://, got {url:?}"),
            ));
        }
        if type_ids.is_empty() {
            return Err(HealthVaultError::usage(
                SUBSCRIBE_METHOD,
                "at least one data type is required",
            ));
        }
        Ok(Self {
            url: url.to_string(),
            type_ids,
            notification_key: generate_notification_key(rng)?,
        })
    }

    /// Base64 key the platform will use to sign notifications
    pub fn notification_key(&self) -> &str {
        &self.notification_key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn info_xml(&self) -> String {
        let type_ids: String = self
            .type_ids
            .iter()
            .map(|id| format!("<type-id>{}</type-id>", escape(id)))
            .collect();
        format!(
            "<info><subscription><common>\
             <notification-authentication-info><hv-eventing-shared-key>\
             <notification-key>{key}</notification-key>\
             <notification-key-version-id>{NOTIFICATION_KEY_VERSION}</notification-key-version-id>\
             </hv-eventing-shared-key></notification-authentication-info>\
             <notification-channel><http-notification-channel><url>{url}</url>\
             </http-notification-channel></notification-channel></common>\
             <record-item-changed-event><filters><filter><type-ids>{type_ids}</type-ids>\
             </filter></filters></record-item-changed-event></subscription></info>",
            key = self.notification_key,
            url = escape(&self.url),
        )
    }
}

/// Subscription id from a `SubscribeToEvent` response
pub fn parse_subscribe_response(root: &Element) -> Result<String> {
    root.text_at(".//subscription-id").ok_or_else(|| {
        HealthVaultError::protocol(SUBSCRIBE_METHOD, "response has no <subscription-id>")
    })
}

/// `<info>` for `UnsubscribeToEvent`
pub fn unsubscribe_info(subscription_id: &str) -> String {
    format!(
        "<info><subscription-id>{}</subscription-id></info>",
        escape(subscription_id)
    )
}

/// One registered subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSubscription {
    pub id: String,
    pub url: Option<String>,
    pub type_ids: Vec<String>,
}

impl EventSubscription {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            id: elt.required("common/id")?.parse_text()?,
            url: elt.text_at("common/notification-channel/http-notification-channel/url"),
            type_ids: elt.texts_at("record-item-changed-event/filters/filter/type-ids/type-id"),
        })
    }
}

pub fn parse_subscriptions_response(root: &Element) -> Result<Vec<EventSubscription>> {
    root.all(".//subscription", EventSubscription::from_element)
}

/// Decoded body of an inbound change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subscription_id: String,
    pub person_id: String,
    pub record_id: String,
    pub thing_ids: Vec<String>,
}

/// Parse a notification POSTed to the subscription URL.
///
/// Authenticating the sender with the notification key is left to the
/// receiving web handler.
pub fn parse_notification(body: &str) -> Result<Notification> {
    let root = xml::parse(body)?;
    let change = root.required("record-change-notification")?;
    Ok(Notification {
        subscription_id: root.required("common/subscription-id")?.parse_text()?,
        person_id: change.required("person-id")?.parse_text()?,
        record_id: change.required("record-id")?.parse_text()?,
        thing_ids: change.texts_at("things/thing/thing-id"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_subscription_requires_https() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = SubscriptionRequest::new("http://example.com/cb", &[DataType::Height], &mut rng)
            .unwrap_err();
        assert!(matches!(err, HealthVaultError::Usage { .. }));
        assert!(SubscriptionRequest::new("https://example.com/cb", &[], &mut rng).is_err());
    }

    #[test]
    fn test_subscription_info() {
        let mut rng = StdRng::seed_from_u64(3);
        let request = SubscriptionRequest::new(
            "https://example.com/sub/?a=1&b=2",
            &[DataType::Height, DataType::Weight],
            &mut rng,
        )
        .unwrap();
        let info = xml::parse(&request.info_xml()).unwrap();

        assert_eq!(
            info.text_at(".//notification-key").as_deref(),
            Some(request.notification_key())
        );
        assert_eq!(
            info.text_at(".//http-notification-channel/url").as_deref(),
            Some("https://example.com/sub/?a=1&b=2")
        );
        assert_eq!(
            info.texts_at(".//type-ids/type-id"),
            vec![
                DataType::Height.type_id().to_string(),
                DataType::Weight.type_id().to_string()
            ]
        );
    }

    #[test]
    fn test_parse_subscriptions() {
        let root = xml::parse(
            "<response><status><code>0</code></status><wc:info xmlns:wc=\"urn:x\">\
             <subscription><common><id>sub-1</id><notification-channel><http-notification-channel>\
             <url>https://example.com/sub/</url></http-notification-channel></notification-channel></common>\
             <record-item-changed-event><filters><filter><type-ids><type-id>40750a6a-89b2-455c-bd8d-b420a4cb500b</type-id>\
             </type-ids></filter></filters></record-item-changed-event></subscription></wc:info></response>",
        )
        .unwrap();
        let subs = parse_subscriptions_response(&root).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "sub-1");
        assert_eq!(subs[0].url.as_deref(), Some("https://example.com/sub/"));
        assert_eq!(subs[0].type_ids.len(), 1);
    }

    #[test]
    fn test_parse_notification() {
        let body = "<?xml version=\"1.0\"?><notification><common><subscription-id>sub-1</subscription-id></common>\
                    <record-change-notification><person-id>p-1</person-id><record-id>r-1</record-id>\
                    <things><thing><thing-id>t-1</thing-id></thing><thing><thing-id>t-2</thing-id></thing></things>\
                    </record-change-notification></notification>";
        assert_eq!(
            parse_notification(body).unwrap(),
            Notification {
                subscription_id: "sub-1".into(),
                person_id: "p-1".into(),
                record_id: "r-1".into(),
                thing_ids: vec!["t-1".into(), "t-2".into()],
            }
        );
        assert!(parse_notification("<notification/>").is_err());
    }

    #[test]
    fn test_deeply_nested_notification_is_rejected() {
        let body = format!(
            "<notification>{}{}</notification>",
            "<a>".repeat(200_000),
            "</a>".repeat(200_000)
        );
        assert!(matches!(
            parse_notification(&body),
            Err(HealthVaultError::Parse { .. })
        ));
    }

    #[test]
    fn test_unsubscribe_info() {
        assert_eq!(
            unsubscribe_info("sub-1"),
            "<info><subscription-id>sub-1</subscription-id></info>"
        );
    }
}
