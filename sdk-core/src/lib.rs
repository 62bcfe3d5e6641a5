//! HealthVault client library
//!
//! Application authentication, HMAC-signed method calls and typed parsing of
//! the platform's XML responses.

pub mod config;
pub mod credential;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod events;
pub mod person;
pub mod response;
pub mod session;
pub mod status;
pub mod things;
pub mod transport;
pub mod urls;
pub mod xml;

// Re-exports
pub use config::HealthVaultConfig;
pub use credential::ApplicationCredential;
pub use envelope::RequestEnvelope;
pub use error::{HealthVaultError, Result};
pub use events::{parse_notification, EventSubscription, Notification, SubscriptionRequest};
pub use person::PersonInfo;
pub use session::{
    ConnectOptions, HealthVaultConn, PersistedSession, RecordBinding, RequestScope, SessionState,
};
pub use status::{classify, ErrorKind};
pub use things::{DataType, Thing, ThingData, ThingQuery, ThingRecord};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use urls::{authorization_url, signout_url, ApplicationTarget};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
