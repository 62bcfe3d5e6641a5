//! Response validation: HTTP status, XML body, platform status code

use crate::error::{HealthVaultError, Result};
use crate::status;
use crate::transport::TransportResponse;
use crate::xml::{self, Element};
use tracing::debug;

/// Check a round trip and return the parsed `<response>` root.
///
/// A non-200 HTTP status is fatal. A 200 whose `<status><code>` is non-zero
/// becomes [`HealthVaultError::Status`] with the classified kind and the
/// platform's message.
pub fn check_response(method: &str, response: &TransportResponse) -> Result<Element> {
    if response.status != 200 {
        return Err(HealthVaultError::Http {
            method: method.to_string(),
            status: response.status,
            reason: response.reason.clone(),
        });
    }

    let root = xml::parse(&response.body)?;
    let code = root
        .required("status/code")
        .map_err(|_| HealthVaultError::protocol(method, "response has no <status><code>"))?
        .parse_text::<i32>()?;

    if code != 0 {
        let kind = status::classify(code);
        let message = root.text_at("status/error/message").unwrap_or_default();
        debug!(method, code, %kind, name = status::status_name(code), "platform status");
        return Err(HealthVaultError::Status {
            method: method.to_string(),
            kind,
            code,
            message,
        });
    }

    Ok(root)
}
