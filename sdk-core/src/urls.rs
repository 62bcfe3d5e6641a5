//! Shell redirect URLs
//!
//! The user authorizes the application (and signs out) on the shell server.
//! The shell sends the browser back to the application's action URL with a
//! `target` parameter naming what happened.

use crate::error::{HealthVaultError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

const AUTH_TARGET: &str = "APPAUTH";
const SIGNOUT_TARGET: &str = "APPSIGNOUT";

/// `target` values the shell sends back to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationTarget {
    AppAuthInvalidRecord,
    AppAuthReject,
    AppAuthSuccess,
    EditRecordComplete,
    EditRecordCancel,
    EditRecordCanceled,
    ReconcileCanceled,
    ReconcileComplete,
    ReconcileFailure,
    SelectedRecordChanged,
    ShareRecordFailed,
    ShareRecordSuccess,
    SignOut,
}

impl ApplicationTarget {
    pub const ALL: [ApplicationTarget; 13] = [
        ApplicationTarget::AppAuthInvalidRecord,
        ApplicationTarget::AppAuthReject,
        ApplicationTarget::AppAuthSuccess,
        ApplicationTarget::EditRecordComplete,
        ApplicationTarget::EditRecordCancel,
        ApplicationTarget::EditRecordCanceled,
        ApplicationTarget::ReconcileCanceled,
        ApplicationTarget::ReconcileComplete,
        ApplicationTarget::ReconcileFailure,
        ApplicationTarget::SelectedRecordChanged,
        ApplicationTarget::ShareRecordFailed,
        ApplicationTarget::ShareRecordSuccess,
        ApplicationTarget::SignOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationTarget::AppAuthInvalidRecord => "appauthinvalidrecord",
            ApplicationTarget::AppAuthReject => "appauthreject",
            ApplicationTarget::AppAuthSuccess => "appauthsuccess",
            ApplicationTarget::EditRecordComplete => "editrecordcomplete",
            ApplicationTarget::EditRecordCancel => "editrecordcancel",
            ApplicationTarget::EditRecordCanceled => "editrecordcanceled",
            ApplicationTarget::ReconcileCanceled => "reconcilecanceled",
            ApplicationTarget::ReconcileComplete => "reconcilecomplete",
            ApplicationTarget::ReconcileFailure => "reconcilefailure",
            ApplicationTarget::SelectedRecordChanged => "selectedrecordchanged",
            ApplicationTarget::ShareRecordFailed => "sharerecordfailed",
            ApplicationTarget::ShareRecordSuccess => "sharerecordsuccess",
            ApplicationTarget::SignOut => "signout",
        }
    }
}

impl fmt::Display for ApplicationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationTarget {
    type Err = HealthVaultError;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| HealthVaultError::Config(format!("unknown application target {s:?}")))
    }
}

fn redirect_url(shell_server: &str, target: &str, targetqs: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("targetqs", targetqs)
        .append_pair("target", target)
        .finish();
    format!("https://{shell_server}/redirect.aspx?{query}")
}

/// URL sending the user to the shell to authorize `app_id`.
///
/// `callback` overrides the action URL registered for the application;
/// `record_id` asks the shell to preselect that record.
pub fn authorization_url(
    shell_server: &str,
    app_id: &str,
    callback: Option<&str>,
    record_id: Option<&str>,
) -> String {
    let mut targetqs = form_urlencoded::Serializer::new(String::new());
    if let Some(callback) = callback {
        targetqs.append_pair("redirect", callback);
    }
    targetqs.append_pair("appid", app_id);
    if let Some(record_id) = record_id {
        targetqs.append_pair("extrecordid", record_id);
    }
    redirect_url(shell_server, AUTH_TARGET, &targetqs.finish())
}

/// URL signing the user out of the shell
pub fn signout_url(shell_server: &str, app_id: &str, callback: Option<&str>) -> String {
    let mut targetqs = form_urlencoded::Serializer::new(String::new());
    if let Some(callback) = callback {
        targetqs.append_pair("redirect", callback);
    }
    targetqs.append_pair("appid", app_id);
    redirect_url(shell_server, SIGNOUT_TARGET, &targetqs.finish())
}
