//! Platform status codes and their classification
//!
//! Every response carries `<status><code>`. Zero is success; two codes get
//! dedicated error kinds so callers can tell "send the user back through
//! authorization" apart from everything else.

use std::fmt;

/// Semantic category of a non-zero status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential or authenticated session token expired.
    TokenExpired,
    /// The person or application lacks rights, e.g. authorization was revoked.
    AccessDenied,
    /// Any other platform failure.
    Platform,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TokenExpired => "token expired",
            Self::AccessDenied => "access denied",
            Self::Platform => "platform error",
        };
        f.write_str(name)
    }
}

/// Map a status code to its error kind. Never fails; unknown codes are `Platform`.
pub const fn classify(code: i32) -> ErrorKind {
    match code {
        codes::CREDENTIAL_TOKEN_EXPIRED | codes::AUTHENTICATED_SESSION_TOKEN_EXPIRED => {
            ErrorKind::TokenExpired
        }
        codes::ACCESS_DENIED => ErrorKind::AccessDenied,
        _ => ErrorKind::Platform,
    }
}

macro_rules! status_codes {
    ($($name:ident = $value:literal,)*) => {
        /// Named status codes returned by the platform.
        pub mod codes {
            $(pub const $name: i32 = $value;)*
        }

        /// Symbolic name of a status code, for diagnostics.
        pub fn status_name(code: i32) -> Option<&'static str> {
            match code {
                $($value => Some(stringify!($name)),)*
                _ => None,
            }
        }
    };
}

status_codes! {
    OK = 0,
    FAILED = 1,
    BAD_HTTP = 2,
    INVALID_XML = 3,
    BAD_SIG = 4,
    BAD_METHOD = 5,
    INVALID_APP = 6,
    CREDENTIAL_TOKEN_EXPIRED = 7,
    INVALID_TOKEN = 8,
    INVALID_PERSON = 9,
    INVALID_RECORD = 10,
    ACCESS_DENIED = 11,
    NYI = 12,
    INVALID_THING = 13,
    CANT_CONVERT_UNITS = 14,
    INVALID_FILTER = 15,
    INVALID_FORMAT = 16,
    MISSING_SHARED_SECRET = 17,
    INVALID_APPAUTH = 18,
    INVALID_THING_TYPE = 19,
    THING_TYPE_IMMUTABLE = 20,
    THING_TYPE_UNCREATABLE = 21,
    DUPLICATE_CREDENTIAL_FOUND = 22,
    INVALID_RECORD_NAME = 23,
    DRUG_NOT_FOUND = 24,
    INVALID_PERSON_STATE = 25,
    INVALID_CODESET = 26,
    INVALID_VALIDATION_TOKEN = 28,
    INVALID_CONTACT_EMAIL = 30,
    INVALID_LOGIN_NAME = 31,
    INVALID_PASSWORD = 32,
    INVALID_OPENQUERY = 33,
    INVALID_TRANSFORM = 34,
    INVALID_RELATIONSHIP_TYPE = 35,
    INVALID_CREDENTIAL_TYPE = 36,
    INVALID_RECORD_STATE = 37,
    APP_AUTH_NOT_REQUIRED = 38,
    REQUEST_TOO_LONG = 39,
    DUPLICATE_AUTHORIZED_RECORD_FOUND = 40,
    EMAIL_NOT_VALIDATED = 41,
    MAIL_ADDRESS_MALFORMED = 45,
    PASSWORD_NOT_STRONG = 46,
    CANNOT_REMOVE_LAST_CUSTODIAN = 47,
    INVALID_EMAIL_ADDRESS = 48,
    REQUEST_TIMED_OUT = 49,
    INVALID_SPONSOR_EMAIL = 50,
    INVALID_PROMOTION_TOKEN = 51,
    INVALID_RECORD_AUTHORIZATION_TOKEN = 52,
    TOO_MANY_GROUPS_IN_QUERY = 53,
    GRANT_AUTHZ_EXCEEDS_DEFAULT = 54,
    INVALID_VOCABULARY = 55,
    DUPLICATE_APPLICATION_FOUND = 56,
    RECORD_AUTHORIZATION_TOKEN_EXPIRED = 57,
    RECORD_AUTHORIZATION_DOES_NOT_EXIST = 58,
    THING_TYPE_UNDELETABLE = 59,
    VERSION_STAMP_MISSING = 60,
    VERSION_STAMP_MISMATCH = 61,
    EXPIRED_OPENQUERY = 62,
    INVALID_PUBLIC_KEY = 63,
    DOMAIN_NAME_NOT_SET = 64,
    AUTHENTICATED_SESSION_TOKEN_EXPIRED = 65,
    INVALID_CREDENTIAL_KEY = 66,
    INVALID_PERSON_ID = 67,
    RECORD_QUOTA_EXCEEDED = 68,
    INVALID_DATETIME = 69,
    BAD_CERT = 70,
    RESPONSE_TOO_LONG = 71,
    INVALID_VERIFICATION_QUESTION = 72,
    INVALID_VERIFICATION_ANSWER = 73,
    INVALID_IDENTITY_CODE = 74,
    RETRY_LIMIT_EXCEEDED = 75,
    CULTURE_NOT_SUPPORTED = 76,
    INVALID_FILE_EXTENSION = 77,
    INVALID_VOCABULARY_ITEM = 78,
    DUPLICATE_CONNECT_REQUEST_FOUND = 79,
    INVALID_SPECIAL_ACCOUNT_TYPE = 80,
    DUPLICATE_TYPE_FOUND = 81,
    CREDENTIAL_NOT_FOUND = 82,
    CANNOT_REMOVE_LAST_CREDENTIAL = 83,
    CONNECT_REQUEST_ALREADY_AUTHORIZED = 84,
    INVALID_THING_TYPE_VERSION = 85,
    CREDENTIALS_LIMIT_EXCEEDED = 86,
    INVALID_METHOD = 87,
    INVALID_BLOB_REF_URL = 88,
    CANNOT_GET_STREAMED_OTHER_DATA = 89,
    UPDATE_THING_TYPE_VERSION_NO_DATA_XML = 90,
    UNSUPPORTED_CONTENT_ENCODING = 91,
    CONTENT_ENCODING_DATA_MISMATCH = 92,
    APPLICATION_LIMIT_EXCEEDED = 93,
    INVALID_BINARY_CONTENT_ID = 94,
    CONNECT_REQUEST_INCOMPLETE = 95,
    CONNECT_PACKAGE_EXISTS = 96,
    INVALID_FILE_NAME = 97,
    INVALID_SIGNUP_CODE = 98,
    BLOB_SIZE_TOO_LARGE_FOR_INLINE = 99,
    DUPLICATE_BLOB = 100,
    BLOB_TOKEN_COMMITTED = 101,
    BLOB_TOKEN_NOT_COMPLETED = 102,
    THING_POTENTIALLY_INCOMPLETE = 104,
    INVALID_SIGNATURE_ALGORITHM = 105,
    INVALID_BLOB_HASH_ALGORITHM = 106,
    UNSUPPORTED_BLOB_HASH_BLOCK_SIZE = 107,
    BLOB_HASH_ALGORITHM_MISMATCH = 108,
    BLOB_HASH_BLOCK_SIZE_MISMATCH = 109,
    UNSUPPORTED_SIGNATURE_METHOD = 110,
    INVALID_BLOB_HASH = 111,
    PACKAGE_BLOB_NOT_COMMITTED = 112,
    APPLICATION_STATE_TRANSITION_NOT_SUPPORTED = 113,
    INVALID_PACKAGE_CONTENTS = 120,
    INVALID_CONTENT_TYPE = 121,
    CONNECT_PACKAGE_VALIDATION_REQUIRED = 122,
    INVALID_THING_STATE = 123,
    TOO_MANY_THINGS_SPECIFIED = 124,
    INVALID_DIRECTORY_ITEM = 126,
    INVALID_VOCABULARY_AUTHORIZATION = 129,
    VOCABULARY_ACCESS_DENIED = 130,
    UNSUPPORTED_PERSONAL_FLAG = 131,
    SUBSCRIPTION_NOT_FOUND = 132,
    SUBSCRIPTION_LIMIT_EXCEEDED = 133,
    SUBSCRIPTION_INVALID = 134,
}
