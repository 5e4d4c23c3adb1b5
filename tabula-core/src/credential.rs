//! Credential decoding and auth header synthesis.
//!
//! Credentials arrive as `{kind, value}` pairs. [`Credential::from_spec`]
//! decodes them once into a closed set of variants; [`Credential::auth_headers`]
//! turns a variant into the headers sent upstream.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::headers::HeaderSet;

/// Header used for API keys when the credential does not name one.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Credential exactly as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// One of `bearer`, `api-key` or `basic`.
    #[serde(alias = "type")]
    pub kind: String,
    /// Secret material; JSON for structured API keys and basic auth.
    pub value: String,
}

impl CredentialSpec {
    /// Construct a credential spec.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyValue {
    #[serde(default)]
    header: Option<String>,
    api_key: String,
}

#[derive(Deserialize)]
struct BasicValue {
    username: String,
    password: String,
}

/// Decoded credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// A key sent in a named header.
    ApiKey {
        /// Header name.
        header: String,
        /// Key value.
        key: String,
    },
    /// HTTP basic auth from a username and password.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// HTTP basic auth supplied already encoded.
    BasicEncoded(String),
    /// A kind this service does not understand.
    Unknown {
        /// Kind as supplied.
        kind: String,
    },
    /// A known kind supplied without a value.
    Empty {
        /// Kind as supplied.
        kind: String,
    },
}

impl Credential {
    /// Decode a caller supplied credential.
    ///
    /// Structured values that fail to parse fall back to the raw string:
    /// an API key is sent in [`DEFAULT_API_KEY_HEADER`] and a basic
    /// credential is treated as already encoded.
    #[must_use]
    pub fn from_spec(spec: &CredentialSpec) -> Self {
        let kind = spec.kind.trim().to_ascii_lowercase();
        if !matches!(kind.as_str(), "bearer" | "api-key" | "basic") {
            return Self::Unknown {
                kind: spec.kind.clone(),
            };
        }
        if spec.value.is_empty() {
            return Self::Empty {
                kind: spec.kind.clone(),
            };
        }
        match kind.as_str() {
            "bearer" => Self::Bearer(spec.value.clone()),
            "api-key" => match serde_json::from_str::<ApiKeyValue>(&spec.value) {
                Ok(parsed) => Self::ApiKey {
                    header: parsed
                        .header
                        .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_owned()),
                    key: parsed.api_key,
                },
                Err(_) => Self::ApiKey {
                    header: DEFAULT_API_KEY_HEADER.to_owned(),
                    key: spec.value.clone(),
                },
            },
            _ => match serde_json::from_str::<BasicValue>(&spec.value) {
                Ok(parsed) => Self::Basic {
                    username: parsed.username,
                    password: parsed.password,
                },
                Err(_) => Self::BasicEncoded(spec.value.clone()),
            },
        }
    }

    /// Headers carrying this credential.
    ///
    /// Unknown and empty credentials add nothing and log a warning.
    #[must_use]
    pub fn auth_headers(&self) -> HeaderSet {
        match self {
            Self::Bearer(token) => {
                HeaderSet::new().with("Authorization", format!("Bearer {token}"))
            }
            Self::ApiKey { header, key } => HeaderSet::new().with(header.as_str(), key.as_str()),
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                HeaderSet::new().with("Authorization", format!("Basic {encoded}"))
            }
            Self::BasicEncoded(encoded) => {
                HeaderSet::new().with("Authorization", format!("Basic {encoded}"))
            }
            Self::Unknown { kind } => {
                warn!("ignoring credential of unknown kind '{kind}'");
                HeaderSet::new()
            }
            Self::Empty { kind } => {
                warn!("ignoring '{kind}' credential with an empty value");
                HeaderSet::new()
            }
        }
    }
}

impl From<&CredentialSpec> for Credential {
    fn from(spec: &CredentialSpec) -> Self {
        Self::from_spec(spec)
    }
}

/// Combine caller headers with the auth headers of an optional credential.
///
/// Auth headers are applied last and win name clashes, ignoring case.
#[must_use]
pub fn request_headers(mut base: HeaderSet, credential: Option<&CredentialSpec>) -> HeaderSet {
    if let Some(spec) = credential {
        base.merge(
            Credential::from_spec(spec)
                .auth_headers()
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned())),
        );
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn headers_for(kind: &str, value: &str) -> Vec<(String, String)> {
        Credential::from_spec(&CredentialSpec::new(kind, value))
            .auth_headers()
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect()
    }

    fn pair(name: &str, value: &str) -> Vec<(String, String)> {
        vec![(name.to_owned(), value.to_owned())]
    }

    #[rstest]
    #[case("bearer", "tok", pair("Authorization", "Bearer tok"))]
    #[case("api-key", r#"{"header":"X-Custom","apiKey":"abc"}"#, pair("X-Custom", "abc"))]
    #[case("api-key", r#"{"apiKey":"abc"}"#, pair("X-API-Key", "abc"))]
    #[case("api-key", "raw-key", pair("X-API-Key", "raw-key"))]
    #[case(
        "basic",
        r#"{"username":"u","password":"p"}"#,
        pair("Authorization", "Basic dTpw")
    )]
    #[case("basic", "QWxhZGRpbg==", pair("Authorization", "Basic QWxhZGRpbg=="))]
    #[case("oauth", "whatever", vec![])]
    #[case("bearer", "", vec![])]
    fn synthesizes_auth_headers(
        #[case] kind: &str,
        #[case] value: &str,
        #[case] expected: Vec<(String, String)>,
    ) {
        assert_eq!(headers_for(kind, value), expected);
    }

    #[rstest]
    fn auth_header_wins_over_caller_header() {
        let base = HeaderSet::new()
            .with("Accept", "application/json")
            .with("authorization", "Token stale");
        let merged = request_headers(base, Some(&CredentialSpec::new("bearer", "fresh")));

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("Authorization"), Some("Bearer fresh"));
    }

    #[rstest]
    fn kind_matching_ignores_case() {
        assert_eq!(
            Credential::from_spec(&CredentialSpec::new("Bearer", "t")),
            Credential::Bearer("t".to_owned())
        );
    }
}
