use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Tokens expiring within this margin are treated as already expired.
const EXPIRY_SKEW_SECONDS: i64 = 10;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// An OAuth credential authorizing Gmail API calls.
///
/// Serialized in the Google "authorized user" layout so token files written
/// by other Google tooling can be read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_expiry")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// Google tooling writes the expiry either with a trailing `Z` or as a naive
// timestamp that is implicitly UTC.
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

impl Credential {
    /// True iff the access token is present and not expired at `now`.
    /// A credential without an expiry never expires.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) > now,
            None => true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid(now)
    }

    /// Whether this credential was granted every scope in `requested`.
    pub fn covers(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map_or(false, |token| !token.is_empty())
    }
}
