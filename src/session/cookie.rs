use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE_NAME: &str = "session";

/// CookieConfig
///
/// How the session cookie is named and flagged. `secure` is turned on for
/// production deployments served over HTTPS.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub secret: String,
}

impl CookieConfig {
    pub fn new(secret: impl Into<String>, secure: bool) -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            secure,
            secret: secret.into(),
        }
    }
}

/// Envelope signed into the cookie value. `sid` is the store token.
#[derive(Debug, Serialize, Deserialize)]
struct CookieClaims {
    sid: String,
    exp: usize,
    iat: usize,
}

/// SessionCookie
///
/// Signs the opaque store token for the browser and reads it back. A cookie that
/// fails signature or expiry validation is indistinguishable from no cookie at all.
#[derive(Clone)]
pub struct SessionCookie {
    config: CookieConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionCookie {
    pub fn new(config: CookieConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Wraps `token` in a signed value expiring together with the session.
    pub fn seal(&self, token: &str, expires_at: DateTime<Utc>) -> Option<String> {
        let claims = CookieClaims {
            sid: token.to_string(),
            exp: expires_at.timestamp().max(0) as usize,
            iat: Utc::now().timestamp().max(0) as usize,
        };
        match encode(&Header::default(), &claims, &self.encoding_key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("failed to sign session cookie: {:?}", e);
                None
            }
        }
    }

    /// Recovers the store token from a cookie value.
    pub fn open(&self, value: &str) -> Option<String> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        match decode::<CookieClaims>(value, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims.sid),
            Err(e) => {
                tracing::debug!("rejected session cookie: {:?}", e.kind());
                None
            }
        }
    }

    /// Finds this cookie among the request's `Cookie` headers.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.config.name)
            .map(|(_, value)| value.trim_matches('"').to_string())
    }

    /// `Set-Cookie` value carrying `value` for `max_age` seconds.
    pub fn set_header(&self, value: &str, max_age: i64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.config.name,
            value,
            max_age.max(0)
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }

    /// `Set-Cookie` value that makes the browser drop the cookie.
    pub fn removal_header(&self) -> Option<HeaderValue> {
        self.set_header("", 0)
    }
}
