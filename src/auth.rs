//! Credential resolution.
//!
//! A credential is looked up in order: explicit key, environment variable,
//! secret file. The first source that yields one wins and lower sources are
//! not touched. Tokens read from the secret file are refreshed (and written
//! back) when they have expired.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, OAuthConfig};
use crate::error::{Error, Result};
use crate::http::Request;
use crate::secret::{Document, SecretFile};

const KEY_FIELD: &str = "key";
const ACCESS_TOKEN_FIELD: &str = "access_token";
const REFRESH_TOKEN_FIELD: &str = "refresh_token";
const EXPIRES_ON_FIELD: &str = "expires_on";

/// OAuth token triple as stored in the secret file.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry, epoch seconds UTC.
    pub expires_on: i64,
}

impl TokenSet {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_on
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw API key, sent as basic auth with an empty password.
    ApiKey(String),
    /// OAuth access token, sent as a bearer token.
    Token(TokenSet),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::Token(t) => f.debug_tuple("Token").field(t).finish(),
        }
    }
}

impl Credential {
    /// Builds an API key credential. Empty keys are rejected.
    pub fn api_key(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::Auth("API key cannot be empty.".to_string()));
        }
        Ok(Credential::ApiKey(key))
    }

    pub fn header_value(&self) -> String {
        match self {
            Credential::ApiKey(key) => format!("Basic {}", STANDARD.encode(format!("{key}:"))),
            Credential::Token(t) => format!("Bearer {}", t.access_token),
        }
    }

    /// Returns `request` with an `Authorization` header attached.
    pub fn authorize(&self, request: Request) -> Request {
        request.with_header("Authorization", self.header_value())
    }

    pub fn to_document(&self) -> Document {
        let value = match self {
            Credential::ApiKey(key) => json!({ KEY_FIELD: key }),
            Credential::Token(t) => json!({
                EXPIRES_ON_FIELD: t.expires_on,
                ACCESS_TOKEN_FIELD: t.access_token,
                REFRESH_TOKEN_FIELD: t.refresh_token,
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    /// `None` when the document holds neither a key nor a full token triple.
    pub fn from_document(doc: &Document) -> Option<Self> {
        if let Some(key) = doc.get(KEY_FIELD).and_then(Value::as_str) {
            return Credential::api_key(key).ok();
        }

        let access_token = doc.get(ACCESS_TOKEN_FIELD)?.as_str()?;
        let refresh_token = doc.get(REFRESH_TOKEN_FIELD)?.as_str()?;
        let expires_on = as_epoch(doc.get(EXPIRES_ON_FIELD)?)?;
        Some(Credential::Token(TokenSet {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_on,
        }))
    }

    /// Merges this credential into the secret file.
    pub async fn write(&self, secrets: &SecretFile) -> Result<()> {
        secrets.write(&self.to_document()).await
    }
}

/// New token pair returned by the OAuth endpoint.
#[derive(Clone, serde::Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens>;
}

/// Refreshes tokens against `https://{host}/oauth2/{auth_server_id}/v1/token`.
#[derive(Debug, Clone)]
pub struct OAuthRefresher {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthRefresher {
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Sends refresh requests through `http`, so they share its timeout and
    /// TLS settings.
    pub fn with_client(config: OAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        let url = self.config.token_url();
        debug!(url = %url, "refreshing access token");

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token refresh failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Auth(format!("token refresh failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token refresh failed: HTTP {}\n{}",
                status.as_u16(),
                text
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Auth(format!("unexpected token refresh response: {e}")))
    }
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Env,
    File,
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves a [`Credential`] from the sources named in [`AuthConfig`].
#[derive(Clone)]
pub struct CredentialResolver {
    config: AuthConfig,
    refresher: Arc<dyn TokenRefresher>,
    env: EnvLookup,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    pub fn new(config: AuthConfig) -> Self {
        let refresher = Arc::new(OAuthRefresher::new(config.oauth.clone()));
        Self {
            config,
            refresher,
            env: Arc::new(|name: &str| std::env::var(name).ok()),
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    /// Replaces the process environment as the source of `AuthConfig::env_var`.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn secret_file(&self) -> SecretFile {
        SecretFile::new(&self.config.secret_path)
    }

    /// Resolves using (in order of precedence):
    /// - `explicit`, if given (an empty key is an error, not a fall-through)
    /// - the environment variable `AuthConfig::env_var`
    /// - the secret file `AuthConfig::secret_path`
    pub async fn resolve(&self, explicit: Option<&str>) -> Result<Credential> {
        if let Some(key) = explicit {
            let credential = Self::from_key(key)?;
            debug!("auth obtained from explicit api key");
            return Ok(credential);
        }

        for source in [Source::Env, Source::File] {
            let attempt = match source {
                Source::Env => self.try_env(),
                Source::File => self.try_file().await?,
            };
            if let Some(credential) = attempt {
                return Ok(credential);
            }
            debug!(?source, "no credential from source");
        }

        Err(Error::Auth(format!(
            "Could not find authentication information. Set environment variable {} \
             or store information in secret file {}",
            self.config.env_var,
            self.config.secret_path.display()
        )))
    }

    pub fn from_key(key: &str) -> Result<Credential> {
        Credential::api_key(key)
    }

    pub fn env_credential(&self) -> Result<Credential> {
        self.try_env().ok_or_else(|| {
            Error::Auth(format!(
                "Environment variable {} either does not exist or is empty.",
                self.config.env_var
            ))
        })
    }

    pub async fn file_credential(&self) -> Result<Credential> {
        self.try_file().await?.ok_or_else(|| {
            Error::Auth(format!(
                "File {} does not exist.",
                self.config.secret_path.display()
            ))
        })
    }

    fn try_env(&self) -> Option<Credential> {
        let value = (self.env)(&self.config.env_var)?;
        let credential = Credential::api_key(value).ok()?;
        info!(variable = %self.config.env_var, "auth set from environment variable");
        Some(credential)
    }

    /// `Ok(None)` when the file is absent; malformed content is an error.
    async fn try_file(&self) -> Result<Option<Credential>> {
        let secrets = self.secret_file();
        let path = secrets.path().display().to_string();

        let doc = match secrets.read().await {
            Ok(doc) => doc,
            Err(Error::SecretNotFound(_)) => return Ok(None),
            Err(Error::Json(e)) => {
                return Err(Error::Auth(format!(
                    "File {path} is not the correct format: {e}"
                )));
            }
            Err(e) => return Err(e),
        };

        let credential = Credential::from_document(&doc)
            .ok_or_else(|| Error::Auth(format!("File {path} is not the correct format.")))?;
        debug!(path = %path, "auth read from secret file");

        match credential {
            Credential::Token(tokens) if tokens.is_expired_at(chrono::Utc::now().timestamp()) => {
                warn!(expires_on = tokens.expires_on, "access token expired");
                self.refresh(&secrets, &tokens).await.map(Some)
            }
            other => Ok(Some(other)),
        }
    }

    async fn refresh(&self, secrets: &SecretFile, tokens: &TokenSet) -> Result<Credential> {
        info!("refreshing the access token");
        let fresh = self
            .refresher
            .refresh(&tokens.refresh_token)
            .await
            .map_err(|e| match e {
                Error::Auth(_) => e,
                other => Error::Auth(format!("token refresh failed: {other}")),
            })?;

        let expires_on = token_claim(&fresh.access_token, "exp")
            .as_ref()
            .and_then(as_epoch)
            .ok_or_else(|| {
                Error::Auth("refreshed access token carries no exp claim".to_string())
            })?;

        let credential = Credential::Token(TokenSet {
            access_token: fresh.access_token,
            refresh_token: fresh.refresh_token,
            expires_on,
        });
        credential.write(secrets).await?;
        info!(expires_on, "access token refreshed");
        Ok(credential)
    }
}

/// Reads one claim from a JWT payload without verifying the signature.
pub(crate) fn token_claim(token: &str, claim: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get(claim).cloned()
}

fn as_epoch(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(Credential::api_key(""), Err(Error::Auth(_))));
        assert!(matches!(CredentialResolver::from_key(""), Err(Error::Auth(_))));
    }

    #[test]
    fn api_key_is_sent_as_basic_auth() {
        let req = Credential::api_key("abc").unwrap().authorize(Request::get("http://h/"));
        // base64("abc:")
        assert_eq!(
            req.headers,
            vec![("Authorization".to_string(), "Basic YWJjOg==".to_string())]
        );
    }

    #[test]
    fn token_is_sent_as_bearer() {
        let cred = Credential::Token(TokenSet {
            access_token: "tok".to_string(),
            refresh_token: "ref".to_string(),
            expires_on: 0,
        });
        assert_eq!(cred.header_value(), "Bearer tok");
    }

    #[test]
    fn document_round_trip_for_both_variants() {
        let key = Credential::api_key("k").unwrap();
        assert_eq!(Credential::from_document(&key.to_document()), Some(key));

        let token = Credential::Token(TokenSet {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_on: 1_700_000_000,
        });
        assert_eq!(Credential::from_document(&token.to_document()), Some(token));
    }

    #[test]
    fn incomplete_document_is_rejected() {
        let doc = match json!({"access_token": "a"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(Credential::from_document(&doc), None);
        assert_eq!(Credential::from_document(&Document::new()), None);
    }

    #[test]
    fn exp_claim_is_read_from_payload() {
        let token = jwt(json!({"sub": "me", "exp": 1_800_000_000}));
        assert_eq!(token_claim(&token, "exp"), Some(json!(1_800_000_000)));
        assert_eq!(token_claim(&token, "missing"), None);
        assert_eq!(token_claim("not-a-jwt", "exp"), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cred = Credential::api_key("super-secret").unwrap();
        assert!(!format!("{cred:?}").contains("super-secret"));
    }
}
