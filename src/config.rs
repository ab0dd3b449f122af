use std::path::PathBuf;
use std::time::Duration;

/// Production Data API root.
pub const DEFAULT_BASE_URL: &str = "https://api.planet.com/";

/// Environment variable holding a raw API key.
pub const ENV_API_KEY: &str = "PL_API_KEY";

const SECRET_FILE_NAME: &str = ".planet.json";

/// Settings for the OAuth token endpoint used to refresh stored tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub host: String,
    pub auth_server_id: String,
    pub client_id: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            host: "account.planet.com".to_string(),
            auth_server_id: "aus2enhwueFYRb50S4x7".to_string(),
            client_id: "0oa2scq915nekGLum4x7".to_string(),
        }
    }
}

impl OAuthConfig {
    pub fn token_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        format!("{}/oauth2/{}/v1/token", base, self.auth_server_id)
    }
}

/// Where credentials come from.
///
/// Threaded through [`CredentialResolver`](crate::CredentialResolver)
/// instead of being read from globals, so tests can point at their own
/// variable name and secret file.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Name of the environment variable checked after an explicit key.
    pub env_var: String,
    /// JSON secret file checked last.
    pub secret_path: PathBuf,
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env_var: ENV_API_KEY.to_string(),
            secret_path: default_secret_path(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    pub fn with_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secret_path = path.into();
        self
    }

    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = oauth;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.planet.com/`. A trailing `/` is added if missing.
    pub base_url: String,
    pub auth: AuthConfig,
    /// Transport timeout per HTTP exchange.
    pub timeout: Duration,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Show a progress bar while downloading assets.
    pub progress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: AuthConfig::default(),
            timeout: Duration::from_secs(60),
            verify: true,
            progress: true,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// `~/.planet.json`, or `./.planet.json` when no home directory is known.
pub fn default_secret_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(SECRET_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SECRET_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_is_built_from_host_and_server() {
        let oauth = OAuthConfig::default();
        assert_eq!(
            oauth.token_url(),
            "https://account.planet.com/oauth2/aus2enhwueFYRb50S4x7/v1/token"
        );
    }

    #[test]
    fn token_url_keeps_explicit_scheme() {
        let oauth = OAuthConfig {
            host: "http://127.0.0.1:9000/".to_string(),
            auth_server_id: "srv".to_string(),
            client_id: "cid".to_string(),
        };
        assert_eq!(oauth.token_url(), "http://127.0.0.1:9000/oauth2/srv/v1/token");
    }

    #[test]
    fn secret_path_ends_with_file_name() {
        assert!(default_secret_path().ends_with(SECRET_FILE_NAME));
    }
}
