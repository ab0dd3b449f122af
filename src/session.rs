use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::auth::{Credential, CredentialResolver, OAuthRefresher};
use crate::config::ClientConfig;
use crate::error::{Result, translate};
use crate::http::{ReqwestTransport, Request, Response, Transport};

/// Authenticated request pipeline shared by the API clients.
///
/// Every request goes through [`Session::execute`]: the credential is
/// attached, the transport runs the exchange, and non-2xx responses are
/// turned into typed errors. Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    credential: Credential,
    http: reqwest::Client,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a pooled HTTP transport and resolves a credential (explicit
    /// key, environment, secret file). Token refreshes share the transport's
    /// timeout and TLS settings.
    pub async fn new(config: &ClientConfig, key: Option<&str>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout, config.verify)?;
        let http = transport.client().clone();
        let refresher = OAuthRefresher::with_client(config.auth.oauth.clone(), http.clone());
        let credential = CredentialResolver::new(config.auth.clone())
            .with_refresher(Arc::new(refresher))
            .resolve(key)
            .await?;
        Ok(Self {
            transport: Arc::new(transport),
            credential,
            http,
        })
    }

    /// Uses a caller-supplied transport, e.g. a fake in tests.
    pub fn with_transport(transport: Arc<dyn Transport>, credential: Credential) -> Self {
        Self {
            transport,
            credential,
            http: reqwest::Client::new(),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Client used for streaming downloads, which bypass [`Transport`].
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let request = self.credential.authorize(request);
        let response = self.transport.send(request).await?;
        if let Some(err) = translate(response.status, &response.body) {
            debug!(status = response.status, error = %err, "request failed");
            return Err(err);
        }
        Ok(response)
    }
}
