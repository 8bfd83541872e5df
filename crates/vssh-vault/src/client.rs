// ABOUTME: HTTP client for the Vault API.
// ABOUTME: Implements VaultSession with token self-lookup, logins, OIDC and SSH signing.

use crate::error::{Result, VaultError};
use crate::session::{ttl_from_lookup, OidcChallenge, VaultSession, MIN_TOKEN_TTL};
use crate::token::SessionToken;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;
use vssh_config::VaultConfig;

/// Connect timeout for backend calls; the request timeout comes from config.
const CONNECT_TIMEOUT_SECS: u64 = 10;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Characters escaped when a user-supplied value becomes a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Generic Vault response envelope.
#[derive(Debug, Default, Deserialize)]
struct VaultResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    auth: Option<AuthInfo>,
}

#[derive(Debug, Deserialize)]
struct AuthInfo {
    client_token: String,
    #[serde(default)]
    lease_duration: Option<u64>,
}

/// Vault API client holding the current session token.
pub struct VaultClient {
    http: reqwest::Client,
    address: Url,
    namespace: Option<String>,
    token: Option<SessionToken>,
}

impl VaultClient {
    /// Create a client for the configured address and namespace.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let address = Url::parse(config.address.trim()).map_err(|e| VaultError::InvalidAddress {
            address: config.address.clone(),
            source: e,
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(VaultError::Client)?;

        let namespace = config
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(Self {
            http,
            address,
            namespace,
            token: None,
        })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.address.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.endpoint(path));
        if let Some(ref token) = self.token {
            builder = builder.header(TOKEN_HEADER, token.expose());
        }
        if let Some(ref namespace) = self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        builder
    }

    /// Send a request and decode the response envelope. `None` means the
    /// backend returned no body.
    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Option<VaultResponse>> {
        let response = builder.send().await.map_err(|e| VaultError::Request {
            path: path.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| VaultError::Request {
            path: path.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(VaultError::from_status(path, status, &body));
        }

        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| VaultError::Decode {
                path: path.to_string(),
                source: e,
            })
    }

    async fn read(&self, path: &str) -> Result<Option<VaultResponse>> {
        debug!(path, "Vault read");
        self.send(path, self.request(Method::GET, path)).await
    }

    async fn write(&self, path: &str, body: &Value) -> Result<Option<VaultResponse>> {
        debug!(path, "Vault write");
        self.send(path, self.request(Method::POST, path).json(body))
            .await
    }

    /// Remaining TTL of the current token according to `auth/token/lookup-self`.
    pub async fn lookup_self_ttl(&self) -> Result<Option<Duration>> {
        if self.token.is_none() {
            return Err(VaultError::NoToken);
        }
        let response = self.read("auth/token/lookup-self").await?;
        Ok(ttl_from_lookup(response.as_ref().and_then(|r| r.data.as_ref())))
    }
}

fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

fn client_token(response: Option<VaultResponse>, path: &str) -> Result<SessionToken> {
    let auth = response
        .and_then(|r| r.auth)
        .filter(|a| !a.client_token.trim().is_empty())
        .ok_or_else(|| VaultError::NoAuthData {
            path: path.to_string(),
        })?;

    debug!(
        path,
        lease_secs = auth.lease_duration.unwrap_or_default(),
        "Received client token"
    );
    Ok(SessionToken::new(auth.client_token))
}

#[async_trait]
impl VaultSession for VaultClient {
    fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    fn set_token(&mut self, token: SessionToken) {
        self.token = Some(token);
    }

    async fn is_token_valid(&self) -> bool {
        if self.token.is_none() {
            debug!("No token found");
            return false;
        }

        let ttl = match self.lookup_self_ttl().await {
            Ok(Some(ttl)) => ttl,
            Ok(None) => {
                debug!("Token TTL not found in lookup response");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "Token lookup failed");
                return false;
            }
        };

        if ttl < MIN_TOKEN_TTL {
            debug!(ttl_secs = ttl.as_secs(), "Token TTL too low");
            return false;
        }

        debug!(ttl_secs = ttl.as_secs(), "Token is valid");
        true
    }

    async fn sign(
        &self,
        mount: &str,
        role: &str,
        public_key: &str,
        ttl: Duration,
    ) -> Result<String> {
        let path = format!("{}/sign/{}", mount.trim_matches('/'), encode_segment(role));
        let body = json!({
            "public_key": public_key,
            "ttl": format!("{}s", ttl.as_secs()),
        });

        let data = self
            .write(&path, &body)
            .await?
            .and_then(|r| r.data)
            .ok_or_else(|| VaultError::SignNoData { path: path.clone() })?;

        data.get("signed_key")
            .and_then(Value::as_str)
            .filter(|key| !key.trim().is_empty())
            .map(str::to_string)
            .ok_or(VaultError::SignMissingKey { path })
    }

    async fn login(&self, mount: &str, identifier: &str, payload: Value) -> Result<SessionToken> {
        let path = format!(
            "auth/{}/login/{}",
            mount.trim_matches('/'),
            encode_segment(identifier)
        );
        let response = self.write(&path, &payload).await?;
        client_token(response, &path)
    }

    async fn oidc_auth_url(
        &self,
        mount: &str,
        role: &str,
        redirect_uri: &str,
    ) -> Result<OidcChallenge> {
        let path = format!("auth/{}/oidc/auth_url", mount.trim_matches('/'));
        let body = json!({
            "role": role,
            "redirect_uri": redirect_uri,
        });

        let no_url = || VaultError::NoAuthUrl { path: path.clone() };

        let data = self
            .write(&path, &body)
            .await?
            .and_then(|r| r.data)
            .ok_or_else(no_url)?;

        let auth_url = data
            .get("auth_url")
            .and_then(Value::as_str)
            .and_then(|raw| Url::parse(raw).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(no_url)?;

        let state = data
            .get("state")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                auth_url
                    .query_pairs()
                    .find(|(key, _)| key == "state")
                    .map(|(_, value)| value.into_owned())
            });

        Ok(OidcChallenge { auth_url, state })
    }

    async fn oidc_callback(
        &self,
        mount: &str,
        code: &str,
        state: Option<&str>,
    ) -> Result<SessionToken> {
        let path = format!("auth/{}/oidc/callback", mount.trim_matches('/'));
        let body = json!({
            "code": code,
            "state": state,
        });
        let response = self.write(&path, &body).await?;
        client_token(response, &path)
    }
}
