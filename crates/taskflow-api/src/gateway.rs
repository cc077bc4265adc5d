// Request gateway
//
// Wraps `reqwest::Client` with the task service's request pipeline:
// credential policy, CSRF header mirroring, bounded retry, and response
// body validation. Endpoint modules (tasks.rs) add inherent methods on
// top; this module stays focused on transport mechanics.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;

// ── Wire contract constants ──────────────────────────────────────────

/// Cookie the server sets with the anti-forgery token.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Header the token is mirrored into on every mutating request.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// A failed request is retried exactly once, after this delay.
const RETRY_DELAY: Duration = Duration::from_secs(1);

// ── CredentialPolicy ─────────────────────────────────────────────────

/// Whether requests carry stored cookies.
///
/// Mirrors the browser client's `withCredentials` switch: production
/// deployments are same-origin and omit explicit credentials, every
/// other profile includes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
    /// Attach a cookie jar; session and CSRF cookies are stored and sent.
    #[default]
    Include,
    /// No cookie jar; nothing is stored or sent.
    Omit,
}

// ── GatewayConfig ────────────────────────────────────────────────────

/// Configuration for building a [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Service root, e.g. `http://localhost:7777`.
    pub base_url: Url,
    pub credentials: CredentialPolicy,
    pub timeout: Duration,
    /// Pre-populated cookie jar. When `None` and the policy is
    /// [`CredentialPolicy::Include`], a fresh jar is created.
    pub cookie_jar: Option<Arc<Jar>>,
}

impl GatewayConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            credentials: CredentialPolicy::Include,
            timeout: Duration::from_secs(30),
            cookie_jar: None,
        }
    }

    /// Use a specific cookie jar (e.g. one shared with another client).
    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

/// HTTP client for the task service's request/response API.
///
/// Every call goes through one pipeline: build request → inject CSRF
/// header on mutating verbs → send with a single 1-second retry →
/// reject structurally empty bodies → deserialize. Cheaply cloneable.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: Url,
    jar: Option<Arc<Jar>>,
}

impl Gateway {
    /// Build a gateway from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        let jar = match config.credentials {
            CredentialPolicy::Include => {
                Some(config.cookie_jar.unwrap_or_else(|| Arc::new(Jar::default())))
            }
            CredentialPolicy::Omit => None,
        };

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("taskflow/0.1.0");

        if let Some(ref jar) = jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        let http = builder.build().map_err(Error::Transport)?;

        Ok(Self {
            http,
            base_url: config.base_url,
            jar,
        })
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Verb helpers ─────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        self.execute(self.http.get(url)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        self.execute(self.apply_csrf(self.http.post(url).json(body)))
            .await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("PUT {}", url);
        self.execute(self.apply_csrf(self.http.put(url).json(body)))
            .await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("PATCH {}", url);
        self.execute(self.apply_csrf(self.http.patch(url).json(body)))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("DELETE {}", url);
        self.execute(self.apply_csrf(self.http.delete(url))).await
    }

    // ── URL construction ─────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/{path}`.
    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(Error::InvalidUrl)
    }

    // ── CSRF mirroring ───────────────────────────────────────────────

    /// Read the anti-forgery token out of the cookie jar, if present.
    pub fn csrf_token(&self) -> Option<String> {
        let jar = self.jar.as_ref()?;
        let header = jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').map(str::trim).find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name == CSRF_COOKIE).then(|| value.to_owned())
        })
    }

    /// Mirror the CSRF cookie into the request header. Mutating verbs
    /// only; the server rejects unpaired cookie/header values.
    fn apply_csrf(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.csrf_token() {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    // ── Request pipeline ─────────────────────────────────────────────

    /// Send a request with the uniform retry/validation pipeline.
    ///
    /// Transport and status failures are retried exactly once after
    /// [`RETRY_DELAY`]; the second failure propagates. Body validation
    /// runs after the retry stage and is never retried.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let retry = request.try_clone();

        let response = match attempt(request).await {
            Ok(response) => response,
            Err(first) => {
                let Some(request) = retry else {
                    return Err(first);
                };
                debug!(error = %first, "request failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                attempt(request).await?
            }
        };

        validate(response).await
    }
}

/// One send, normalized to `Error` on transport failure or bad status.
async fn attempt(request: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
    let response = request.send().await.map_err(Error::Transport)?;
    let status = response.status();

    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }

    Ok(response)
}

/// Reject structurally empty bodies, then deserialize.
///
/// An empty body on a successful status is not considered valid for
/// this API: the server always acks with a message object.
async fn validate<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let body = response.text().await.map_err(Error::Transport)?;

    let value: serde_json::Value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?
    };

    if is_empty_body(&value) {
        return Err(Error::EmptyBody);
    }

    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// Structural emptiness: missing, `""`, `[]`, and `{}` all count.
fn is_empty_body(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
