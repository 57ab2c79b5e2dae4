//! Long-lived upstream session: one HTTP client plus the cookie set
//! harvested from the bootstrap endpoint.
//!
//! The upstream tolerates cookie-less requests with reduced reliability, so a
//! bootstrap that yields no cookies is logged and otherwise ignored. A session
//! older than its lifetime, explicitly closed, or invalidated after a
//! transport failure is rebuilt on the next [`SessionManager::ensure_session`].
//!
//! Cookies are kept in an explicit map rather than reqwest's `cookies` jar.
//! The jar is tied to the client and cannot be listed, while a session here
//! must expose its cookie set and drop it together with the client on close.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{COOKIE, HeaderValue, SET_COOKIE};
use tokio::time::Instant;

use crate::error::{ConfigError, FetchError};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug)]
pub struct Session {
    client: Client,
    cookies: BTreeMap<String, String>,
    created_at: Instant,
}

impl Session {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.created_at.elapsed() >= lifetime
    }

    /// `Cookie` header for outgoing requests, or `None` for an empty jar.
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }

    /// Attach this session's cookies to a request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.cookie_header() {
            Some(header) => request.header(COOKIE, header),
            None => request,
        }
    }
}

pub struct SessionManager {
    bootstrap_url: String,
    lifetime: Duration,
    timeout: Duration,
    session: Option<Session>,
    /// Client built during validation, handed to the first session.
    prebuilt: Option<Client>,
    sessions_created: u32,
}

impl SessionManager {
    /// Builds the HTTP client up front so bad settings fail here. The first
    /// session reuses it and is created lazily.
    pub fn new(bootstrap_url: &str, lifetime: Duration, timeout: Duration) -> Result<Self, ConfigError> {
        let client = build_client(timeout)?;
        Ok(Self {
            bootstrap_url: bootstrap_url.to_string(),
            lifetime,
            timeout,
            session: None,
            prebuilt: Some(client),
            sessions_created: 0,
        })
    }

    /// Return a usable session, creating or recreating it when absent,
    /// closed, or older than its lifetime.
    pub async fn ensure_session(&mut self) -> Result<&Session, FetchError> {
        let stale = match &self.session {
            Some(session) => session.is_expired(self.lifetime),
            None => true,
        };
        if stale {
            if self.session.is_some() {
                tracing::info!("session older than {:?}, recreating", self.lifetime);
            }
            self.close_session();
            let session = self.create_session().await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| FetchError::Session("session unavailable after creation".to_string()))
    }

    /// Drop the HTTP client (releasing pooled connections) and clear cookies.
    pub fn close_session(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("session closed");
        }
    }

    /// Mark the current session broken so the next call rebuilds it. Used
    /// after transport failures and rejected credentials.
    pub fn invalidate(&mut self) {
        if self.session.is_some() {
            tracing::info!("invalidating broken session");
        }
        self.close_session();
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn sessions_created(&self) -> u32 {
        self.sessions_created
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn create_session(&mut self) -> Result<Session, FetchError> {
        let client = match self.prebuilt.take() {
            Some(client) => client,
            None => build_client(self.timeout)
                .map_err(|e| FetchError::Session(format!("failed to build HTTP client: {e}")))?,
        };

        let cookies = match client.get(&self.bootstrap_url).send().await {
            Ok(response) => {
                let status = response.status();
                let cookies = harvest_cookies(response.headers().get_all(SET_COOKIE));
                if !status.is_success() {
                    tracing::warn!("cookie bootstrap returned HTTP {status}");
                }
                if cookies.is_empty() {
                    tracing::warn!("cookie bootstrap yielded no cookies, continuing without");
                }
                cookies
            }
            Err(e) => {
                let err = FetchError::Session(e.to_string());
                tracing::warn!("{err}, continuing without cookies");
                BTreeMap::new()
            }
        };

        self.sessions_created += 1;
        tracing::info!(
            cookies = cookies.len(),
            "created upstream session #{}",
            self.sessions_created
        );
        Ok(Session {
            client,
            cookies,
            created_at: Instant::now(),
        })
    }
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .pool_max_idle_per_host(1)
        .build()
}

/// Collect `name=value` pairs from `Set-Cookie` headers, dropping attributes.
/// Later headers win for repeated names.
pub fn harvest_cookies<'a>(
    headers: impl IntoIterator<Item = &'a HeaderValue>,
) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for header in headers {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        let pair = raw.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}
