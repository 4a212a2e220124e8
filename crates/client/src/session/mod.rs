//! Session-protected catalog client.
//!
//! The catalog only answers item lookups inside a session negotiated through
//! a three-step handshake:
//!
//! 1. `GET {base}/f?p=171`: hidden `pInstance` and `pPageSubmissionId` inputs
//! 2. `POST {base}/wwv_flow.accept`: submit them to advance the flow
//! 3. `GET {base}/f?p=171:2:{session}:NEXT:NO:2:P2_CURSOR:B`: page carrying
//!    the `PLUGIN=` ajax identifier
//!
//! Item lookups are form posts to `{base}/wwv_flow.show`. Sessions expire
//! silently, so a lookup that cannot be parsed triggers one reauthentication
//! and one retry. The catalog's explicit "no such item" answer is not a
//! failure and never reauthenticates.
//!
//! Refreshes are single-flight: callers that find a refresh in progress wait
//! for it and share its outcome instead of starting another handshake. That
//! holds for a failed handshake too; its waiters get its error.

pub mod bootstrap;
pub mod error;
pub mod item;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricetag_core::{AppConfig, Error, Product, ProductSource};
use reqwest::{StatusCode, header};
use tokio::sync::{Mutex, RwLock};

pub use bootstrap::{BootstrapForm, mine_ajax_token};
pub use error::SessionError;
pub use state::{Session, SessionStatus};

use item::{item_form, parse_item};
use state::SessionSlot;

pub(crate) const FLOW_ID: &str = "171";
const BOOTSTRAP_STEP_ID: &str = "1";

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "pricetag/0.1";

/// Catalog client configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the catalog application, without trailing slash.
    pub base_url: String,
    /// User-agent string (default: pricetag/0.1).
    pub user_agent: String,
    /// Connect timeout (default: 3s).
    pub connect_timeout: Duration,
    /// Whole-request timeout (default: 8s).
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://consulta.example.com/apex".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.catalog_base_url.clone(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
        }
    }
}

/// A lookup that failed, with the epoch of the session or handshake it depended on.
struct AttemptError {
    epoch: u64,
    error: SessionError,
}

/// Catalog client that keeps one shared session alive.
#[derive(Debug)]
pub struct SessionClient {
    http: reqwest::Client,
    config: SessionConfig,
    slot: RwLock<SessionSlot>,
    refresh_gate: Mutex<()>,
}

impl SessionClient {
    /// Create a new client. No request is made until the first lookup.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .cookie_store(true)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| SessionError::Network(Arc::new(e)))?;

        Ok(Self { http, config, slot: RwLock::new(SessionSlot::new()), refresh_gate: Mutex::new(()) })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn status(&self) -> SessionStatus {
        self.slot.read().await.status
    }

    /// The current session, negotiating one first if none is ready.
    pub async fn get_session(&self) -> Result<Arc<Session>, SessionError> {
        self.current().await.map_err(|failed| failed.error)
    }

    /// Negotiate a new session, replacing the current one.
    ///
    /// If another caller completes a refresh while this one waits for the
    /// gate, its outcome is returned instead of running a second handshake.
    pub async fn reload_session(&self) -> Result<Arc<Session>, SessionError> {
        let seen = self.slot.read().await.last_epoch;
        self.refresh(seen).await.map_err(|failed| failed.error)
    }

    /// Look a product up by scan code.
    ///
    /// `Ok(None)` is the catalog saying the code is unknown. Any other failure
    /// reauthenticates once and retries once; a second failure is returned as
    /// [`Error::Fetch`].
    pub async fn fetch_by_code(&self, code: &str) -> Result<Option<Product>, Error> {
        let failed = match self.attempt(code).await {
            Ok(product) => return Ok(product),
            Err(failed) => failed,
        };

        tracing::warn!(
            code,
            attempt = 1,
            epoch = failed.epoch,
            error = %failed.error,
            "catalog lookup failed, reauthenticating"
        );
        self.refresh(failed.epoch).await.map_err(|failed| Error::from(failed.error))?;

        self.attempt(code).await.map_err(|failed| {
            tracing::error!(code, attempt = 2, error = %failed.error, "catalog lookup failed after reauthentication");
            Error::Fetch(format!("{code}: {}", failed.error))
        })
    }

    async fn current(&self) -> Result<Arc<Session>, AttemptError> {
        let (ready, seen) = {
            let slot = self.slot.read().await;
            (slot.ready(), slot.last_epoch)
        };
        match ready {
            Some(session) => Ok(session),
            None => self.refresh(seen).await,
        }
    }

    /// Single-flight refresh.
    ///
    /// `seen` is the last handshake epoch the caller knows about. When a newer
    /// handshake has finished by the time the gate is taken, its outcome is
    /// shared, failures included, and no new handshake runs.
    async fn refresh(&self, seen: u64) -> Result<Arc<Session>, AttemptError> {
        let _gate = self.refresh_gate.lock().await;

        {
            let mut slot = self.slot.write().await;
            if slot.last_epoch > seen {
                let epoch = slot.last_epoch;
                tracing::debug!(epoch, "reusing handshake outcome from another caller");
                return slot.outcome().map_err(|error| AttemptError { epoch, error });
            }
            slot.status =
                if slot.session.is_some() { SessionStatus::Refreshing } else { SessionStatus::Authenticating };
        }

        match self.handshake().await {
            Ok((session_id, ajax_token)) => {
                let session = self.slot.write().await.install(session_id, ajax_token);
                tracing::info!(epoch = session.epoch, "catalog session established");
                Ok(session)
            }
            Err(error) => {
                let epoch = self.slot.write().await.fail(error.clone());
                tracing::warn!(epoch, error = %error, "catalog session handshake failed");
                Err(AttemptError { epoch, error })
            }
        }
    }

    async fn handshake(&self) -> Result<(String, String), SessionError> {
        let base = self.base_url();

        let page = self.get_text(&format!("{base}/f?p={FLOW_ID}")).await?;
        let form = BootstrapForm::parse(&page)?;

        let mut accept = vec![
            ("p_flow_id", FLOW_ID.to_string()),
            ("p_flow_step_id", BOOTSTRAP_STEP_ID.to_string()),
            ("p_instance", form.session_id.clone()),
            ("p_page_submission_id", form.submission_id.clone()),
            ("p_request", "NEXT".to_string()),
        ];
        if let Some(salt) = &form.salt {
            accept.push(("p_salt", salt.clone()));
        }
        if let Some(protected) = &form.items_protected {
            accept.push(("p_page_items_protected", protected.clone()));
        }

        let response = self
            .http
            .post(format!("{base}/wwv_flow.accept"))
            .form(&accept)
            .send()
            .await?;
        check_status(response.status())?;

        let follow_up = format!("{base}/f?p={FLOW_ID}:2:{}:NEXT:NO:2:P2_CURSOR:B", form.session_id);
        let body = self.get_text(&follow_up).await?;
        let ajax_token = mine_ajax_token(&body)?;

        Ok((form.session_id, ajax_token))
    }

    async fn attempt(&self, code: &str) -> Result<Option<Product>, AttemptError> {
        let session = self.current().await?;

        let outcome = async {
            let response = self
                .http
                .post(format!("{}/wwv_flow.show", self.base_url()))
                .header(header::ACCEPT, "application/json")
                .form(&item_form(&session, code))
                .send()
                .await?;
            check_status(response.status())?;

            let body = response.text().await?;
            parse_item(&body, code)
        }
        .await;

        match &outcome {
            Ok(Some(product)) => tracing::debug!(code, description = %product.description, "catalog item found"),
            Ok(None) => tracing::debug!(code, "catalog reports no such item"),
            Err(_) => {}
        }

        outcome.map_err(|error| AttemptError { epoch: session.epoch, error })
    }

    async fn get_text(&self, url: &str) -> Result<String, SessionError> {
        tracing::debug!(url, "catalog GET");
        let response = self.http.get(url).send().await?;
        check_status(response.status())?;
        Ok(response.text().await?)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

fn check_status(status: StatusCode) -> Result<(), SessionError> {
    if status.is_client_error() || status.is_server_error() {
        return Err(SessionError::HttpStatus { status: status.as_u16() });
    }
    Ok(())
}

#[async_trait]
impl ProductSource for SessionClient {
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Product>, Error> {
        SessionClient::fetch_by_code(self, code).await
    }
}
