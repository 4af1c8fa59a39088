use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol;
use crate::types::{Change, PhysicalUnit};

const USER_AGENT: &str = "mhi-sl4";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REAUTH_ATTEMPTS: usize = 3;

/// Capability boundary to the controller. `LocalApi` is the shipped
/// implementation; tests substitute in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait DeviceApi {
    async fn fetch_units(&self) -> Result<Vec<PhysicalUnit>>;
    async fn send_command(&self, unit_id: &str, change: &Change) -> Result<()>;
}

pub struct LocalApiBuilder {
    host: String,
    username: String,
    password: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl LocalApiBuilder {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    /// Per-request timeout. A timed-out call surfaces as a transport error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> LocalApi {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(
                MessageLogger::new(mode, &path).expect("failed to open log file"),
            )),
            _ => None,
        };

        LocalApi {
            http,
            login_url: format!("http://{}/login.asp", self.host),
            api_url: format!("http://{}/json/group_list_json.asp", self.host),
            username: self.username,
            password: self.password,
            cookie: Mutex::new(None),
            logger,
        }
    }
}

/// Client for the controller's local JSON endpoint. Logs in via the
/// `/login.asp` form, keeps the session cookie, and re-authenticates
/// transparently (bounded) when the controller expires the session.
pub struct LocalApi {
    http: reqwest::Client,
    login_url: String,
    api_url: String,
    username: String,
    password: String,
    cookie: Mutex<Option<String>>,
    logger: Option<Mutex<MessageLogger>>,
}

impl LocalApi {
    pub fn builder(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> LocalApiBuilder {
        LocalApiBuilder::new(host, username, password)
    }

    /// Authenticate and store the session cookie. Success is a 302 with a
    /// `Set-Cookie` header; anything else is an auth failure.
    pub async fn login(&self) -> Result<String> {
        debug!(url = %self.login_url, "logging in");
        let resp = self
            .http
            .post(&self.login_url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .form(&[
                ("Id", self.username.as_str()),
                ("Password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_login(status);
        }
        if status != 302 {
            return Err(Error::Auth(format!("login failed with status {status}")));
        }
        let cookie = resp
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Auth("login did not return a session cookie".to_string()))?;
        debug!("logged in");
        *self.cookie.lock().expect("cookie mutex poisoned") = Some(cookie.clone());
        Ok(cookie)
    }

    async fn ensure_cookie(&self) -> Result<String> {
        let existing = self.cookie.lock().expect("cookie mutex poisoned").clone();
        match existing {
            Some(cookie) => Ok(cookie),
            None => self.login().await,
        }
    }

    fn api_post(&self, body: String, cookie: &str) -> reqwest::RequestBuilder {
        self.http
            .post(&self.api_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("Cookie", cookie)
            .body(body)
    }
}

impl DeviceApi for LocalApi {
    async fn fetch_units(&self) -> Result<Vec<PhysicalUnit>> {
        for attempt in 0..=MAX_REAUTH_ATTEMPTS {
            let cookie = self.ensure_cookie().await?;
            let resp = self
                .api_post(protocol::group_data_request(), &cookie)
                .send()
                .await?
                .error_for_status()?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;

            if let Some(logger) = &self.logger
                && let Ok(mut logger) = logger.lock()
            {
                let body_json = serde_json::from_str(&body).unwrap_or(Value::Null);
                logger.log_fetch(status, &body_json);
            }

            match protocol::parse_group_data(&body) {
                Ok(raw) => {
                    let units: Vec<PhysicalUnit> =
                        raw.into_iter().map(protocol::RawUnit::into_unit).collect();
                    debug!(count = units.len(), "fetched unit states");
                    return Ok(units);
                }
                Err(Error::SessionExpired) => {
                    if attempt == MAX_REAUTH_ATTEMPTS {
                        break;
                    }
                    debug!(
                        attempt = attempt + 1,
                        "session expired, re-authenticating"
                    );
                    self.login().await?;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Auth(format!(
            "max re-authentication attempts ({MAX_REAUTH_ATTEMPTS}) reached"
        )))
    }

    async fn send_command(&self, unit_id: &str, change: &Change) -> Result<()> {
        let payload = protocol::change_group_payload(unit_id, change);
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_command(unit_id, &payload);
        }

        for attempt in 0..=MAX_REAUTH_ATTEMPTS {
            let cookie = self.ensure_cookie().await?;
            debug!(unit = unit_id, "sending command");
            let resp = self
                .api_post(protocol::command_body(&payload), &cookie)
                .send()
                .await?
                .error_for_status()?;
            let body = resp.text().await?;

            match protocol::parse_command_ack(unit_id, &body) {
                Ok(()) => return Ok(()),
                Err(Error::SessionExpired) => {
                    if attempt == MAX_REAUTH_ATTEMPTS {
                        break;
                    }
                    debug!(
                        attempt = attempt + 1,
                        "session expired, re-authenticating"
                    );
                    self.login().await?;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Auth(format!(
            "max re-authentication attempts ({MAX_REAUTH_ATTEMPTS}) reached"
        )))
    }
}
