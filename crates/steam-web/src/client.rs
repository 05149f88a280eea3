//! Authenticated community/store web client
//!
//! One client per session. `establish` plants the session cookies derived
//! from the logon tokens across the platform's web domains; after that the
//! client can read or register the account's web API key and resolve app
//! display names. Every request goes through the shared `RequestPacer`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use rand::RngExt;
use regex::Regex;
use reqwest::cookie::Jar;
use serde::Deserialize;
use steam_session::transport::{BoxFuture, CredentialError, CredentialFetcher};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pacer::RequestPacer;

const COOKIE_DOMAINS: [&str; 4] = [
    "steamcommunity.com",
    "store.steampowered.com",
    "help.steampowered.com",
    "checkout.steampowered.com",
];

const APIKEY_PAGE: &str = "https://steamcommunity.com/dev/apikey";
const REGISTER_KEY_PAGE: &str = "https://steamcommunity.com/dev/registerkey";
const GET_APPS_ENDPOINT: &str =
    "https://api.steampowered.com/ICommunityService/GetApps/v1/";

/// App ids per `GetApps` request.
const APP_NAME_BATCH: usize = 100;

#[derive(Debug, Clone)]
struct WebSession {
    steam_id: u64,
    access_token: String,
}

#[derive(Debug, Clone)]
struct ApiKey {
    registered_now: bool,
    key: String,
}

/// Cookie-authenticated web client for one account session.
pub struct WebClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    pacer: Arc<RequestPacer>,
    session_id: String,
    session: Option<WebSession>,
    cached_key: Option<ApiKey>,
}

impl WebClient {
    pub fn new(pacer: Arc<RequestPacer>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| Error::Http(format!("client build failed: {e}")))?;

        Ok(Self {
            http,
            jar,
            pacer,
            session_id: String::new(),
            session: None,
            cached_key: None,
        })
    }

    /// Plant the session cookies for the logged-on account.
    pub fn establish(&mut self, steam_id: u64, access_token: &str) -> Result<()> {
        if steam_id == 0 {
            return Err(Error::InvalidSession("steam id is zero".into()));
        }
        if access_token.is_empty() {
            return Err(Error::InvalidSession("access token is empty".into()));
        }

        self.session_id = new_session_id();
        let login_secure = format!("{steam_id}%7C%7C{access_token}");
        let timezone = timezone_cookie();

        for domain in COOKIE_DOMAINS {
            let url = format!("https://{domain}/")
                .parse::<reqwest::Url>()
                .map_err(|e| Error::Http(format!("bad cookie url: {e}")))?;
            for cookie in [
                format!("sessionid={}; Domain={domain}; Path=/", self.session_id),
                format!("steamLoginSecure={login_secure}; Domain={domain}; Path=/"),
                format!("timezoneOffset={timezone}; Domain={domain}; Path=/"),
            ] {
                self.jar.add_cookie_str(&cookie, &url);
            }
        }

        self.session = Some(WebSession {
            steam_id,
            access_token: access_token.to_string(),
        });
        self.cached_key = None;
        info!(steam_id, "web session established");
        Ok(())
    }

    fn session(&self) -> Result<&WebSession> {
        self.session.as_ref().ok_or(Error::NotAuthenticated)
    }

    /// The account's web API key, registering one if absent. Returns
    /// whether the key was registered by this call. Cached per session.
    pub async fn api_key(&mut self) -> Result<(bool, String)> {
        let steam_id = self.session()?.steam_id;

        if let Some(cached) = &self.cached_key {
            return Ok((cached.registered_now, cached.key.clone()));
        }

        let page = self.get_text(APIKEY_PAGE).await?;
        let (registered_now, key) = match extract_api_key(&page) {
            Some(key) => {
                debug!(steam_id, "existing api key found");
                (false, key)
            }
            None => {
                info!(steam_id, "no api key on account, registering");
                self.register_api_key().await?
            }
        };

        self.cached_key = Some(ApiKey {
            registered_now,
            key: key.clone(),
        });
        Ok((registered_now, key))
    }

    async fn register_api_key(&mut self) -> Result<(bool, String)> {
        self.pacer.pace().await;
        let response = self
            .http
            .post(REGISTER_KEY_PAGE)
            .form(&[
                ("domain", "localhost"),
                ("agreeToTerms", "agreed"),
                ("sessionid", self.session_id.as_str()),
                ("Submit", "Register"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("key registration failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!(
                "key registration returned {status}"
            )));
        }

        let page = self.get_text(APIKEY_PAGE).await?;
        match extract_api_key(&page) {
            Some(key) => Ok((true, key)),
            None => Err(Error::Parse(
                "api key absent after registration".to_string(),
            )),
        }
    }

    /// Display names for a batch of app ids. Unknown ids are omitted.
    pub async fn app_names(&self, app_ids: &[u32]) -> Result<HashMap<u32, String>> {
        let session = self.session()?;
        let mut names = HashMap::with_capacity(app_ids.len());

        for batch in app_ids.chunks(APP_NAME_BATCH) {
            let mut query: Vec<(String, String)> =
                vec![("access_token".to_string(), session.access_token.clone())];
            for (index, app_id) in batch.iter().enumerate() {
                query.push((format!("appids[{index}]"), app_id.to_string()));
            }

            self.pacer.pace().await;
            let response = self
                .http
                .get(GET_APPS_ENDPOINT)
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::Http(format!("app name request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Http(format!("app name request returned {status}")));
            }

            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("invalid body: {e}")))?;
            let resolved = parse_app_names(&body)?;
            if resolved.len() < batch.len() {
                warn!(
                    requested = batch.len(),
                    resolved = resolved.len(),
                    "some app names were not resolved"
                );
            }
            names.extend(resolved);
        }

        Ok(names)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.pacer.pace().await;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("{url} returned {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Http(format!("invalid body: {e}")))
    }
}

impl CredentialFetcher for WebClient {
    fn authenticate<'a>(
        &'a mut self,
        steam_id: u64,
        access_token: &'a str,
    ) -> BoxFuture<'a, std::result::Result<(), CredentialError>> {
        Box::pin(async move {
            self.establish(steam_id, access_token)
                .map_err(|e| CredentialError(e.to_string()))
        })
    }

    fn fetch_api_key(
        &mut self,
    ) -> BoxFuture<'_, std::result::Result<(bool, String), CredentialError>> {
        Box::pin(async move {
            self.api_key()
                .await
                .map_err(|e| CredentialError(e.to_string()))
        })
    }

    fn app_names<'a>(
        &'a mut self,
        app_ids: &'a [u32],
    ) -> BoxFuture<'a, std::result::Result<HashMap<u32, String>, CredentialError>> {
        Box::pin(async move {
            WebClient::app_names(self, app_ids)
                .await
                .map_err(|e| CredentialError(e.to_string()))
        })
    }
}

/// 12 random bytes, lowercase hex. Matches the cookie format the site
/// itself issues.
fn new_session_id() -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `timezoneOffset` cookie value: UTC offset in seconds with an encoded
/// `,0` suffix.
fn timezone_cookie() -> String {
    let offset_secs = chrono::Local::now().offset().local_minus_utc();
    format!("{offset_secs}%2C0")
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<p>Key: ([0-9A-F]{32})</p>").unwrap())
}

/// Pull the API key out of the `/dev/apikey` page, if one is registered.
fn extract_api_key(page: &str) -> Option<String> {
    key_pattern()
        .captures(page)
        .map(|captures| captures[1].to_string())
}

#[derive(Debug, Deserialize)]
struct GetAppsResponse {
    response: GetAppsBody,
}

#[derive(Debug, Deserialize)]
struct GetAppsBody {
    #[serde(default)]
    apps: Vec<AppEntry>,
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    appid: u32,
    #[serde(default)]
    name: String,
}

fn parse_app_names(body: &str) -> Result<HashMap<u32, String>> {
    let parsed: GetAppsResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("bad GetApps response: {e}")))?;

    Ok(parsed
        .response
        .apps
        .into_iter()
        .filter(|app| !app.name.is_empty())
        .map(|app| (app.appid, app.name))
        .collect())
}
