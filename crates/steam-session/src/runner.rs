//! Session runner
//!
//! Drives one account through the lifecycle state machine: polls the
//! transport for events, feeds them to `handle_event`, and performs the
//! requested actions. Shared per-run state (connection gate, package
//! cache, aligned clock) lives in `RunContext`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use steam_guard::GuardClock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::account::{AccountResult, Credential, Entitlement};
use crate::cache::{PackageCache, PackageMetadata};
use crate::machine::{SessionAction, SessionEvent, SessionState, handle_event};
use crate::rate::RateGate;
use crate::transport::{
    AuthError, AuthTokens, CodeSource, CredentialFetcher, LicenseGrant, MetadataError, Transport,
    TransportEvent,
};

/// State shared by every session in one run of the fetcher.
#[derive(Debug)]
pub struct RunContext {
    rate: Mutex<RateGate>,
    packages: PackageCache,
    clock: Arc<Mutex<GuardClock>>,
    sessions_started: AtomicU32,
}

impl RunContext {
    pub fn new(packages: PackageCache, rate: RateGate) -> Self {
        Self {
            rate: Mutex::new(rate),
            packages,
            clock: Arc::new(Mutex::new(GuardClock::new())),
            sessions_started: AtomicU32::new(0),
        }
    }

    pub fn rate(&self) -> &Mutex<RateGate> {
        &self.rate
    }

    pub fn packages(&self) -> &PackageCache {
        &self.packages
    }

    /// Process-wide aligned clock, shared by every code generator.
    pub fn clock(&self) -> Arc<Mutex<GuardClock>> {
        Arc::clone(&self.clock)
    }

    fn next_instance(&self) -> u32 {
        self.sessions_started.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle sleep between transport polls.
    pub poll_interval: Duration,
    /// Pause between consecutive product info fetches.
    pub metadata_fetch_delay: Duration,
    /// Transient drops tolerated before the session is abandoned.
    pub max_reconnects: u32,
    /// Cap on product info attempts per package. `None` retries until the
    /// fetch stops timing out.
    pub metadata_fetch_attempts: Option<NonZeroU32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            metadata_fetch_delay: Duration::from_secs(1),
            max_reconnects: 10,
            metadata_fetch_attempts: None,
        }
    }
}

/// Terminal state and frozen result of one session.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The session reached `Done`.
    pub completed: bool,
    pub result: AccountResult,
}

/// One account's session from connect to frozen result.
pub struct Session {
    ctx: Arc<RunContext>,
    config: SessionConfig,
    credential: Credential,
    instance: u32,
    state: SessionState,
    result: AccountResult,
    tokens: Option<AuthTokens>,
    pending_grants: Vec<LicenseGrant>,
    reconnects: u32,
    running: bool,
}

impl Session {
    pub fn new(ctx: Arc<RunContext>, config: SessionConfig, credential: Credential) -> Self {
        let instance = ctx.next_instance();
        let result = AccountResult::for_account(&credential.username);
        Self {
            ctx,
            config,
            credential,
            instance,
            state: SessionState::Idle,
            result,
            tokens: None,
            pending_grants: Vec::new(),
            reconnects: 0,
            running: true,
        }
    }

    /// Run the session to completion and freeze the result.
    pub async fn run(
        mut self,
        transport: &mut dyn Transport,
        web: &mut dyn CredentialFetcher,
        codes: &dyn CodeSource,
    ) -> SessionOutcome {
        info!(
            instance = self.instance,
            account = %self.credential.username,
            "session started"
        );

        self.dispatch(transport, web, codes, SessionEvent::Start).await;

        while self.running {
            match transport.poll_event().await {
                Some(raw) => {
                    if matches!(raw, TransportEvent::Connected) {
                        self.ctx.rate.lock().await.on_connected();
                    }
                    let event = self.observe(raw);
                    self.dispatch(transport, web, codes, event).await;
                }
                None => tokio::time::sleep(self.config.poll_interval).await,
            }
        }

        let done = matches!(self.state, SessionState::Done);
        info!(
            instance = self.instance,
            account = %self.credential.username,
            done,
            "session finished"
        );
        self.freeze()
    }

    /// Record side data carried by a transport event and map it to a
    /// lifecycle event.
    fn observe(&mut self, raw: TransportEvent) -> SessionEvent {
        match raw {
            TransportEvent::Connected => SessionEvent::Connected,
            TransportEvent::Disconnected { user_initiated } => {
                SessionEvent::Disconnected { user_initiated }
            }
            TransportEvent::LoggedOn { ok, steam_id } => {
                if ok && steam_id != 0 {
                    self.result.steam_id = steam_id;
                }
                SessionEvent::LoggedOn { ok }
            }
            TransportEvent::LoggedOff { rate_limited } => {
                SessionEvent::LoggedOff { rate_limited }
            }
            TransportEvent::LicenseList { grants } => {
                self.pending_grants = grants;
                SessionEvent::LicenseList
            }
            TransportEvent::Standing(standing) => {
                if standing.locked {
                    warn!(instance = self.instance, "account is locked");
                }
                if standing.banned {
                    warn!(instance = self.instance, "account is community banned");
                }
                self.result.is_limited = standing.limited;
                self.result.is_banned = standing.banned;
                self.result.is_locked = standing.locked;
                SessionEvent::AccountFlags
            }
        }
    }

    /// Run transitions until the requested actions stop producing
    /// follow-up events.
    async fn dispatch(
        &mut self,
        transport: &mut dyn Transport,
        web: &mut dyn CredentialFetcher,
        codes: &dyn CodeSource,
        mut event: SessionEvent,
    ) {
        loop {
            let (next, action) = handle_event(self.state, event);
            debug!(instance = self.instance, state = ?next, action = ?action, "transition");
            self.state = next;
            match self.perform(transport, web, codes, action).await {
                Some(follow_up) => event = follow_up,
                None => break,
            }
        }
    }

    async fn perform(
        &mut self,
        transport: &mut dyn Transport,
        web: &mut dyn CredentialFetcher,
        codes: &dyn CodeSource,
        action: SessionAction,
    ) -> Option<SessionEvent> {
        match action {
            SessionAction::Connect => {
                self.ctx.rate.lock().await.before_connect().await;
                transport.connect().await;
                None
            }

            SessionAction::Reconnect => {
                if self.reconnects >= self.config.max_reconnects {
                    warn!(
                        instance = self.instance,
                        attempts = self.reconnects,
                        "reconnect budget exhausted"
                    );
                    return Some(SessionEvent::RetriesExhausted);
                }
                self.reconnects += 1;
                debug!(instance = self.instance, attempt = self.reconnects, "reconnecting");
                self.ctx.rate.lock().await.before_connect().await;
                transport.connect().await;
                None
            }

            SessionAction::BeginAuth => {
                let outcome = transport
                    .authenticate(
                        &self.credential.username,
                        self.credential.password.expose(),
                        codes,
                    )
                    .await;
                match outcome {
                    Ok(tokens) => {
                        self.result.steam_id = tokens.steam_id;
                        self.tokens = Some(tokens);
                        Some(SessionEvent::AuthSucceeded)
                    }
                    Err(AuthError::RateLimited) => {
                        warn!(instance = self.instance, "authentication rate limited");
                        Some(SessionEvent::AuthRateLimited)
                    }
                    Err(AuthError::Timeout) => {
                        warn!(instance = self.instance, "authentication timed out");
                        Some(SessionEvent::AuthTimedOut)
                    }
                    Err(AuthError::Denied(reason)) => {
                        warn!(instance = self.instance, reason = %reason, "authentication denied");
                        Some(SessionEvent::AuthDenied)
                    }
                }
            }

            SessionAction::ResumeSession => match &self.tokens {
                Some(tokens) => {
                    transport
                        .resume_session(&self.credential.username, &tokens.refresh_token)
                        .await;
                    None
                }
                None => {
                    warn!(instance = self.instance, "no tokens to resume session with");
                    Some(SessionEvent::AuthDenied)
                }
            },

            SessionAction::EstablishWebSession => {
                let Some(tokens) = self.tokens.clone() else {
                    warn!(instance = self.instance, "no tokens for the web session");
                    return Some(SessionEvent::WebFailed);
                };
                match web.authenticate(tokens.steam_id, &tokens.access_token).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(instance = self.instance, error = %e, "web authentication failed");
                        Some(SessionEvent::WebFailed)
                    }
                }
            }

            SessionAction::ProcessLicenses => {
                Some(self.process_licenses(transport, web).await)
            }

            SessionAction::FetchWebCredentials => {
                Some(self.fetch_web_credentials(web).await)
            }

            SessionAction::Disconnect => {
                transport.disconnect().await;
                None
            }

            SessionAction::PenalizeAndDisconnect => {
                self.ctx.rate.lock().await.on_rate_limited();
                transport.disconnect().await;
                None
            }

            SessionAction::Complete | SessionAction::Abort => {
                self.running = false;
                None
            }

            SessionAction::None => None,
        }
    }

    async fn process_licenses(
        &mut self,
        transport: &mut dyn Transport,
        web: &mut dyn CredentialFetcher,
    ) -> SessionEvent {
        let grants = std::mem::take(&mut self.pending_grants);
        info!(
            instance = self.instance,
            licenses = grants.len(),
            "processing license list"
        );

        for grant in grants {
            // Id zero is the platform's implicit default package.
            if grant.package_id == 0 {
                continue;
            }

            self.result.packages.push(Entitlement {
                package_id: grant.package_id,
                registered_unix_millis: grant.registered_unix_millis,
            });

            if self.ctx.packages.contains(grant.package_id).await {
                debug!(package_id = grant.package_id, "metadata already cached");
                continue;
            }

            let Some(mut extension) = self.fetch_metadata(transport, &grant).await else {
                return SessionEvent::LicensesFailed;
            };

            let app_ids = app_ids_in(&extension);
            if !app_ids.is_empty() {
                match web.app_names(&app_ids).await {
                    Ok(names) => {
                        let mut object = serde_json::Map::new();
                        for (app_id, name) in names {
                            object.insert(app_id.to_string(), serde_json::Value::String(name));
                        }
                        extension.insert("app_names".into(), serde_json::Value::Object(object));
                    }
                    // No partial entries: a package without its app names
                    // must not reach the cache.
                    Err(e) => {
                        warn!(
                            package_id = grant.package_id,
                            error = %e,
                            "app name lookup failed"
                        );
                        return SessionEvent::LicensesFailed;
                    }
                }
            }

            self.ctx
                .packages
                .insert(PackageMetadata {
                    package_id: grant.package_id,
                    extension,
                })
                .await;

            tokio::time::sleep(self.config.metadata_fetch_delay).await;
        }

        SessionEvent::LicensesProcessed
    }

    /// Fetch product info for one package, retrying timeouts. Returns
    /// `None` when the fetch is abandoned; nothing is cached in that case.
    async fn fetch_metadata(
        &self,
        transport: &mut dyn Transport,
        grant: &LicenseGrant,
    ) -> Option<serde_json::Map<String, serde_json::Value>> {
        let mut attempts = 0u32;
        loop {
            match transport
                .package_metadata(grant.package_id, grant.access_token)
                .await
            {
                Ok(extension) => return Some(extension),
                Err(MetadataError::Timeout) => {
                    attempts += 1;
                    if let Some(max) = self.config.metadata_fetch_attempts {
                        if attempts >= max.get() {
                            warn!(
                                package_id = grant.package_id,
                                attempts,
                                "product info fetch abandoned"
                            );
                            return None;
                        }
                    }
                    debug!(package_id = grant.package_id, attempts, "product info timed out, retrying");
                    tokio::time::sleep(self.config.metadata_fetch_delay).await;
                }
                Err(MetadataError::Incomplete(reason)) => {
                    warn!(
                        package_id = grant.package_id,
                        reason = %reason,
                        "product info incomplete"
                    );
                    return None;
                }
            }
        }
    }

    /// Retrieve the API key. The web session was established at logon.
    async fn fetch_web_credentials(&mut self, web: &mut dyn CredentialFetcher) -> SessionEvent {
        match web.fetch_api_key().await {
            Ok((registered, key)) => {
                if registered {
                    info!(instance = self.instance, "registered new api key");
                }
                self.result.api_key = key;
                SessionEvent::WebReady
            }
            Err(e) => {
                warn!(instance = self.instance, error = %e, "api key fetch failed");
                SessionEvent::WebFailed
            }
        }
    }

    /// Freeze the result. A session that did not finish cleanly keeps only
    /// the account name; a limited account never carries an API key.
    fn freeze(mut self) -> SessionOutcome {
        let completed = matches!(self.state, SessionState::Done);
        if !completed {
            self.result.reset_partial();
        } else if self.result.is_limited {
            self.result.api_key.clear();
        }
        SessionOutcome {
            completed,
            result: self.result,
        }
    }
}

fn app_ids_in(extension: &serde_json::Map<String, serde_json::Value>) -> Vec<u32> {
    extension
        .get("appids")
        .and_then(serde_json::Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(serde_json::Value::as_u64)
                .map(|id| id as u32)
                .collect()
        })
        .unwrap_or_default()
}
