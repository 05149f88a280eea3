//! Batch orchestration
//!
//! Processes the roster strictly one account at a time: build the session
//! collaborators, run the session to its terminal state, record the
//! result, checkpoint every file, move on. The transport and web tier are
//! injected as factories so the orchestrator stays independent of the
//! wire protocol implementation.

use std::collections::HashSet;
use std::sync::Arc;

use steam_guard::{TimeReference, TwoFactorGenerator};
use steam_session::{
    CredentialFetcher, PackageCache, RunContext, Session, Transport,
};
use steam_web::RequestPacer;
use tracing::info;

use crate::config::{AuthFailurePolicy, FetcherConfig};
use crate::error::Result;
use crate::results::ResultsLog;
use crate::roster::Roster;

/// Tallies for one `run` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub requeued: u32,
}

/// Stock time reference over the public web API, for production wiring.
pub fn web_time_reference() -> Arc<dyn TimeReference> {
    Arc::new(steam_web::WebTimeReference::new(reqwest::Client::new()))
}

/// One run of the fetcher over the whole roster.
pub struct BatchRunner {
    config: FetcherConfig,
    ctx: Arc<RunContext>,
    roster: Roster,
    results: ResultsLog,
    pacer: Arc<RequestPacer>,
    time: Arc<dyn TimeReference>,
}

impl BatchRunner {
    /// Load every on-disk file named in the configuration and build the
    /// shared run state. `time` backs the guard clock alignment.
    pub async fn new(config: FetcherConfig, time: Arc<dyn TimeReference>) -> Result<Self> {
        let roster = Roster::load(&config.files.roster)?;
        let results = ResultsLog::load(&config.files.results);
        let packages = PackageCache::load(&config.files.package_cache).await?;
        let ctx = Arc::new(RunContext::new(packages, config.rate_gate()));
        let pacer = Arc::new(config.pacer());

        Ok(Self {
            config,
            ctx,
            roster,
            results,
            pacer,
            time,
        })
    }

    /// Shared web request pacer, for wiring up web client factories.
    pub fn pacer(&self) -> Arc<RequestPacer> {
        Arc::clone(&self.pacer)
    }

    pub fn remaining(&self) -> usize {
        self.roster.len()
    }

    /// Drain the roster. `transports` and `webs` produce fresh
    /// collaborators for each account.
    pub async fn run<T, W>(
        &mut self,
        mut transports: impl FnMut() -> T,
        mut webs: impl FnMut() -> W,
    ) -> Result<RunSummary>
    where
        T: Transport,
        W: CredentialFetcher,
    {
        let session_config = self.config.session_config();
        let mut summary = RunSummary::default();
        let mut requeued: HashSet<String> = HashSet::new();

        while let Some(credential) = self.roster.pop() {
            let generator = TwoFactorGenerator::new(
                credential.shared_secret.clone(),
                self.ctx.clock(),
                Arc::clone(&self.time),
            );
            let session = Session::new(
                Arc::clone(&self.ctx),
                session_config.clone(),
                credential.clone(),
            );

            let mut transport = transports();
            let mut web = webs();
            let outcome = session.run(&mut transport, &mut web, &generator).await;
            summary.processed += 1;

            if outcome.completed {
                summary.succeeded += 1;
                self.results.push(outcome.result);
            } else if self.config.auth_failure_policy == AuthFailurePolicy::Requeue
                && requeued.insert(credential.username.clone())
            {
                info!(account = %credential.username, "failed account requeued");
                summary.requeued += 1;
                self.roster.requeue(credential);
            } else {
                summary.failed += 1;
                self.results.push(outcome.result);
            }

            self.checkpoint().await?;
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            requeued = summary.requeued,
            "roster drained"
        );
        Ok(summary)
    }

    /// Persist roster, results and package cache. Called after every
    /// account so an interruption loses at most the account in flight.
    async fn checkpoint(&self) -> Result<()> {
        self.roster.save()?;
        self.results.save()?;
        self.ctx.packages().save().await?;
        Ok(())
    }
}
