use crate::config::{CommitPolicy, RelayConfig};
use crate::dedup::{DedupEngine, DrillFilter};
use crate::formatter::MessageFormatter;
use crate::identity::IdentityRule;
use crate::notify::{DispatchReport, FanOut};
use crate::parser::FeedNormalizer;
use crate::sources::{civil_now, civil_offset, SourceSet};
use crate::traits::{FeedFetcher, WatermarkStore};
use crate::types::{
    FeedOutcome, Notification, Result, SourceDescriptor, TriggerResponse, WatermarkUpdateSet,
};
use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Counters for one invocation, logged at the end of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources_total: usize,
    pub sources_without_data: usize,
    pub candidates: usize,
    pub new_alerts: usize,
    pub notifications: Vec<Notification>,
    pub deliveries_ok: usize,
    pub deliveries_failed: usize,
    pub committed: WatermarkUpdateSet,
    pub commit_failed: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources={} (no data: {}), candidates={}, new alerts={}, deliveries ok={} failed={}, watermarks committed={}{}",
            self.sources_total,
            self.sources_without_data,
            self.candidates,
            self.new_alerts,
            self.deliveries_ok,
            self.deliveries_failed,
            self.committed.len(),
            if self.commit_failed { " (commit FAILED)" } else { "" },
        )
    }
}

/// Wires resolver, normalizer, dedup, formatter and fan-out into one run.
/// Clients are built once by the caller and handed in.
pub struct AlertRelay {
    sources: SourceSet,
    offset: FixedOffset,
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn WatermarkStore>,
    normalizer: FeedNormalizer,
    engine: DedupEngine,
    formatter: MessageFormatter,
    fanout: FanOut,
    commit_policy: CommitPolicy,
    dry_run: bool,
}

impl AlertRelay {
    pub fn from_config(
        config: &RelayConfig,
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn WatermarkStore>,
        fanout: FanOut,
    ) -> Result<Self> {
        Ok(Self {
            sources: SourceSet::parse(&config.sources)?,
            offset: civil_offset(config.utc_offset_hours)?,
            fetcher,
            store,
            normalizer: FeedNormalizer::new(),
            engine: DedupEngine::new(
                DrillFilter::new(&config.drill_markers),
                IdentityRule::default(),
            ),
            formatter: MessageFormatter::new(config.link_base.clone(), &config.masked_domains),
            fanout,
            commit_policy: config.commit_policy,
            dry_run: false,
        })
    }

    /// Render messages but neither deliver them nor commit watermarks.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_at(civil_now(self.offset)).await
    }

    /// One full pass. Only a failed watermark load is returned as an error;
    /// every other failure degrades the data of this run.
    pub async fn run_at(&self, now: DateTime<FixedOffset>) -> Result<RunSummary> {
        let span = info_span!("relay_run", run_id = %Uuid::new_v4());
        self.run_inner(now).instrument(span).await
    }

    async fn run_inner(&self, now: DateTime<FixedOffset>) -> Result<RunSummary> {
        let descriptors = self.sources.resolve(&now);
        info!("Running relay over {} sources", descriptors.len());

        let (watermarks, feeds) = tokio::join!(self.store.load(), self.fetch_all(&descriptors));
        let watermarks = watermarks?;

        let mut summary = RunSummary {
            sources_total: feeds.len(),
            sources_without_data: feeds.iter().filter(|(_, f)| f.is_no_data()).count(),
            ..RunSummary::default()
        };

        let outcome = self.engine.run(&watermarks, &feeds);
        summary.candidates = outcome.candidates;
        summary.new_alerts = outcome.new_alerts.len();

        let notifications: Vec<Notification> = outcome
            .new_alerts
            .iter()
            .map(|(page_key, record)| self.formatter.render(page_key, record))
            .collect();

        if self.dry_run {
            for notification in &notifications {
                info!(page_key = %notification.page_key, "[dry run] {}", notification.text);
            }
            summary.notifications = notifications;
            info!("Relay run complete (dry run). {summary}");
            return Ok(summary);
        }

        let (committed, report) = match self.commit_policy {
            CommitPolicy::Concurrent => {
                tokio::join!(
                    self.commit(&outcome.updates),
                    self.fanout.dispatch(&notifications)
                )
            }
            CommitPolicy::CommitFirst => {
                let committed = self.commit(&outcome.updates).await;
                if committed.is_ok() {
                    (committed, self.fanout.dispatch(&notifications).await)
                } else {
                    // Watermarks did not move; the next run offers these again.
                    warn!("Skipping dispatch of {} alerts after failed commit", notifications.len());
                    (committed, DispatchReport::default())
                }
            }
        };

        match committed {
            Ok(true) => summary.committed = outcome.updates,
            Ok(false) => {}
            Err(_) => summary.commit_failed = true,
        }
        summary.deliveries_ok = report.delivered;
        summary.deliveries_failed = report.failed;
        summary.notifications = notifications;

        info!("Relay run complete. {summary}");
        Ok(summary)
    }

    /// Fetch and normalize every source concurrently. A failing source only
    /// loses its own data.
    async fn fetch_all(&self, descriptors: &[SourceDescriptor]) -> Vec<(SourceDescriptor, FeedOutcome)> {
        let fetches = descriptors.iter().map(|descriptor| async move {
            let fetched = self.fetcher.fetch(&descriptor.location).await;
            let outcome = self.normalizer.normalize(descriptor, fetched);
            (descriptor.clone(), outcome)
        });
        join_all(fetches).await
    }

    /// Returns whether a commit was issued. Errors are logged here; nothing
    /// already delivered is rolled back.
    async fn commit(&self, updates: &WatermarkUpdateSet) -> Result<bool> {
        if updates.is_empty() {
            return Ok(false);
        }

        match self.store.commit(updates).await {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(error = %e, "Failed to commit watermarks");
                Err(e)
            }
        }
    }
}

/// Process entry point. The trigger event is opaque and only logged; the
/// caller always gets "accepted, no content".
pub async fn handle_trigger(relay: &AlertRelay, event: &Value) -> TriggerResponse {
    info!(event = %event, "Relay triggered");

    if let Err(e) = relay.run().await {
        error!(error = %e, "Relay run aborted");
    }

    TriggerResponse::accepted()
}
