use crate::identity::IdentityRule;
use crate::types::{
    AlertRecord, FeedOutcome, NewAlertSet, SourceDescriptor, SourceKind, WatermarkMap,
    WatermarkUpdateSet,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Recognizes exercise/test bulletins by marker substrings in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillFilter {
    markers: Vec<String>,
}

impl DrillFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    pub fn is_drill(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.markers.iter().any(|marker| body.contains(marker.as_str()))
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

/// What the engine decided for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    pub new_alerts: NewAlertSet,
    pub updates: WatermarkUpdateSet,
    pub candidates: usize,
    pub stale: usize,
    pub drills: usize,
    pub untracked: usize,
}

/// Decides which records are new and folds duplicates of the same physical
/// bulletin into one.
pub struct DedupEngine {
    drill_filter: DrillFilter,
    identity: IdentityRule,
}

impl DedupEngine {
    pub fn new(drill_filter: DrillFilter, identity: IdentityRule) -> Self {
        Self {
            drill_filter,
            identity,
        }
    }

    /// Process sources in the given order. Within a source, records are
    /// expected in ascending release time, as the normalizer produces them.
    pub fn run(
        &self,
        watermarks: &WatermarkMap,
        sources: &[(SourceDescriptor, FeedOutcome)],
    ) -> DedupOutcome {
        let tracked = tracked_categories(sources.iter().map(|(d, _)| d));
        let mut outcome = DedupOutcome::default();

        for (descriptor, feed) in sources {
            for record in feed.records() {
                outcome.candidates += 1;

                if descriptor.kind == SourceKind::Aggregated
                    && !tracked.contains(&record.category)
                {
                    outcome.untracked += 1;
                    continue;
                }

                self.consider(record, watermarks, &mut outcome);
            }
        }

        info!(
            candidates = outcome.candidates,
            new_alerts = outcome.new_alerts.len(),
            stale = outcome.stale,
            drills = outcome.drills,
            untracked = outcome.untracked,
            "Dedup complete"
        );
        outcome
    }

    fn consider(&self, record: &AlertRecord, watermarks: &WatermarkMap, outcome: &mut DedupOutcome) {
        // The running value wins over the persisted one once this run has
        // included something for the category.
        let watermark = outcome
            .updates
            .get(&record.category)
            .or_else(|| watermarks.get(&record.category))
            .map(String::as_str)
            .unwrap_or("");

        if record.release_time.as_str() <= watermark {
            outcome.stale += 1;
            return;
        }

        // Filtered before keying, so a drill can never displace a real
        // bulletin that shares its identity.
        if self.drill_filter.is_drill(&record.body) {
            debug!(category = %record.category, release_time = %record.release_time, "Skipping drill bulletin");
            outcome.drills += 1;
            return;
        }

        let page_key = self.identity.page_key(&record.release_time, &record.page_key);
        if outcome.new_alerts.insert(page_key.clone(), record.clone()).is_some() {
            debug!(page_key = %page_key, "Replacing earlier record for the same bulletin");
        }

        advance(&mut outcome.updates, &record.category, &record.release_time);
    }
}

/// Categories with their own per-category source in this run.
pub fn tracked_categories<'a, I>(descriptors: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a SourceDescriptor>,
{
    descriptors
        .into_iter()
        .filter_map(|d| d.kind.category().map(str::to_string))
        .collect()
}

/// Move a category forward to `release_time`; never backwards.
pub fn advance(updates: &mut WatermarkUpdateSet, category: &str, release_time: &str) -> bool {
    match updates.get_mut(category) {
        Some(current) if current.as_str() >= release_time => false,
        Some(current) => {
            *current = release_time.to_string();
            true
        }
        None => {
            updates.insert(category.to_string(), release_time.to_string());
            true
        }
    }
}
