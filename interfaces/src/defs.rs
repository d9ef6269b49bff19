use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One bulletin as reported by a feed, already tagged with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Fixed-width timestamp, so lexicographic order is chronological order.
    pub release_time: String,
    /// The key exactly as the feed supplied it, before identity derivation.
    pub page_key: String,
    pub category: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// A per-category feed; every record belongs to this category.
    Single(String),
    /// A period report grouping many categories; records carry their own.
    Aggregated,
}

impl SourceKind {
    pub fn category(&self) -> Option<&str> {
        match self {
            SourceKind::Single(name) => Some(name),
            SourceKind::Aggregated => None,
        }
    }
}

/// A source location resolved for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub template: String,
    pub location: String,
    pub kind: SourceKind,
}

/// category -> last delivered release time, as persisted between runs.
pub type WatermarkMap = BTreeMap<String, String>;

/// category -> highest release time included during this run.
pub type WatermarkUpdateSet = BTreeMap<String, String>;

/// physical identity -> the record chosen to represent it.
pub type NewAlertSet = BTreeMap<String, AlertRecord>;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub page_key: String,
    pub link: String,
    pub text: String,
}

/// What the process hands back to whoever triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status_code: u16,
}

impl TriggerResponse {
    /// Accepted, no content. Returned regardless of partial failures.
    pub fn accepted() -> Self {
        Self { status_code: 204 }
    }
}
