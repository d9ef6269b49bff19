use crate::types::{FetchedPayload, Result, WatermarkMap, WatermarkUpdateSet};
use async_trait::async_trait;

/// Retrieves raw feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch one resolved location. Transport errors and non-success
    /// statuses are returned as `Err`; interpreting the body is left to the
    /// normalizer.
    async fn fetch(&self, location: &str) -> Result<FetchedPayload>;
}

/// Persists the latest delivered release time per category.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read every persisted watermark, keyed by bare category name.
    async fn load(&self) -> Result<WatermarkMap>;

    /// Merge the given updates into the persisted set. Categories absent
    /// from `updates` are left untouched.
    async fn commit(&self, updates: &WatermarkUpdateSet) -> Result<()>;
}

/// One downstream notification endpoint.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Identifies the endpoint in logs without leaking credentials.
    fn name(&self) -> String;

    async fn deliver(&self, text: &str) -> Result<()>;
}
