use crate::traits::WatermarkStore;
use crate::types::{RelayError, Result, WatermarkMap, WatermarkUpdateSet};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Watermarks kept as tags on a single resource row set in Postgres. Tag
/// keys are `<prefix><category>`, values are release times.
pub struct PgWatermarkStore {
    db: PgPool,
    resource: String,
    prefix: String,
}

impl PgWatermarkStore {
    pub async fn connect(database_url: &str, resource: String, prefix: String) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self::with_pool(db, resource, prefix))
    }

    pub fn with_pool(db: PgPool, resource: String, prefix: String) -> Self {
        Self {
            db,
            resource,
            prefix,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn load(&self) -> Result<WatermarkMap> {
        let rows = sqlx::query(
            r#"
            SELECT tag_key, tag_value FROM resource_tags
            WHERE resource = $1 AND left(tag_key, length($2)) = $2
            "#,
        )
        .bind(&self.resource)
        .bind(&self.prefix)
        .fetch_all(&self.db)
        .await?;

        let mut watermarks = WatermarkMap::new();
        for row in rows {
            let key: String = row.try_get("tag_key")?;
            let value: String = row.try_get("tag_value")?;
            if let Some(category) = strip_tag_prefix(&key, &self.prefix) {
                watermarks.insert(category.to_string(), value);
            }
        }

        info!(resource = %self.resource, categories = watermarks.len(), "Loaded watermarks");
        Ok(watermarks)
    }

    async fn commit(&self, updates: &WatermarkUpdateSet) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for (category, release_time) in updates {
            // Never move a stored watermark backwards, even if an older run
            // commits after a newer one.
            sqlx::query(
                r#"
                INSERT INTO resource_tags (resource, tag_key, tag_value, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (resource, tag_key) DO UPDATE
                SET tag_value = GREATEST(resource_tags.tag_value COLLATE "C", EXCLUDED.tag_value COLLATE "C"),
                    updated_at = now()
                "#,
            )
            .bind(&self.resource)
            .bind(tag_key(&self.prefix, category))
            .bind(release_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(resource = %self.resource, categories = updates.len(), "Committed watermarks");
        Ok(())
    }
}

pub fn tag_key(prefix: &str, category: &str) -> String {
    format!("{prefix}{category}")
}

pub fn strip_tag_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|category| !category.is_empty())
}

/// In-process store for dry runs and tests. Failures can be switched on to
/// exercise the error paths of a run.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    watermarks: RwLock<WatermarkMap>,
    fail_load: AtomicBool,
    fail_commit: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermarks(watermarks: WatermarkMap) -> Self {
        Self {
            watermarks: RwLock::new(watermarks),
            ..Self::default()
        }
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> WatermarkMap {
        self.watermarks.read().await.clone()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn load(&self) -> Result<WatermarkMap> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(RelayError::Watermark("watermark load unavailable".to_string()));
        }
        Ok(self.watermarks.read().await.clone())
    }

    async fn commit(&self, updates: &WatermarkUpdateSet) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(RelayError::Watermark("watermark commit unavailable".to_string()));
        }

        let mut watermarks = self.watermarks.write().await;
        for (category, release_time) in updates {
            let current = watermarks.entry(category.clone()).or_default();
            if release_time.as_str() > current.as_str() {
                debug!(category = %category, from = %current, to = %release_time, "Advancing watermark");
                *current = release_time.clone();
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
