use crate::types::{FetchConfig, RelayError, Result};
use std::env;
use std::str::FromStr;
use tracing::info;
use url::Url;

pub const DEFAULT_WATERMARK_RESOURCE: &str = "alert-relay";
pub const DEFAULT_WATERMARK_PREFIX: &str = "alertType_";
pub const DEFAULT_DRILL_MARKERS: &[&str] = &["演習", "測試", "drill", "exercise"];
pub const DEFAULT_MASKED_DOMAINS: &[&str] = &["cwa.gov.tw"];
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// Ordering between the watermark commit and the deliveries of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Commit and deliveries race. A crash or overlapping run may
    /// duplicate or lose a notification.
    #[default]
    Concurrent,
    /// Commit lands before anything is delivered. A failure after the
    /// commit may lose a notification but never duplicates one.
    CommitFirst,
}

impl FromStr for CommitPolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(CommitPolicy::Concurrent),
            "commit-first" | "commit_first" => Ok(CommitPolicy::CommitFirst),
            other => Err(RelayError::Config(format!("unknown commit policy: {other}"))),
        }
    }
}

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub sources: Vec<String>,
    pub webhook_urls: Vec<String>,
    pub database_url: Option<String>,
    pub watermark_resource: String,
    pub watermark_prefix: String,
    pub drill_markers: Vec<String>,
    pub masked_domains: Vec<String>,
    pub link_base: String,
    pub utc_offset_hours: i32,
    pub commit_policy: CommitPolicy,
    pub fetch: FetchConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sources = split_list(&get("ALERT_SOURCES").ok_or_else(|| missing("ALERT_SOURCES"))?);
        let link_base = get("ALERT_LINK_BASE").ok_or_else(|| missing("ALERT_LINK_BASE"))?;

        let utc_offset_hours = match get("CIVIL_UTC_OFFSET_HOURS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("CIVIL_UTC_OFFSET_HOURS must be an integer, got {raw}")))?,
            None => DEFAULT_UTC_OFFSET_HOURS,
        };

        let mut fetch = FetchConfig::default();
        if let Some(raw) = get("FETCH_TIMEOUT_SECONDS") {
            fetch.timeout_seconds = raw
                .trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("FETCH_TIMEOUT_SECONDS must be a number, got {raw}")))?;
        }
        if let Some(agent) = get("USER_AGENT") {
            fetch.user_agent = agent;
        }

        let config = Self {
            sources,
            webhook_urls: get("WEBHOOK_URLS").map(|v| split_list(&v)).unwrap_or_default(),
            database_url: get("DATABASE_URL"),
            watermark_resource: get("WATERMARK_RESOURCE")
                .unwrap_or_else(|| DEFAULT_WATERMARK_RESOURCE.to_string()),
            watermark_prefix: get("WATERMARK_PREFIX")
                .unwrap_or_else(|| DEFAULT_WATERMARK_PREFIX.to_string()),
            drill_markers: get("DRILL_MARKERS")
                .map(|v| split_markers(&v))
                .unwrap_or_else(|| to_strings(DEFAULT_DRILL_MARKERS)),
            masked_domains: get("MASKED_DOMAINS")
                .map(|v| split_markers(&v))
                .unwrap_or_else(|| to_strings(DEFAULT_MASKED_DOMAINS)),
            link_base,
            utc_offset_hours,
            commit_policy: get("COMMIT_POLICY")
                .map(|v| v.parse::<CommitPolicy>())
                .transpose()?
                .unwrap_or_default(),
            fetch,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for webhook in &self.webhook_urls {
            Url::parse(webhook)
                .map_err(|e| RelayError::Config(format!("invalid webhook URL: {e}")))?;
        }
        Url::parse(&self.link_base)
            .map_err(|e| RelayError::Config(format!("invalid ALERT_LINK_BASE: {e}")))?;
        if self.watermark_prefix.is_empty() {
            return Err(RelayError::Config("WATERMARK_PREFIX must not be empty".to_string()));
        }
        Ok(())
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        let endpoints: Vec<String> = self
            .webhook_urls
            .iter()
            .map(|u| {
                Url::parse(u)
                    .ok()
                    .and_then(|p| p.host_str().map(str::to_string))
                    .unwrap_or_else(|| "***".to_string())
            })
            .collect();

        info!(
            sources = self.sources.len(),
            endpoints = ?endpoints,
            database = self.database_url.is_some(),
            resource = %self.watermark_resource,
            prefix = %self.watermark_prefix,
            drill_markers = ?self.drill_markers,
            utc_offset_hours = self.utc_offset_hours,
            commit_policy = ?self.commit_policy,
            "Loaded relay configuration"
        );
    }
}

fn missing(key: &str) -> RelayError {
    RelayError::Config(format!("{key} environment variable is required"))
}

/// Comma or whitespace separated list.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma separated list; entries may contain spaces.
fn split_markers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
