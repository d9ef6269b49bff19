pub mod template;

pub use template::{Placeholder, SourceTemplate};

use crate::types::{RelayError, Result, SourceDescriptor};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

/// Every configured source, in configuration order.
#[derive(Debug, Clone)]
pub struct SourceSet {
    templates: Vec<SourceTemplate>,
}

impl SourceSet {
    /// Parse every template, failing on the first invalid one. An invalid
    /// source is a configuration defect, so nothing is skipped.
    pub fn parse<I, S>(raw_templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let templates = raw_templates
            .into_iter()
            .map(|raw| SourceTemplate::parse(raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if templates.is_empty() {
            return Err(RelayError::Config("no alert sources configured".to_string()));
        }

        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[SourceTemplate] {
        &self.templates
    }

    pub fn resolve(&self, now: &DateTime<FixedOffset>) -> Vec<SourceDescriptor> {
        self.templates
            .iter()
            .map(|template| {
                let descriptor = template.resolve(now);
                debug!(template = %template.raw(), location = %descriptor.location, "Resolved source");
                descriptor
            })
            .collect()
    }
}

/// The fixed civil zone used for template expansion.
pub fn civil_offset(utc_offset_hours: i32) -> Result<FixedOffset> {
    utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| RelayError::Config(format!("invalid civil UTC offset: {utc_offset_hours}h")))
}

pub fn civil_now(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}
