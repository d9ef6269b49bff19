use crate::types::{RelayError, Result, SourceDescriptor, SourceKind};
use chrono::{DateTime, Datelike, FixedOffset};
use std::collections::BTreeSet;
use url::Url;

/// Date fields a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placeholder {
    Year,
    Month,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "year" => Some(Placeholder::Year),
            "month" => Some(Placeholder::Month),
            _ => None,
        }
    }

    fn token(self) -> &'static str {
        match self {
            Placeholder::Year => "{year}",
            Placeholder::Month => "{month}",
        }
    }

    fn render(self, now: &DateTime<FixedOffset>) -> String {
        match self {
            Placeholder::Year => format!("{:04}", now.year()),
            Placeholder::Month => format!("{:02}", now.month()),
        }
    }

    /// Stand-in used to check that the template forms a valid URL.
    fn sample(self) -> &'static str {
        match self {
            Placeholder::Year => "2000",
            Placeholder::Month => "01",
        }
    }
}

/// A configured feed location, validated and classified once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTemplate {
    raw: String,
    placeholders: BTreeSet<Placeholder>,
    kind: SourceKind,
}

impl SourceTemplate {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RelayError::Config("empty source template".to_string()));
        }

        let placeholders = scan_placeholders(raw)?;

        let sample = placeholders
            .iter()
            .fold(raw.to_string(), |acc, p| acc.replace(p.token(), p.sample()));
        let url = Url::parse(&sample)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(RelayError::Config(format!(
                "source {raw} must use http or https"
            )));
        }

        let kind = classify(raw)?;

        Ok(Self {
            raw: raw.to_string(),
            placeholders,
            kind,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn placeholders(&self) -> &BTreeSet<Placeholder> {
        &self.placeholders
    }

    /// Substitute the civil date into the template.
    pub fn resolve(&self, now: &DateTime<FixedOffset>) -> SourceDescriptor {
        let location = self
            .placeholders
            .iter()
            .fold(self.raw.clone(), |acc, p| acc.replace(p.token(), &p.render(now)));

        SourceDescriptor {
            template: self.raw.clone(),
            location,
            kind: self.kind.clone(),
        }
    }
}

fn scan_placeholders(raw: &str) -> Result<BTreeSet<Placeholder>> {
    let mut found = BTreeSet::new();
    let mut rest = raw;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            RelayError::Config(format!("unterminated placeholder in source {raw}"))
        })?;
        let name = &after[..close];
        let placeholder = Placeholder::from_name(name).ok_or_else(|| {
            RelayError::Config(format!("unknown placeholder {{{name}}} in source {raw}"))
        })?;
        found.insert(placeholder);
        rest = &after[close + 1..];
    }

    if rest.contains('}') {
        return Err(RelayError::Config(format!("stray '}}' in source {raw}")));
    }

    Ok(found)
}

/// Classify by the file name of the location. A period report is named
/// only by its date (`{year}{month}.json`, `202401.json`); a per-category
/// feed is named by its category (`eq.json`). The two shapes cannot overlap
/// because a category name must start with a letter.
fn classify(raw: &str) -> Result<SourceKind> {
    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    let file = path.rsplit('/').next().unwrap_or(path);

    let stem = file.strip_suffix(".json").ok_or_else(|| {
        RelayError::Config(format!("source {raw} does not name a .json document"))
    })?;

    let dateless = stem.replace("{year}", "").replace("{month}", "");
    let has_date = dateless.len() != stem.len() || stem.chars().any(|c| c.is_ascii_digit());
    if has_date
        && dateless
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Ok(SourceKind::Aggregated);
    }

    let mut chars = stem.chars();
    let starts_with_letter = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    if starts_with_letter && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Ok(SourceKind::Single(stem.to_string()));
    }

    Err(RelayError::Config(format!(
        "source {raw} matches neither a category feed nor a period report"
    )))
}
