use crate::types::{AlertRecord, FeedOutcome, FetchedPayload, RelayError, Result, SourceDescriptor, SourceKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Top level shape shared by every feed document.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Value,
}

/// Feeds are not consistent about quoting, so accept either form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    release_time: Scalar,
    page_key: Scalar,
    #[serde(rename = "CMAMtext", default)]
    text: String,
    #[serde(rename = "alertType", default)]
    alert_type: Option<String>,
}

impl RawAlert {
    fn into_record(self, category: String) -> AlertRecord {
        AlertRecord {
            release_time: self.release_time.into(),
            page_key: self.page_key.into(),
            category,
            body: self.text,
        }
    }
}

/// Turns raw feed responses into flat, time ordered alert records.
pub struct FeedNormalizer;

impl FeedNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one source. Any failure (transport error, wrong content
    /// type, unparsable body, `success: false`) degrades to `NoData`.
    pub fn normalize(
        &self,
        descriptor: &SourceDescriptor,
        fetched: Result<FetchedPayload>,
    ) -> FeedOutcome {
        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => {
                warn!(source = %descriptor.location, error = %e, "Fetch failed, no data from source");
                return FeedOutcome::NoData;
            }
        };

        match self.parse_payload(descriptor, &payload) {
            Ok(records) => {
                info!(source = %descriptor.location, status = payload.status, records = records.len(), "Normalized feed");
                FeedOutcome::Records(records)
            }
            Err(e) => {
                warn!(source = %descriptor.location, error = %e, "Unusable feed payload, no data from source");
                FeedOutcome::NoData
            }
        }
    }

    pub fn parse_payload(
        &self,
        descriptor: &SourceDescriptor,
        payload: &FetchedPayload,
    ) -> Result<Vec<AlertRecord>> {
        if !(200..300).contains(&payload.status) {
            return Err(RelayError::Feed(format!("feed answered HTTP {}", payload.status)));
        }

        if !payload.is_json() {
            return Err(RelayError::Feed(format!(
                "unexpected content type {:?}",
                payload.content_type
            )));
        }

        debug!("Parsing feed content ({} bytes)", payload.body.len());
        let envelope: Envelope = serde_json::from_str(&payload.body)?;

        if envelope.success != Some(true) {
            return Err(RelayError::Feed("feed reported success=false".to_string()));
        }

        let mut records = match &descriptor.kind {
            SourceKind::Single(category) => Self::flat_records(envelope.data, category)?,
            SourceKind::Aggregated => Self::grouped_records(envelope.data)?,
        };

        // Stable, so records sharing a release time keep feed order.
        records.sort_by(|a, b| a.release_time.cmp(&b.release_time));
        Ok(records)
    }

    fn flat_records(data: Value, category: &str) -> Result<Vec<AlertRecord>> {
        let Value::Array(items) = data else {
            return Err(RelayError::Feed("expected an alert list".to_string()));
        };

        Ok(items
            .into_iter()
            .filter_map(Self::parse_alert)
            .map(|raw| raw.into_record(category.to_string()))
            .collect())
    }

    /// Flatten `{ group: { subgroup: alert } }`. Leaves may also be lists
    /// of alerts; each record keeps its own embedded category.
    fn grouped_records(data: Value) -> Result<Vec<AlertRecord>> {
        let groups = match data {
            Value::Object(groups) => groups,
            // An empty mapping is often serialized as an empty list.
            Value::Array(items) if items.is_empty() => return Ok(Vec::new()),
            _ => return Err(RelayError::Feed("expected a grouped alert mapping".to_string())),
        };

        let mut records = Vec::new();
        for (group, subgroups) in groups {
            let Value::Object(subgroups) = subgroups else {
                debug!(group = %group, "Skipping non-mapping group");
                continue;
            };

            for (_, leaf) in subgroups {
                let leaves = match leaf {
                    Value::Array(items) => items,
                    other => vec![other],
                };

                for raw in leaves.into_iter().filter_map(Self::parse_alert) {
                    match raw.alert_type.clone() {
                        Some(category) if !category.is_empty() => {
                            records.push(raw.into_record(category))
                        }
                        _ => debug!(group = %group, "Skipping alert without alertType"),
                    }
                }
            }
        }

        Ok(records)
    }

    fn parse_alert(value: Value) -> Option<RawAlert> {
        match serde_json::from_value::<RawAlert>(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(error = %e, "Skipping malformed alert entry");
                None
            }
        }
    }
}

impl Default for FeedNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
