#![allow(dead_code)]

use alert_relay::{
    AlertRelay, FanOut, FeedFetcher, FetchedPayload, MemoryWatermarkStore, NotifySink,
    RelayConfig, RelayError, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const EQ_FEED: &str = "https://feeds.example.test/alerts/eq.json";
pub const TY_FEED: &str = "https://feeds.example.test/alerts/typhoon.json";
pub const MONTHLY_TEMPLATE: &str = "https://feeds.example.test/reports/{year}{month}.json";
/// `MONTHLY_TEMPLATE` as resolved by `fixed_now`.
pub const MONTHLY_FEED: &str = "https://feeds.example.test/reports/202401.json";
pub const LINK_BASE: &str = "https://alerts.example.test/bulletin/";

/// 2024-01-15 12:00 in UTC+8.
pub fn fixed_now() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
        .unwrap()
}

pub fn test_config(sources: &[&str]) -> RelayConfig {
    let mut env: HashMap<&str, String> = HashMap::new();
    env.insert("ALERT_SOURCES", sources.join(","));
    env.insert("ALERT_LINK_BASE", LINK_BASE.to_string());
    RelayConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// Serves canned responses keyed by resolved location.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, std::result::Result<FetchedPayload, String>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve_json(&self, location: &str, body: serde_json::Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(location.to_string(), Ok(FetchedPayload::json(body.to_string())));
    }

    pub fn serve(&self, location: &str, payload: FetchedPayload) {
        self.responses
            .lock()
            .unwrap()
            .insert(location.to_string(), Ok(payload));
    }

    pub fn fail(&self, location: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(location.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, location: &str) -> Result<FetchedPayload> {
        self.calls.lock().unwrap().push(location.to_string());
        match self.responses.lock().unwrap().get(location) {
            Some(Ok(payload)) => Ok(payload.clone()),
            Some(Err(message)) => Err(RelayError::Feed(message.clone())),
            None => Err(RelayError::Feed(format!("HTTP 404: no document at {location}"))),
        }
    }
}

/// Records every delivered message; can be told to fail.
pub struct RecordingSink {
    name: String,
    delivered: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new(name: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.to_string(),
                delivered: delivered.clone(),
                fail: false,
            },
            delivered,
        )
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delivered: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

#[async_trait]
impl NotifySink for RecordingSink {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(RelayError::Notify(format!("{} is down", self.name)));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub fn alert(release_time: &str, page_key: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "release_time": release_time,
        "page_key": page_key,
        "CMAMtext": text,
    })
}

pub fn typed_alert(release_time: &str, page_key: &str, alert_type: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "release_time": release_time,
        "page_key": page_key,
        "alertType": alert_type,
        "CMAMtext": text,
    })
}

pub fn ok_feed(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": data })
}

pub struct Harness {
    pub relay: AlertRelay,
    pub fetcher: Arc<StaticFetcher>,
    pub store: Arc<MemoryWatermarkStore>,
    pub delivered: Arc<Mutex<Vec<String>>>,
}

pub fn harness(sources: &[&str], store: MemoryWatermarkStore) -> Harness {
    let fetcher = Arc::new(StaticFetcher::new());
    let store = Arc::new(store);
    let (sink, delivered) = RecordingSink::new("primary");
    let relay = AlertRelay::from_config(
        &test_config(sources),
        fetcher.clone(),
        store.clone(),
        FanOut::new(vec![Box::new(sink)]),
    )
    .unwrap();

    Harness {
        relay,
        fetcher,
        store,
        delivered,
    }
}
