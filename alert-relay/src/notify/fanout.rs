use futures::future::join_all;
use tracing::{debug, warn};

use crate::traits::NotifySink;
use crate::types::Notification;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends every notification to every configured endpoint. Deliveries are
/// independent; one failing endpoint affects nothing else.
pub struct FanOut {
    sinks: Vec<Box<dyn NotifySink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<Box<dyn NotifySink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn dispatch(&self, notifications: &[Notification]) -> DispatchReport {
        let deliveries = notifications.iter().flat_map(|notification| {
            self.sinks.iter().map(move |sink| async move {
                match sink.deliver(&notification.text).await {
                    Ok(()) => {
                        debug!(endpoint = %sink.name(), page_key = %notification.page_key, "Delivered");
                        true
                    }
                    Err(e) => {
                        warn!(endpoint = %sink.name(), page_key = %notification.page_key, error = %e, "Delivery failed");
                        false
                    }
                }
            })
        });

        let results = join_all(deliveries).await;
        let delivered = results.iter().filter(|ok| **ok).count();

        DispatchReport {
            delivered,
            failed: results.len() - delivered,
        }
    }
}
