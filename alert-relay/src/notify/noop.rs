use async_trait::async_trait;

use crate::traits::NotifySink;
use crate::types::Result;

/// Accepts every message and sends nothing.
pub struct NoopSink;

#[async_trait]
impl NotifySink for NoopSink {
    fn name(&self) -> String {
        "noop".to_string()
    }

    async fn deliver(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
