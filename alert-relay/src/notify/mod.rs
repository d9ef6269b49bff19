pub mod fanout;
pub mod noop;
pub mod webhook;

pub use fanout::{DispatchReport, FanOut};
pub use noop::NoopSink;
pub use webhook::WebhookSink;
