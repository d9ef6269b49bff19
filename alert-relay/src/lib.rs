pub mod types;
pub mod traits;
pub mod config;
pub mod sources;
pub mod fetcher;
pub mod parser;
pub mod state;
pub mod identity;
pub mod dedup;
pub mod formatter;
pub mod notify;
pub mod relay;

pub use types::*;
pub use config::{CommitPolicy, RelayConfig};
pub use dedup::{DedupEngine, DedupOutcome, DrillFilter};
pub use fetcher::HttpFeedFetcher;
pub use formatter::MessageFormatter;
pub use identity::IdentityRule;
pub use notify::{FanOut, NoopSink, WebhookSink};
pub use parser::FeedNormalizer;
pub use relay::{handle_trigger, AlertRelay, RunSummary};
pub use sources::{SourceSet, SourceTemplate};
pub use state::{MemoryWatermarkStore, PgWatermarkStore};
pub use traits::{FeedFetcher, NotifySink, WatermarkStore};
