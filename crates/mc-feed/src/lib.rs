//! Refresh pipeline: adapters in, one shared `Snapshot` out.

pub mod aggregator;
pub mod cache;
pub mod normalize;
pub mod poller;
pub mod push;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use cache::{CachePhase, SnapshotCache, Subscription};
pub use normalize::{ProgressEstimator, RandomProgress, GATEWAY_UNAVAILABLE};
pub use poller::{Poller, DEFAULT_POLL_INTERVAL};
pub use push::{PushClient, PushConfig, PushExit};
