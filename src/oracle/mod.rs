//! Oracle module - Multi-source aggregation and publication policy
//!
//! Quote sources feed per-quantity pools, pools reduce to a median reading,
//! the pricing adapter turns spot and rate into option marks, and the policy
//! decides which candidate snapshots are published.

pub mod aggregator;
pub mod policy;
pub mod pool;
pub mod pricing;
pub mod snapshot;
pub mod sources;
pub mod transport;

pub use aggregator::{median, Aggregator, Reading};
pub use policy::{Decision, PublicationPolicy, Trigger};
pub use pool::SourcePool;
pub use pricing::{MarkPrices, PricingAdapter};
pub use snapshot::{Published, SnapshotState};
pub use sources::{Provider, QuoteSource};
pub use transport::{JsonTransport, ReqwestTransport};
