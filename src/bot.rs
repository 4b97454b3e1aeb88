//! Oracle bot - per-asset read/decide/publish loop
//!
//! Each configured asset owns its spot and rate pools and its snapshot
//! state, so asset loops run as independent tasks without shared locks.
//! Recoverable failures inside a cycle fall back to the last published
//! values; submission and policy invariant failures end the loop.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{OracleError, Result};
use crate::ledger::LedgerSubmitter;
use crate::oracle::{
    Aggregator, Decision, JsonTransport, PricingAdapter, PublicationPolicy, Published, SnapshotState,
    SourcePool,
};
use crate::persistence::{PublicationJournal, PublicationRecord};
use crate::types::{Asset, Quantity, Snapshot};

/// Where a snapshot component came from this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    /// Reused from the last published snapshot
    Fallback,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Live => write!(f, "live"),
            Origin::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSources {
    pub spot: Origin,
    pub rate: Origin,
    pub marks: Origin,
}

/// Outcome of one read cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub asset: Asset,
    /// Candidate built this cycle
    pub snapshot: Snapshot,
    pub decision: Decision,
    pub sources: CycleSources,
}

/// Collaborators shared read-only by every asset loop
struct BotContext {
    aggregator: Aggregator,
    pricing: PricingAdapter,
    submitter: Option<Arc<dyn LedgerSubmitter>>,
    policy: PublicationPolicy,
    read_interval: Duration,
    journal: Option<Arc<PublicationJournal>>,
}

struct AssetFeed {
    asset: Asset,
    spot: SourcePool,
    rate: SourcePool,
    state: SnapshotState,
    /// Last time the spot pool produced a live reading
    live_spot_at: Option<DateTime<Utc>>,
}

impl AssetFeed {
    async fn initialize(&mut self, ctx: &BotContext, now: DateTime<Utc>) -> Result<()> {
        let asset = self.asset;
        let spot = ctx.aggregator.reduce(&mut self.spot, asset).await?;
        let rate = ctx.aggregator.reduce(&mut self.rate, asset).await?;
        let marks = ctx.pricing.derive(asset, spot.value, rate.value).await?;

        let snapshot = Snapshot {
            spot_price: spot.value,
            interest_rate: rate.value,
            call_prices: marks.call_prices,
            put_prices: marks.put_prices,
        };
        self.state.initialize(snapshot, now)?;
        self.live_spot_at = Some(now);

        info!(
            asset = %asset,
            spot = spot.value,
            rate = rate.value,
            strikes = self.state.current()?.snapshot.call_prices.len(),
            "🟢 Asset initialized"
        );
        Ok(())
    }

    async fn poll(&mut self, ctx: &BotContext, now: DateTime<Utc>) -> Result<CycleReport> {
        let asset = self.asset;
        let last = self.state.current()?.clone();

        let (spot_price, spot_origin) = match ctx.aggregator.reduce(&mut self.spot, asset).await {
            Ok(reading) => {
                self.live_spot_at = Some(now);
                (reading.value, Origin::Live)
            }
            Err(e) if e.is_recoverable() => {
                warn!(asset = %asset, error = %e, "Spot unavailable, reusing last published spot");
                (last.snapshot.spot_price, Origin::Fallback)
            }
            Err(e) => return Err(e),
        };

        let (interest_rate, rate_origin) = match ctx.aggregator.reduce(&mut self.rate, asset).await {
            Ok(reading) => (reading.value, Origin::Live),
            Err(e) if e.is_recoverable() => {
                warn!(asset = %asset, error = %e, "Rate unavailable, reusing last published rate");
                (last.snapshot.interest_rate, Origin::Fallback)
            }
            Err(e) => return Err(e),
        };

        let (call_prices, put_prices, marks_origin) =
            match ctx.pricing.derive(asset, spot_price, interest_rate).await {
                Ok(marks) => (marks.call_prices, marks.put_prices, Origin::Live),
                Err(e) if e.is_recoverable() => {
                    warn!(asset = %asset, error = %e, "Marks unavailable, reusing last published marks");
                    (
                        last.snapshot.call_prices.clone(),
                        last.snapshot.put_prices.clone(),
                        Origin::Fallback,
                    )
                }
                Err(e) => return Err(e),
            };

        let candidate = Snapshot {
            spot_price,
            interest_rate,
            call_prices,
            put_prices,
        };
        let sources = CycleSources {
            spot: spot_origin,
            rate: rate_origin,
            marks: marks_origin,
        };

        info!(asset = %asset, spot = spot_price, rate = interest_rate, spot_source = %spot_origin, "read");

        let live_spot_at = self.live_spot_at.unwrap_or(last.published_at);
        let decision = ctx.policy.evaluate(&candidate, &last, live_spot_at, now)?;

        match decision {
            Decision::Publish { trigger, spot_move } => {
                let submitted = match &ctx.submitter {
                    Some(submitter) => {
                        submitter
                            .submit(asset, &candidate)
                            .await
                            .map_err(|e| match e {
                                e @ OracleError::Submission { .. } => e,
                                other => OracleError::Submission {
                                    asset,
                                    reason: other.to_string(),
                                },
                            })?;
                        true
                    }
                    None => false,
                };

                self.state.advance(candidate.clone(), now)?;
                info!(
                    asset = %asset,
                    trigger = %trigger,
                    spot = spot_price,
                    move_pct = %format!("{:.3}", spot_move * 100.0),
                    submitted,
                    "posted"
                );

                if let Some(journal) = &ctx.journal {
                    let record =
                        PublicationRecord::new(asset, trigger, &candidate, spot_move, submitted, now);
                    if let Err(e) = journal.record(&record, now).await {
                        warn!(asset = %asset, error = %e, "Failed to journal publication");
                    }
                }
            }
            Decision::Stale { stale_for, .. } => {
                warn!(
                    asset = %asset,
                    stale_secs = stale_for.as_secs(),
                    "Heartbeat suppressed, spot has no live reading"
                );
            }
            Decision::Hold { spot_move } => {
                debug!(asset = %asset, move_pct = %format!("{:.3}", spot_move * 100.0), "hold");
            }
        }

        Ok(CycleReport {
            asset,
            snapshot: candidate,
            decision,
            sources,
        })
    }

    /// Poll forever at the read interval; only fatal errors return
    async fn run(&mut self, ctx: Arc<BotContext>) -> Result<()> {
        self.state.current()?;
        info!(asset = %self.asset, read_secs = ctx.read_interval.as_secs(), "🚀 Read loop started");

        loop {
            match self.poll(&ctx, Utc::now()).await {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(asset = %self.asset, error = %e, "Cycle failed, retrying next tick");
                }
                Err(e) => {
                    error!(asset = %self.asset, error = %e, "🛑 Read loop stopped");
                    return Err(e);
                }
            }
            tokio::time::sleep(ctx.read_interval).await;
        }
    }
}

/// Publishes median spot/rate snapshots and their option marks for every configured asset
pub struct OracleBot {
    ctx: Arc<BotContext>,
    assets: Vec<Asset>,
    feeds: HashMap<Asset, AssetFeed>,
}

impl fmt::Debug for OracleBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let initialized: Vec<Asset> = self
            .assets
            .iter()
            .copied()
            .filter(|asset| self.is_initialized(*asset))
            .collect();
        f.debug_struct("OracleBot")
            .field("assets", &self.assets)
            .field("initialized", &initialized)
            .field("submit", &self.ctx.submitter.is_some())
            .finish()
    }
}

impl OracleBot {
    /// Connect every configured source and build the bot.
    ///
    /// `submitter` is required when `bot.submit_enabled` is set and ignored
    /// otherwise.
    pub async fn connect(
        config: &AppConfig,
        transport: Arc<dyn JsonTransport>,
        submitter: Option<Arc<dyn LedgerSubmitter>>,
    ) -> Result<Self> {
        config.bot.validate()?;
        let assets = config.bot.assets()?;
        let spot_providers = config.sources.spot_providers()?;
        let rate_providers = config.sources.rate_providers()?;
        let ttl = config.bot.read_interval();

        let submitter = match (config.bot.submit_enabled, submitter) {
            (true, None) => {
                return Err(OracleError::Config(
                    "bot.submit_enabled is set but no ledger submitter was provided".to_string(),
                ))
            }
            (true, submitter) => submitter,
            (false, _) => None,
        };

        let journal = if config.persistence.csv_enabled {
            let journal = PublicationJournal::new(&config.persistence.data_dir)
                .map_err(|e| OracleError::Config(format!("{:#}", e)))?;
            Some(Arc::new(journal))
        } else {
            None
        };

        let mut feeds = HashMap::new();
        for &asset in &assets {
            let spot =
                SourcePool::connect("spot", Quantity::Price, &spot_providers, ttl, transport.clone()).await?;
            let rate =
                SourcePool::connect("rate", Quantity::Rate, &rate_providers, ttl, transport.clone()).await?;
            feeds.insert(
                asset,
                AssetFeed {
                    asset,
                    spot,
                    rate,
                    state: SnapshotState::new(asset),
                    live_spot_at: None,
                },
            );
        }

        let ctx = BotContext {
            aggregator: Aggregator::new(config.sources.timeout()),
            pricing: PricingAdapter::new(&config.pricing_base_url(), transport)
                .with_timeout(config.pricing.timeout()),
            policy: PublicationPolicy::new(config.bot.post_interval(), config.bot.max_move_fraction)
                .with_max_staleness(config.bot.max_staleness()),
            read_interval: ttl,
            submitter,
            journal,
        };

        info!(
            assets = ?assets,
            pricing = %ctx.pricing.base_url(),
            post_secs = ctx.policy.post_rate().as_secs(),
            max_move = ctx.policy.max_move_fraction(),
            submit = ctx.submitter.is_some(),
            journal = ?ctx.journal.as_ref().map(|j| j.dir().to_path_buf()),
            "✅ Oracle bot connected"
        );

        Ok(Self {
            ctx: Arc::new(ctx),
            assets,
            feeds,
        })
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn is_initialized(&self, asset: Asset) -> bool {
        self.feeds
            .get(&asset)
            .map(|feed| feed.state.is_initialized())
            .unwrap_or(false)
    }

    /// Last published snapshot, if the asset is initialized
    pub fn published(&self, asset: Asset) -> Option<&Published> {
        self.feeds.get(&asset).and_then(|feed| feed.state.current().ok())
    }

    /// Establish the first snapshot for `asset`
    pub async fn initialize(&mut self, asset: Asset) -> Result<()> {
        self.initialize_at(asset, Utc::now()).await
    }

    pub async fn initialize_at(&mut self, asset: Asset, now: DateTime<Utc>) -> Result<()> {
        let feed = self
            .feeds
            .get_mut(&asset)
            .ok_or(OracleError::UnknownAsset(asset))?;
        if feed.state.is_initialized() {
            return Err(OracleError::AlreadyInitialized(asset));
        }

        feed.initialize(&self.ctx, now)
            .await
            .map_err(|e| OracleError::Initialization {
                asset,
                source: Box::new(e),
            })
    }

    /// Run one read cycle for `asset` as of `now`
    pub async fn poll_at(&mut self, asset: Asset, now: DateTime<Utc>) -> Result<CycleReport> {
        let feed = self
            .feeds
            .get_mut(&asset)
            .ok_or(OracleError::UnknownAsset(asset))?;
        feed.poll(&self.ctx, now).await
    }

    /// Run the read loop for one asset until a fatal error
    pub async fn run(&mut self, asset: Asset) -> Result<()> {
        let ctx = self.ctx.clone();
        let feed = self
            .feeds
            .get_mut(&asset)
            .ok_or(OracleError::UnknownAsset(asset))?;
        feed.run(ctx).await
    }

    /// Run every initialized asset as its own task; returns the first fatal error
    pub async fn run_all(self) -> Result<()> {
        let OracleBot { ctx, feeds, .. } = self;
        let mut tasks = JoinSet::new();

        for (asset, mut feed) in feeds {
            if !feed.state.is_initialized() {
                warn!(asset = %asset, "Skipping uninitialized asset");
                continue;
            }
            let ctx = ctx.clone();
            tasks.spawn(async move { feed.run(ctx).await });
        }

        if tasks.is_empty() {
            return Err(OracleError::Config("no initialized assets to run".to_string()));
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(e) => Err(OracleError::TaskFailed(e.to_string())),
            };
            if outcome.is_err() {
                tasks.abort_all();
                return outcome;
            }
        }
        Ok(())
    }
}
