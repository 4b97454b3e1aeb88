//! Last-known-good snapshot per asset
//!
//! `SnapshotState` starts uninitialized, becomes initialized once, and from
//! then on is only ever replaced wholesale by a finalized publish decision.

use chrono::{DateTime, Utc};

use crate::error::{OracleError, Result};
use crate::types::{Asset, Snapshot};

/// A snapshot together with the time it was (or would have been) posted
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub snapshot: Snapshot,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotState {
    asset: Asset,
    published: Option<Published>,
}

impl SnapshotState {
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            published: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.published.is_some()
    }

    /// First snapshot; only allowed once
    pub fn initialize(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> Result<()> {
        if self.published.is_some() {
            return Err(OracleError::AlreadyInitialized(self.asset));
        }
        self.published = Some(Published {
            snapshot,
            published_at: now,
        });
        Ok(())
    }

    pub fn current(&self) -> Result<&Published> {
        self.published
            .as_ref()
            .ok_or(OracleError::NotInitialized(self.asset))
    }

    /// Replace the published snapshot after a publish decision
    pub fn advance(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> Result<()> {
        let published = self
            .published
            .as_mut()
            .ok_or(OracleError::NotInitialized(self.asset))?;
        *published = Published {
            snapshot,
            published_at: now,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(spot: f64) -> Snapshot {
        Snapshot {
            spot_price: spot,
            interest_rate: 0.0134,
            call_prices: vec![12.5],
            put_prices: vec![8.25],
        }
    }

    #[test]
    fn lifecycle_is_uninitialized_then_initialized() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_700_000_090, 0).unwrap();
        let mut state = SnapshotState::new(Asset::ETH);

        assert!(matches!(state.current(), Err(OracleError::NotInitialized(Asset::ETH))));
        assert!(state.advance(snapshot(1.0), t0).is_err());

        state.initialize(snapshot(1850.0), t0).unwrap();
        assert!(state.is_initialized());
        assert!(matches!(
            state.initialize(snapshot(1.0), t1),
            Err(OracleError::AlreadyInitialized(Asset::ETH))
        ));

        state.advance(snapshot(1870.0), t1).unwrap();
        let current = state.current().unwrap();
        assert_eq!(current.snapshot.spot_price, 1870.0);
        assert_eq!(current.published_at, t1);
    }
}
