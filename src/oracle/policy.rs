//! Publication policy - heartbeat and movement triggers
//!
//! A candidate is published when the heartbeat interval has elapsed since the
//! last publish, or when spot has moved by at least the configured fraction.
//! An optional staleness ceiling stops the heartbeat from republishing a
//! fallback spot indefinitely.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::error::{OracleError, Result};
use crate::oracle::snapshot::Published;
use crate::types::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Heartbeat,
    Movement,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Heartbeat => write!(f, "HEARTBEAT"),
            Trigger::Movement => write!(f, "MOVEMENT"),
        }
    }
}

/// Result of evaluating one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Publish { trigger: Trigger, spot_move: f64 },
    Hold { spot_move: f64 },
    /// Heartbeat was due but spot has had no live reading for too long
    Stale { spot_move: f64, stale_for: Duration },
}

impl Decision {
    pub fn should_publish(&self) -> bool {
        matches!(self, Decision::Publish { .. })
    }

    pub fn spot_move(&self) -> f64 {
        match *self {
            Decision::Publish { spot_move, .. }
            | Decision::Hold { spot_move }
            | Decision::Stale { spot_move, .. } => spot_move,
        }
    }

    pub fn trigger(&self) -> Option<Trigger> {
        match *self {
            Decision::Publish { trigger, .. } => Some(trigger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PublicationPolicy {
    post_rate: Duration,
    max_move_fraction: f64,
    max_staleness: Option<Duration>,
}

impl PublicationPolicy {
    pub fn new(post_rate: Duration, max_move_fraction: f64) -> Self {
        Self {
            post_rate,
            max_move_fraction,
            max_staleness: None,
        }
    }

    /// `None` keeps republishing fallback data for as long as sources are down
    pub fn with_max_staleness(mut self, max_staleness: Option<Duration>) -> Self {
        self.max_staleness = max_staleness;
        self
    }

    pub fn post_rate(&self) -> Duration {
        self.post_rate
    }

    pub fn max_move_fraction(&self) -> f64 {
        self.max_move_fraction
    }

    /// Decide whether `candidate` replaces `last`.
    ///
    /// `live_spot_at` is the last time the spot pool produced a live reading.
    /// A zero or non-finite last spot is a `PolicyInvariant` error.
    pub fn evaluate(
        &self,
        candidate: &Snapshot,
        last: &Published,
        live_spot_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let last_spot = last.snapshot.spot_price;
        let spot_move = candidate.spot_move_from(last_spot).ok_or_else(|| {
            OracleError::PolicyInvariant(format!(
                "cannot measure movement against last spot {}",
                last_spot
            ))
        })?;

        if elapsed(last.published_at, now) > self.post_rate {
            if let Some(ceiling) = self.max_staleness {
                let stale_for = elapsed(live_spot_at, now);
                if stale_for > ceiling {
                    return Ok(Decision::Stale {
                        spot_move,
                        stale_for,
                    });
                }
            }
            return Ok(Decision::Publish {
                trigger: Trigger::Heartbeat,
                spot_move,
            });
        }

        if spot_move >= self.max_move_fraction {
            return Ok(Decision::Publish {
                trigger: Trigger::Movement,
                spot_move,
            });
        }

        Ok(Decision::Hold { spot_move })
    }
}

/// Wall-clock gap, clamped at zero if the clock stepped backwards
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn snapshot(spot: f64) -> Snapshot {
        Snapshot {
            spot_price: spot,
            interest_rate: 0.0134,
            call_prices: vec![120.5, 64.25],
            put_prices: vec![3.5, 18.75],
        }
    }

    fn published(spot: f64) -> Published {
        Published {
            snapshot: snapshot(spot),
            published_at: at(0),
        }
    }

    fn policy() -> PublicationPolicy {
        PublicationPolicy::new(Duration::from_secs(60), 0.01)
    }

    #[test]
    fn thresholds_are_exposed() {
        let policy = policy();
        assert_eq!(policy.post_rate(), Duration::from_secs(60));
        assert_eq!(policy.max_move_fraction(), 0.01);
    }

    #[test]
    fn movement_triggers_before_heartbeat() {
        let decision = policy()
            .evaluate(&snapshot(101.5), &published(100.0), at(10), at(10))
            .unwrap();
        assert_eq!(decision.trigger(), Some(Trigger::Movement));
        assert!((decision.spot_move() - 0.015).abs() < 1e-12);
    }

    #[test]
    fn move_exactly_at_threshold_publishes() {
        let decision = policy()
            .evaluate(&snapshot(99.0), &published(100.0), at(5), at(5))
            .unwrap();
        assert_eq!(decision.trigger(), Some(Trigger::Movement));
    }

    #[test]
    fn heartbeat_needs_strictly_more_than_post_rate() {
        let last = published(100.0);
        let on_the_mark = policy().evaluate(&snapshot(100.0), &last, at(60), at(60)).unwrap();
        assert_eq!(on_the_mark, Decision::Hold { spot_move: 0.0 });

        let past = policy().evaluate(&snapshot(100.0), &last, at(61), at(61)).unwrap();
        assert_eq!(past.trigger(), Some(Trigger::Heartbeat));
    }

    #[test]
    fn publishes_iff_heartbeat_or_movement() {
        let last = published(2000.0);
        for (secs, spot) in [(0, 2000.0), (30, 2010.0), (30, 2019.99), (30, 2020.0), (61, 2000.0), (61, 1990.0), (90, 1500.0)] {
            let decision = policy().evaluate(&snapshot(spot), &last, at(secs), at(secs)).unwrap();
            let expected = secs > 60 || ((spot - 2000.0_f64).abs() / 2000.0) >= 0.01;
            assert_eq!(decision.should_publish(), expected, "t={} spot={}", secs, spot);
        }
    }

    #[test]
    fn zero_last_spot_is_an_invariant_violation() {
        let err = policy()
            .evaluate(&snapshot(100.0), &published(0.0), at(1), at(1))
            .unwrap_err();
        assert!(matches!(err, OracleError::PolicyInvariant(_)));
    }

    #[test]
    fn staleness_ceiling_suppresses_heartbeat() {
        let policy = policy().with_max_staleness(Some(Duration::from_secs(300)));
        let last = published(100.0);

        let fresh_enough = policy.evaluate(&snapshot(100.0), &last, at(0), at(120)).unwrap();
        assert_eq!(fresh_enough.trigger(), Some(Trigger::Heartbeat));

        let stale = policy.evaluate(&snapshot(100.0), &last, at(0), at(301)).unwrap();
        assert_eq!(
            stale,
            Decision::Stale {
                spot_move: 0.0,
                stale_for: Duration::from_secs(301)
            }
        );
        assert!(!stale.should_publish());
    }

    #[test]
    fn clock_stepping_back_counts_as_no_elapsed_time() {
        let last = Published {
            snapshot: snapshot(100.0),
            published_at: at(500),
        };
        let decision = policy().evaluate(&snapshot(100.0), &last, at(400), at(400)).unwrap();
        assert_eq!(decision, Decision::Hold { spot_move: 0.0 });
    }
}
