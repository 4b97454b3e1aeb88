//! Core types used throughout OracleBot
//!
//! Assets, the quantities the oracle tracks, and the snapshot it publishes.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept for spot and mark prices
pub const PRICE_PRECISION: u32 = 3;
/// Decimal places kept for interest rates
pub const INTEREST_PRECISION: u32 = 6;

/// Supported underlying assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    ETH,
    BTC,
}

impl Default for Asset {
    fn default() -> Self {
        Asset::ETH
    }
}

impl Asset {
    /// Upper-case ticker used by exchange endpoints (e.g. "ETH")
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::ETH => "ETH",
            Asset::BTC => "BTC",
        }
    }

    /// Underlying code understood by the mark price service
    pub fn underlying_code(&self) -> u8 {
        match self {
            Asset::ETH => 0,
            Asset::BTC => 1,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ETH" => Some(Asset::ETH),
            "BTC" => Some(Asset::BTC),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Kind of scalar a source pool provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Spot price of the underlying
    Price,
    /// Risk-free interest rate
    Rate,
}

impl Quantity {
    pub fn precision(&self) -> u32 {
        match self {
            Quantity::Price => PRICE_PRECISION,
            Quantity::Rate => INTEREST_PRECISION,
        }
    }

    /// Round a raw value to this quantity's fixed precision
    pub fn round(&self, value: f64) -> f64 {
        round_dp(value, self.precision())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Price => write!(f, "price"),
            Quantity::Rate => write!(f, "rate"),
        }
    }
}

/// Round half-to-even at `dp` decimal places.
///
/// Non-finite inputs are returned unchanged; callers reject them before they
/// reach a snapshot.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// One published observation for an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub spot_price: f64,
    pub interest_rate: f64,
    /// Call marks, ordered as the pricing service returns them
    pub call_prices: Vec<f64>,
    /// Put marks, same length and order as `call_prices`
    pub put_prices: Vec<f64>,
}

impl Snapshot {
    /// Relative spot move of `self` against a baseline spot.
    ///
    /// Returns `None` when the baseline is zero or not finite.
    pub fn spot_move_from(&self, baseline_spot: f64) -> Option<f64> {
        if baseline_spot == 0.0 || !baseline_spot.is_finite() {
            return None;
        }
        Some(((self.spot_price - baseline_spot) / baseline_spot).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_parses_case_insensitively() {
        assert_eq!(Asset::from_str("eth"), Some(Asset::ETH));
        assert_eq!(Asset::from_str(" BTC "), Some(Asset::BTC));
        assert_eq!(Asset::from_str("doge"), None);
    }

    #[test]
    fn quantity_rounds_to_its_precision() {
        assert_eq!(Quantity::Price.round(1834.123456), 1834.123);
        assert_eq!(Quantity::Rate.round(0.0345678912), 0.034568);
        assert_eq!(Quantity::Price.round(101.0), 101.0);
    }

    #[test]
    fn round_dp_passes_through_non_finite() {
        assert!(round_dp(f64::NAN, 3).is_nan());
        assert_eq!(round_dp(f64::INFINITY, 3), f64::INFINITY);
    }

    #[test]
    fn spot_move_is_relative_and_absolute() {
        let snapshot = Snapshot {
            spot_price: 98.5,
            interest_rate: 0.02,
            call_prices: vec![],
            put_prices: vec![],
        };
        let moved = snapshot.spot_move_from(100.0).unwrap();
        assert!((moved - 0.015).abs() < 1e-12);
        assert_eq!(snapshot.spot_move_from(0.0), None);
    }
}
