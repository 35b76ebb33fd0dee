//! Portfolio state and equity tracking for a single-symbol, long-only run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{Fill, Order, Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub position_value: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub pending_order: Option<Order>,
    pub trades: Vec<Trade>,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            pending_order: None,
            trades: Vec::new(),
            fills: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn has_pending_order(&self) -> bool {
        self.pending_order.is_some()
    }

    pub fn position_value(&self, price: f64) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    /// Cash plus the open position marked at `price`.
    pub fn value(&self, price: f64) -> f64 {
        self.cash + self.position_value(price)
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, price: f64) {
        let position_value = self.position_value(price);
        self.equity_curve.push(EquityPoint {
            timestamp,
            cash: self.cash,
            position_value,
            value: self.cash + position_value,
        });
    }

    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.value)
    }
}
