//! Position, order and trade records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single open long position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub size: f64,
    pub average_entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.average_entry_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// An order awaiting settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: OrderSide,
    pub size: f64,
    pub intended_price: f64,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
}

/// A settled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub commission: f64,
}

/// A closed round trip. `realized_pnl` is net of entry and exit commission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub realized_pnl: f64,
}

impl Trade {
    /// Break-even trades count as wins.
    pub fn is_win(&self) -> bool {
        self.realized_pnl >= 0.0
    }

    pub fn return_pct(&self) -> f64 {
        let cost = self.entry_price * self.size;
        if cost > 0.0 {
            self.realized_pnl / cost * 100.0
        } else {
            0.0
        }
    }
}
