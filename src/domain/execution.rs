//! Order placement and fill simulation.
//!
//! Orders fill in full at the intended (bar close) price with a
//! proportional commission and no slippage. At most one order may be
//! pending; settlement is immediate, so the pending slot is always empty
//! again by the time the next signal is evaluated.

use chrono::{DateTime, Utc};
use tracing::info;

use super::portfolio::Portfolio;
use super::position::{Fill, Order, OrderSide, Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Proportional commission on traded value, e.g. 0.001 for 0.1%.
    pub commission_rate: f64,
    /// Fraction of cash committed to a new position.
    pub position_size: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.001,
            position_size: 0.95,
        }
    }
}

pub fn calculate_commission(trade_value: f64, commission_rate: f64) -> f64 {
    trade_value * commission_rate
}

/// Queue an order. Returns `false`, leaving the portfolio untouched, when
/// another order is still pending.
pub fn place_order(portfolio: &mut Portfolio, order: Order) -> bool {
    if portfolio.has_pending_order() {
        return false;
    }
    portfolio.pending_order = Some(order);
    true
}

/// Execute the pending order, if any.
pub fn settle_pending(portfolio: &mut Portfolio, config: &ExecutionConfig) -> Option<Fill> {
    let order = portfolio.pending_order.take()?;
    let fill = match order.side {
        OrderSide::Buy => fill_buy(portfolio, &order, config),
        OrderSide::Sell => fill_sell(portfolio, &order, config),
    }?;
    info!(
        bar = fill.bar_index,
        side = ?fill.side,
        size = fill.size,
        price = fill.price,
        commission = fill.commission,
        "order filled"
    );
    portfolio.fills.push(fill.clone());
    Some(fill)
}

fn fill_buy(portfolio: &mut Portfolio, order: &Order, config: &ExecutionConfig) -> Option<Fill> {
    if portfolio.has_position() {
        return None;
    }
    let value = order.size * order.intended_price;
    let commission = calculate_commission(value, config.commission_rate);
    portfolio.cash -= value + commission;
    portfolio.position = Some(Position {
        size: order.size,
        average_entry_price: order.intended_price,
        entry_time: order.timestamp,
        entry_bar: order.bar_index,
        entry_commission: commission,
    });
    Some(Fill {
        bar_index: order.bar_index,
        timestamp: order.timestamp,
        side: OrderSide::Buy,
        size: order.size,
        price: order.intended_price,
        commission,
    })
}

fn fill_sell(portfolio: &mut Portfolio, order: &Order, config: &ExecutionConfig) -> Option<Fill> {
    let position = portfolio.position.take()?;
    let size = position.size;
    let proceeds = size * order.intended_price;
    let commission = calculate_commission(proceeds, config.commission_rate);
    portfolio.cash += proceeds - commission;

    let gross_pnl = size * (order.intended_price - position.average_entry_price);
    let total_commission = position.entry_commission + commission;
    portfolio.trades.push(Trade {
        entry_time: position.entry_time,
        exit_time: order.timestamp,
        entry_price: position.average_entry_price,
        exit_price: order.intended_price,
        size,
        gross_pnl,
        commission: total_commission,
        realized_pnl: gross_pnl - total_commission,
    });

    Some(Fill {
        bar_index: order.bar_index,
        timestamp: order.timestamp,
        side: OrderSide::Sell,
        size,
        price: order.intended_price,
        commission,
    })
}

/// Size of a new long position: `position_size` of cash at `price`, shrunk
/// if needed so that cost plus commission never exceeds cash.
pub fn entry_size(cash: f64, price: f64, config: &ExecutionConfig) -> f64 {
    if cash <= 0.0 || price <= 0.0 {
        return 0.0;
    }
    let size = cash * config.position_size / price;
    let max_size = cash / (price * (1.0 + config.commission_rate));
    size.min(max_size)
}

/// Open a long position at `price` when flat and nothing is pending.
pub fn enter_long(
    portfolio: &mut Portfolio,
    bar_index: usize,
    timestamp: DateTime<Utc>,
    price: f64,
    config: &ExecutionConfig,
) -> Option<Fill> {
    if portfolio.has_position() {
        return None;
    }
    let size = entry_size(portfolio.cash, price, config);
    if size <= 0.0 {
        return None;
    }
    let order = Order {
        side: OrderSide::Buy,
        size,
        intended_price: price,
        bar_index,
        timestamp,
    };
    if !place_order(portfolio, order) {
        return None;
    }
    settle_pending(portfolio, config)
}

/// Close the whole position at `price`, recording a [`Trade`].
pub fn exit_long(
    portfolio: &mut Portfolio,
    bar_index: usize,
    timestamp: DateTime<Utc>,
    price: f64,
    config: &ExecutionConfig,
) -> Option<Fill> {
    let size = portfolio.position.as_ref()?.size;
    let order = Order {
        side: OrderSide::Sell,
        size,
        intended_price: price,
        bar_index,
        timestamp,
    };
    if !place_order(portfolio, order) {
        return None;
    }
    settle_pending(portfolio, config)
}
