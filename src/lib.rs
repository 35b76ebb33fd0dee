//! sentiquant: sentiment-aware trading strategy backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`service`] wires ports into a
//! single backtest run and [`cli`] is the command-line front end.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod service;
pub mod cli;
