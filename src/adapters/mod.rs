//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod result_store_adapter;
pub mod sentiment_cache_adapter;
