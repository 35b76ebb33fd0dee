//! Port traits for the capabilities the engine consumes.

pub mod classifier_port;
pub mod config_port;
pub mod news_port;
pub mod price_port;
pub mod result_store_port;
pub mod sentiment_cache_port;
