pub mod aggregator;
pub mod config;
pub mod github;
pub mod release;
