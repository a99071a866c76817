pub mod alerts;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod storage;
pub mod tracker;
pub mod types;
