// src/services/mod.rs
pub mod alpha_vantage;
pub mod fetcher;
pub mod google_oauth;
pub mod rates;
pub mod sample;
pub mod sheets;

pub use fetcher::{fetch_all, FetchOptions};
