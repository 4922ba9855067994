//! Client for NASA's Astronomy Picture of the Day.
//!
//! Fetches the APOD record for a calendar day, keeps a bounded LRU cache of
//! successful results and reports loading / error / ready view states.
//!
//! ```ignore
//! use apod_client::{AppConfig, FetchCachePipeline, HttpClient};
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_env()?;
//! let pipeline = FetchCachePipeline::from_config(Arc::new(HttpClient::new()?), &config)?;
//!
//! let handle = pipeline.request("2024-03-05".parse().ok(), |state| println!("{state:?}"));
//! handle.join().await;
//! ```

pub mod cache;
pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod parser;
pub mod services;
pub mod utils;

pub use cache::DateKeyedCache;
pub use clients::{ApodEndpoint, HttpClient, RemoteFetcher};
pub use config::AppConfig;
pub use domain::{ApodRecord, DateKey, ViewState};
pub use errors::{ApiError, ApiResult, ErrorKind};
pub use handlers::{DateChoice, DateChooser, Presenter, Screen};
pub use parser::{parse_apod, to_json};
pub use services::{FetchCachePipeline, RequestHandle};
