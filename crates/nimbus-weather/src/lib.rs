//! Weather data layer for Nimbus
//!
//! Fetches city forecasts from the weather API through a memory cache and a
//! persisted fallback, and reshapes the responses for display.

pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod forecast;
pub mod session;
pub mod store;
pub mod types;

pub use cache::{CacheEntry, MemoryCache, PersistedEntry, PersistentCache};
pub use client::{ApiClient, ApiClientBuilder, DEFAULT_API_BASE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApiError, ErrorKind, ErrorPayload, GENERIC_FAILURE};
pub use forecast::ForecastService;
pub use session::LastCity;
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use types::*;
