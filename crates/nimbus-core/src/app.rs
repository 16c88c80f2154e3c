use std::sync::Arc;

use nimbus_weather::{
    ApiClient, ForecastService, KeyValueStore, LastCity, PersistentCache, SqliteStore,
    ViewForecast,
};

use crate::{AppError, Config};

/// Application state: configuration, the forecast service and the
/// remembered search.
pub struct App {
    config: Arc<Config>,
    forecasts: ForecastService,
    last_city: LastCity,
}

impl App {
    /// Create an application backed by the SQLite store named in `config`.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(config.database_path())?);
        Self::with_store(config, store)
    }

    /// Create an application on top of an existing store.
    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        let persistent = PersistentCache::with_settings(
            store.clone(),
            config.cache.key_prefix.clone(),
            config.cache.persistent_ttl(),
        );

        let client = ApiClient::builder(&config.api.base_url, store.clone())
            .timeout(config.api.timeout())
            .memory_ttl(config.cache.memory_ttl())
            .persistent_cache(persistent)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Weather API at {}", client.base_url());

        Ok(Self {
            config: Arc::new(config),
            forecasts: ForecastService::new(Arc::new(client)),
            last_city: LastCity::new(store),
        })
    }

    /// Search for `city`. Blank input does nothing and returns `Ok(None)`.
    /// A successful search is remembered for the next start.
    pub async fn search(&self, city: &str) -> Result<Option<ViewForecast>, AppError> {
        let trimmed = city.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let forecast = match self.forecasts.load_forecast(trimmed).await {
            Ok(forecast) => forecast,
            Err(e) => {
                tracing::error!("Weather fetch failed: {}", e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.last_city.remember(trimmed) {
            tracing::warn!("Failed to remember last city: {}", e);
        }

        Ok(Some(forecast))
    }

    /// Repeat the last successful search, if there was one.
    pub async fn restore_last_search(&self) -> Result<Option<ViewForecast>, AppError> {
        match self.last_city.load()? {
            Some(city) => {
                tracing::info!("Restoring last search: {}", city);
                self.search(&city).await
            }
            None => Ok(None),
        }
    }

    /// The city the next start would restore.
    pub fn last_city(&self) -> Result<Option<String>, AppError> {
        Ok(self.last_city.load()?)
    }

    /// Label of the data source behind the latest successful result.
    pub fn last_fetch_label(&self) -> Option<String> {
        self.forecasts.client().last_fetch_label()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
