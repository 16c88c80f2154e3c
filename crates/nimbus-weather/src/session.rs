//! Remembers the last successfully searched city.

use std::sync::Arc;

use crate::store::{KeyValueStore, StoreResult};

/// Storage key for the last searched city.
pub const LAST_CITY_KEY: &str = "lastCity";

#[derive(Clone)]
pub struct LastCity {
    store: Arc<dyn KeyValueStore>,
}

impl LastCity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The remembered city, ignoring blank values.
    pub fn load(&self) -> StoreResult<Option<String>> {
        Ok(self
            .store
            .get(LAST_CITY_KEY)?
            .filter(|city| !city.trim().is_empty()))
    }

    pub fn remember(&self, city: &str) -> StoreResult<()> {
        self.store.set(LAST_CITY_KEY, city)
    }
}
