//! In-memory caching using moka
//!
//! Channel, product, and combination descriptors change rarely compared to
//! how often the pricing screens read them, so they sit behind short-TTL
//! caches. The generation counter lets handlers drop results of loads whose
//! triggering selection has since changed.

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Channel, ChoiceCombination, Product};

/// Application cache for pricing collaborator descriptors
#[derive(Clone)]
pub struct AppCache {
    /// Channel descriptors (id -> Channel)
    pub channels: Cache<Uuid, Arc<Channel>>,
    /// Channel groups (normalized category -> channels)
    pub channel_groups: Cache<String, Arc<Vec<Channel>>>,
    /// Products (id -> Product)
    pub products: Cache<Uuid, Arc<Product>>,
    /// Choice combinations per product (product id -> combinations)
    pub combinations: Cache<Uuid, Arc<Vec<ChoiceCombination>>>,
    selection_generations: Arc<Mutex<HashMap<Uuid, u64>>>,
}

fn lock_generations(map: &Mutex<HashMap<Uuid, u64>>) -> MutexGuard<'_, HashMap<Uuid, u64>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl AppCache {
    /// Create a new cache instance with configured TTLs
    pub fn new() -> Self {
        Self {
            // Channels: small table, 15 min TTL
            channels: Cache::builder()
                .max_capacity(200)
                .time_to_live(Duration::from_secs(15 * 60))
                .time_to_idle(Duration::from_secs(5 * 60))
                .build(),

            channel_groups: Cache::builder()
                .max_capacity(20)
                .time_to_live(Duration::from_secs(15 * 60))
                .build(),

            // Products: 10 min TTL, base prices are edited occasionally
            products: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(10 * 60))
                .time_to_idle(Duration::from_secs(5 * 60))
                .build(),

            combinations: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(10 * 60))
                .build(),

            selection_generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a channel, reading through to the database on a miss.
    pub async fn channel(&self, pool: &PgPool, id: Uuid) -> crate::error::Result<Arc<Channel>> {
        if let Some(cached) = self.channels.get(&id).await {
            return Ok(cached);
        }
        let channel = Arc::new(queries::get_channel(pool, id).await?);
        self.channels.insert(id, channel.clone()).await;
        Ok(channel)
    }

    /// Get a product, reading through to the database on a miss.
    pub async fn product(&self, pool: &PgPool, id: Uuid) -> crate::error::Result<Arc<Product>> {
        if let Some(cached) = self.products.get(&id).await {
            return Ok(cached);
        }
        let product = Arc::new(queries::get_product(pool, id).await?);
        self.products.insert(id, product.clone()).await;
        Ok(product)
    }

    /// Get every channel of a category, reading through on a miss. The key
    /// is the category lowercased so "OTA" and "ota" share one entry.
    pub async fn channels_in_category(
        &self,
        pool: &PgPool,
        category: &str,
    ) -> crate::error::Result<Arc<Vec<Channel>>> {
        let key = category.trim().to_lowercase();
        if let Some(cached) = self.channel_groups.get(&key).await {
            return Ok(cached);
        }
        let group = Arc::new(queries::get_channels_by_category(pool, &key).await?);
        self.channel_groups.insert(key, group.clone()).await;
        Ok(group)
    }

    /// Get a product's choice combinations, reading through on a miss.
    pub async fn combinations_for(
        &self,
        pool: &PgPool,
        product_id: Uuid,
    ) -> crate::error::Result<Arc<Vec<ChoiceCombination>>> {
        if let Some(cached) = self.combinations.get(&product_id).await {
            return Ok(cached);
        }
        let combos = Arc::new(queries::get_choice_combinations(pool, product_id).await?);
        self.combinations.insert(product_id, combos.clone()).await;
        Ok(combos)
    }

    /// Mark a new selection of `subject` and get its token. Earlier tokens
    /// for the same subject stop being current, so their in-flight loads are
    /// dropped instead of overwriting newer state. Selections of other
    /// subjects are unaffected.
    pub fn begin_selection(&self, subject: Uuid) -> GenerationToken {
        let mut generations = lock_generations(&self.selection_generations);
        let generation = generations
            .entry(subject)
            .and_modify(|g| *g += 1)
            .or_insert(1);
        GenerationToken {
            subject,
            generation: *generation,
            registry: Arc::clone(&self.selection_generations),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            channels_size: self.channels.entry_count(),
            channel_groups_size: self.channel_groups.entry_count(),
            products_size: self.products.entry_count(),
            combinations_size: self.combinations.entry_count(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.channels.invalidate_all();
        self.channel_groups.invalidate_all();
        self.products.invalidate_all();
        self.combinations.invalidate_all();
        info!("All caches invalidated");
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Token identifying one selection of one subject. Stale tokens report
/// not-current.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    subject: Uuid,
    generation: u64,
    registry: Arc<Mutex<HashMap<Uuid, u64>>>,
}

impl GenerationToken {
    pub fn is_current(&self) -> bool {
        lock_generations(&self.registry).get(&self.subject) == Some(&self.generation)
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub channels_size: u64,
    pub channel_groups_size: u64,
    pub products_size: u64,
    pub combinations_size: u64,
}

/// Start background cache warmer
///
/// Warms the channel cache on startup and refreshes every 10 minutes.
pub async fn start_cache_warmer(cache: AppCache, db: PgPool) {
    warm_cache(&cache, &db).await;

    let mut interval = interval(Duration::from_secs(10 * 60));
    loop {
        interval.tick().await;
        warm_cache(&cache, &db).await;
    }
}

/// Warm the cache with the channel table, the hottest lookup
async fn warm_cache(cache: &AppCache, db: &PgPool) {
    match queries::get_channels(db).await {
        Ok(channels) => {
            for channel in channels {
                cache.channels.insert(channel.id, Arc::new(channel)).await;
            }
        }
        Err(e) => warn!("Failed to warm channel cache: {}", e),
    }

    info!("Cache warm-up complete. Stats: {:?}", cache.stats());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_selection_invalidates_older_tokens() {
        let cache = AppCache::new();
        let product = Uuid::new_v4();

        let first = cache.begin_selection(product);
        assert!(first.is_current());

        let second = cache.begin_selection(product);
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn selections_of_different_subjects_are_independent() {
        let cache = AppCache::new();

        let a = cache.begin_selection(Uuid::new_v4());
        let b = cache.begin_selection(Uuid::new_v4());

        // Neither load supersedes the other
        assert!(a.is_current());
        assert!(b.is_current());
    }
}
