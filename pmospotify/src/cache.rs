//! Cache en mémoire des objets du catalogue Spotify
//!
//! Les résultats sont indexés par [`SpotifyUrl::cache_key`] ; une même URL
//! résolue plusieurs fois ne coûte qu'une requête par période de TTL.

use crate::models::{SearchResult, SpotifyUrl};
use moka::future::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

/// Durée de vie par défaut d'une entrée
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Cache des résultats de résolution d'URL
#[derive(Clone)]
pub struct SpotifyCache {
    results: Arc<MokaCache<String, SearchResult>>,
}

impl SpotifyCache {
    pub fn new() -> Self {
        Self::with_capacity(500)
    }

    /// Crée un cache avec une capacité spécifique
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::with_settings(max_capacity, Duration::from_secs(DEFAULT_TTL_SECS))
    }

    pub fn with_settings(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            results: Arc::new(
                MokaCache::builder()
                    .max_capacity(max_capacity)
                    .time_to_live(ttl)
                    .build(),
            ),
        }
    }

    pub async fn get(&self, url: &SpotifyUrl) -> Option<SearchResult> {
        self.results.get(&url.cache_key()).await
    }

    pub async fn put(&self, url: &SpotifyUrl, result: SearchResult) {
        self.results.insert(url.cache_key(), result).await;
    }

    /// Vide complètement le cache
    pub async fn clear(&self) {
        self.results.invalidate_all();
        self.results.run_pending_tasks().await;
    }

    /// Nombre approximatif d'entrées
    pub fn entry_count(&self) -> u64 {
        self.results.entry_count()
    }
}

impl Default for SpotifyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;

    fn track(id: &str) -> SearchResult {
        SearchResult::Track(Track {
            id: id.into(),
            name: "Song".into(),
            artists: "Artist".into(),
            length: 1000,
            uri: None,
            image: None,
        })
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = SpotifyCache::new();
        let url = SpotifyUrl::parse("https://open.spotify.com/track/abc").unwrap();

        assert!(cache.get(&url).await.is_none());
        cache.put(&url, track("abc")).await;

        let cached = cache.get(&url).await.unwrap();
        assert_eq!(cached.name(), "Song");
    }

    #[tokio::test]
    async fn test_keys_include_kind() {
        let cache = SpotifyCache::new();
        let as_track = SpotifyUrl::parse("https://open.spotify.com/track/same").unwrap();
        let as_album = SpotifyUrl::parse("https://open.spotify.com/album/same").unwrap();

        cache.put(&as_track, track("same")).await;
        assert!(cache.get(&as_album).await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = SpotifyCache::new();
        let url = SpotifyUrl::parse("https://open.spotify.com/track/abc").unwrap();
        cache.put(&url, track("abc")).await;
        cache.clear().await;
        assert!(cache.get(&url).await.is_none());
    }
}
