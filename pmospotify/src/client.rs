//! Client principal pour résoudre des URLs du catalogue Spotify
//!
//! Ce module fournit un client haut-niveau avec authentification paresseuse
//! et cache intégré.

use crate::api::SpotifyApi;
use crate::cache::SpotifyCache;
use crate::error::Result;
use crate::models::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Client Spotify haut-niveau avec cache
pub struct SpotifyClient {
    api: SpotifyApi,
    cache: Arc<SpotifyCache>,
}

impl SpotifyClient {
    /// Crée un nouveau client
    ///
    /// Aucun appel réseau n'est fait ici : le token est demandé à la première
    /// requête, puis renouvelé à son expiration.
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmospotify::SpotifyClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = SpotifyClient::new("client_id", "client_secret")?;
    ///     let result = client
    ///         .search("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3")
    ///         .await?;
    ///     println!("{} ({} tracks)", result.name(), result.tracks().len());
    ///     Ok(())
    /// }
    /// ```
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        info!("Creating Spotify client for {}", client_id);
        Ok(Self {
            api: SpotifyApi::new(client_id, client_secret)?,
            cache: Arc::new(SpotifyCache::new()),
        })
    }

    /// Crée un client à partir d'une API déjà configurée
    pub fn with_api(api: SpotifyApi) -> Self {
        Self {
            api,
            cache: Arc::new(SpotifyCache::new()),
        }
    }

    /// Remplace les URLs de l'API Web et du service de comptes
    pub fn with_base_urls(mut self, api_base: &str, accounts_base: &str) -> Self {
        self.api.set_api_base(api_base);
        self.api.set_accounts_base(accounts_base);
        self
    }

    /// Définit le marché utilisé pour les top tracks
    pub fn with_market(mut self, market: &str) -> Self {
        self.api.set_market(market);
        self
    }

    pub fn api(&self) -> &SpotifyApi {
        &self.api
    }

    /// Retourne une référence au cache
    pub fn cache(&self) -> Arc<SpotifyCache> {
        self.cache.clone()
    }

    /// Résout une URL `open.spotify.com` en piste ou collection de pistes
    ///
    /// # Errors
    ///
    /// * `SpotifyError::InvalidUrl` - la chaîne n'est pas une URL du catalogue
    /// * `SpotifyError::Unauthorized` - credentials refusés
    /// * `SpotifyError::NotFound` - objet inexistant
    pub async fn search(&self, url: &str) -> Result<SearchResult> {
        let parsed = SpotifyUrl::parse(url)?;

        if let Some(result) = self.cache.get(&parsed).await {
            debug!("{} found in cache", parsed.cache_key());
            return Ok(result);
        }

        let result = match parsed.kind {
            SpotifyKind::Track => SearchResult::Track(self.api.get_track(&parsed.id).await?),
            SpotifyKind::Album => SearchResult::Album(self.api.get_album(&parsed.id).await?),
            SpotifyKind::Artist => SearchResult::Artist(self.api.get_artist(&parsed.id).await?),
            SpotifyKind::Playlist => {
                SearchResult::Playlist(self.api.get_playlist(&parsed.id).await?)
            }
        };

        debug!(
            "Resolved {} into {} track(s)",
            parsed.cache_key(),
            result.tracks().len()
        );
        self.cache.put(&parsed, result.clone()).await;
        Ok(result)
    }
}
