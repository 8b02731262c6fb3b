//! Couche d'accès à l'API Web Spotify
//!
//! Ce module fournit une interface bas-niveau pour communiquer avec Spotify :
//! gestion du token applicatif et requêtes GET authentifiées.

pub mod auth;
pub mod catalog;

use crate::error::{Result, SpotifyError};
use auth::AccessToken;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// URL de base de l'API Web
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// URL de base du service de comptes (tokens)
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Marché utilisé pour les "top tracks" d'un artiste
pub const DEFAULT_MARKET: &str = "US";

/// Timeout par défaut des requêtes HTTP
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client API bas-niveau pour communiquer avec Spotify
pub struct SpotifyApi {
    client: Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    market: String,
    token: RwLock<Option<AccessToken>>,
}

impl SpotifyApi {
    /// Crée une nouvelle instance de l'API avec les URLs par défaut
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE_URL.to_string(),
            accounts_base: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            market: DEFAULT_MARKET.to_string(),
            token: RwLock::new(None),
        })
    }

    /// Remplace l'URL de l'API Web (tests, proxy)
    pub fn set_api_base(&mut self, base: impl Into<String>) {
        self.api_base = base.into().trim_end_matches('/').to_string();
    }

    /// Remplace l'URL du service de comptes
    pub fn set_accounts_base(&mut self, base: impl Into<String>) {
        self.accounts_base = base.into().trim_end_matches('/').to_string();
    }

    /// Définit le marché utilisé pour les requêtes dépendantes du pays
    pub fn set_market(&mut self, market: impl Into<String>) {
        self.market = market.into();
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Effectue une requête GET relative à l'URL de base de l'API
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, endpoint);
        self.get_url(&url, params).await
    }

    /// Effectue une requête GET sur une URL absolue (pages `next`)
    pub(crate) async fn get_url<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.bearer_token().await?;

        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Traite la réponse HTTP
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Spotify API error ({}): {}", status_code, error_text);
            if status_code == 401 {
                // Token révoqué ou expiré côté serveur : on le redemandera
                self.token.write().await.take();
            }
            return Err(SpotifyError::from_status_code(status_code, error_text));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            SpotifyError::JsonParse(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_creation() {
        let api = SpotifyApi::new("id", "secret").unwrap();
        assert_eq!(api.client_id(), "id");
        assert_eq!(api.market(), DEFAULT_MARKET);
    }

    #[test]
    fn test_base_urls_are_normalised() {
        let mut api = SpotifyApi::new("id", "secret").unwrap();
        api.set_api_base("http://localhost:1234/v1/");
        api.set_accounts_base("http://localhost:1234/");
        assert_eq!(api.api_base, "http://localhost:1234/v1");
        assert_eq!(api.accounts_base, "http://localhost:1234");
    }
}
