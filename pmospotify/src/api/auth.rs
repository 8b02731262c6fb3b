//! Module d'authentification "client credentials" pour l'API Spotify

use super::SpotifyApi;
use crate::error::{Result, SpotifyError};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

/// Marge retirée à la durée de vie annoncée du token
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Réponse de l'endpoint /api/token
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

/// Token applicatif en cache
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn from_response(response: TokenResponse) -> Self {
        let lifetime = (response.expires_in - EXPIRY_MARGIN_SECS).max(0);
        Self {
            value: response.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

impl SpotifyApi {
    /// Retourne un token valide, en le renouvelant si nécessaire
    pub(crate) async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_valid() {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Une autre tâche a pu renouveler le token entre-temps
        if let Some(token) = guard.as_ref() {
            if token.is_valid() {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Demande un nouveau token au service de comptes
    ///
    /// # Errors
    ///
    /// * `SpotifyError::Unauthorized` - client id / secret refusés
    pub async fn request_token(&self) -> Result<AccessToken> {
        info!("Requesting Spotify access token for client {}", self.client_id);

        let url = format!("{}/api/token", self.accounts_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Le service de comptes répond 400 invalid_client pour des credentials faux
            return Err(match status.as_u16() {
                400 | 401 | 403 => SpotifyError::Unauthorized(text),
                code => SpotifyError::from_status_code(code, text),
            });
        }

        let body: TokenResponse = response.json().await?;
        debug!(
            "Token obtained (type {:?}, expires in {}s)",
            body.token_type, body.expires_in
        );
        Ok(AccessToken::from_response(body))
    }

    /// Vérifie si un token valide est en cache
    pub async fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_some_and(AccessToken::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_margin() {
        let token = AccessToken::from_response(TokenResponse {
            access_token: "abc".into(),
            token_type: Some("Bearer".into()),
            expires_in: 3600,
        });
        assert!(token.is_valid());

        let short = AccessToken::from_response(TokenResponse {
            access_token: "abc".into(),
            token_type: None,
            expires_in: 10,
        });
        assert!(!short.is_valid());
    }
}
