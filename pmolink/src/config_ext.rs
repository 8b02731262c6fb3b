//! Extension pour intégrer la configuration pmolink dans pmoconfig
//!
//! Ce module fournit le trait `LinkConfigExt`, qui lit dans
//! `pmoconfig::Config` les nœuds à enregistrer, les credentials Spotify,
//! la source de recherche par défaut et la politique de reconnexion.
//!
//! ```yaml
//! link:
//!   search_type: ytsearch
//!   reconnect:
//!     base_seconds: 7
//!     max_delay_seconds: 300
//!     max_attempts: null
//!   nodes:
//!     - identifier: main
//!       host: 127.0.0.1
//!       port: 2333
//!       password: youshallnotpass
//! spotify:
//!   client_id: ...
//!   client_secret: ...
//! ```

use crate::backoff::ReconnectPolicy;
use crate::node::{NodeConfig, SpotifyCredentials};
use crate::objects::SearchType;
use anyhow::{anyhow, Result};
use pmoconfig::Config;
use serde_yaml::Value;

/// Trait d'extension pour gérer la configuration pmolink dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmolink::LinkConfigExt;
///
/// let config = get_config();
/// for node in config.get_link_nodes()? {
///     println!("{} -> {}", node.identifier, node.ws_uri());
/// }
/// ```
pub trait LinkConfigExt {
    /// Nœuds déclarés sous `link.nodes`
    ///
    /// Les réglages globaux (credentials Spotify, source de recherche,
    /// reconnexion) complètent chaque nœud qui ne les précise pas.
    fn get_link_nodes(&self) -> Result<Vec<NodeConfig>>;

    /// Credentials Spotify, `None` si l'id ou le secret est vide
    fn get_spotify_credentials(&self) -> Result<Option<SpotifyCredentials>>;

    fn set_spotify_credentials(&self, client_id: &str, client_secret: &str) -> Result<()>;

    /// Source de recherche par défaut (`ytsearch` si absente)
    fn get_default_search_type(&self) -> Result<SearchType>;

    fn set_default_search_type(&self, search_type: SearchType) -> Result<()>;

    /// Politique de reconnexion commune (valeurs par défaut si absente)
    fn get_reconnect_policy(&self) -> Result<ReconnectPolicy>;
}

impl LinkConfigExt for Config {
    fn get_link_nodes(&self) -> Result<Vec<NodeConfig>> {
        let raw: Vec<Value> = match self.get_value(&["link", "nodes"]) {
            Ok(Value::Sequence(nodes)) => nodes,
            Ok(Value::Null) | Err(_) => return Ok(Vec::new()),
            Ok(_) => return Err(anyhow!("link.nodes must be a list")),
        };

        let spotify = self.get_spotify_credentials()?;
        let search_type = self.get_default_search_type()?;
        let reconnect = self.get_reconnect_policy()?;

        raw.into_iter()
            .enumerate()
            .map(|(i, value)| {
                let mut node = value;
                let Value::Mapping(map) = &mut node else {
                    return Err(anyhow!("link.nodes[{}] must be a mapping", i));
                };

                if !map.contains_key("spotify") {
                    if let Some(credentials) = &spotify {
                        map.insert("spotify".into(), serde_yaml::to_value(credentials)?);
                    }
                }
                if !map.contains_key("search_type") {
                    map.insert("search_type".into(), serde_yaml::to_value(search_type)?);
                }
                if !map.contains_key("reconnect") {
                    map.insert("reconnect".into(), serde_yaml::to_value(&reconnect)?);
                }

                serde_yaml::from_value(node)
                    .map_err(|e| anyhow!("Invalid link.nodes[{}]: {}", i, e))
            })
            .collect()
    }

    fn get_spotify_credentials(&self) -> Result<Option<SpotifyCredentials>> {
        let client_id = self.get_string(&["spotify", "client_id"])?;
        let client_secret = self.get_string(&["spotify", "client_secret"])?;

        Ok(match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
                market: self.get_string(&["spotify", "market"])?,
            }),
            _ => None,
        })
    }

    fn set_spotify_credentials(&self, client_id: &str, client_secret: &str) -> Result<()> {
        self.set_value(
            &["spotify", "client_id"],
            Value::String(client_id.to_string()),
        )?;
        self.set_value(
            &["spotify", "client_secret"],
            Value::String(client_secret.to_string()),
        )
    }

    fn get_default_search_type(&self) -> Result<SearchType> {
        match self.get_string(&["link", "search_type"])? {
            Some(value) => value.parse().map_err(|e: String| anyhow!(e)),
            None => Ok(SearchType::default()),
        }
    }

    fn set_default_search_type(&self, search_type: SearchType) -> Result<()> {
        self.set_value(
            &["link", "search_type"],
            Value::String(search_type.to_string()),
        )
    }

    fn get_reconnect_policy(&self) -> Result<ReconnectPolicy> {
        match self.get_value(&["link", "reconnect"]) {
            Ok(Value::Null) | Err(_) => Ok(ReconnectPolicy::default()),
            Ok(_) => self.get_typed(&["link", "reconnect"]),
        }
    }
}
