//! # pmospotify - Client du catalogue Spotify
//!
//! Cette crate résout des URLs `open.spotify.com` (piste, album, artiste,
//! playlist) en métadonnées de pistes : titre, artistes, durée, pochette.
//! Elle ne lit aucun flux audio ; `pmolink` s'en sert pour rechercher
//! ensuite chaque piste sur un nœud Lavalink.
//!
//! ## Architecture
//!
//! - `SpotifyClient` : client haut-niveau avec cache
//! - `api` : couche HTTP bas-niveau (token "client credentials", catalogue)
//! - `models` : structures de données et analyse des URLs
//! - `cache` : cache en mémoire avec TTL
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmospotify::{SearchResult, SpotifyClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::new("client_id", "client_secret")?;
//!
//!     match client.search("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").await? {
//!         SearchResult::Track(track) => println!("{} - {}", track.artists, track.name),
//!         other => println!("{} tracks", other.tracks().len()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod error;
pub mod models;

pub use cache::SpotifyCache;
pub use client::SpotifyClient;
pub use error::{Result, SpotifyError};
pub use models::{
    Album, Artist, Playlist, SearchResult, SpotifyKind, SpotifyUrl, Track, SPOTIFY_URL_REGEX,
};
