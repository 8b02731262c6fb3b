//! Structures de données pour représenter les objets Spotify
//!
//! Ces modèles ne conservent que ce dont un nœud audio a besoin pour
//! rechercher la piste ailleurs : titre, artistes, durée, image et URL.

use crate::error::{Result, SpotifyError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    /// URL publique d'un objet du catalogue
    pub static ref SPOTIFY_URL_REGEX: Regex = Regex::new(
        r"https?://open\.spotify\.com/(?P<type>album|artist|playlist|track)/(?P<id>[a-zA-Z0-9]+)"
    )
    .expect("static regex");
}

/// Type d'objet désigné par une URL Spotify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotifyKind {
    Album,
    Artist,
    Playlist,
    Track,
}

impl SpotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotifyKind::Album => "album",
            SpotifyKind::Artist => "artist",
            SpotifyKind::Playlist => "playlist",
            SpotifyKind::Track => "track",
        }
    }
}

impl fmt::Display for SpotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Référence extraite d'une URL `open.spotify.com`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpotifyUrl {
    pub kind: SpotifyKind,
    pub id: String,
}

impl SpotifyUrl {
    /// Analyse une URL du catalogue
    ///
    /// La correspondance est ancrée au début de la chaîne, comme le ferait
    /// une recherche `match` : `"foo https://open.spotify.com/..."` est refusé.
    pub fn parse(url: &str) -> Result<Self> {
        let caps = SPOTIFY_URL_REGEX
            .captures(url)
            .filter(|c| c.get(0).map(|m| m.start()) == Some(0))
            .ok_or_else(|| SpotifyError::InvalidUrl(url.to_string()))?;

        let kind = match &caps["type"] {
            "album" => SpotifyKind::Album,
            "artist" => SpotifyKind::Artist,
            "playlist" => SpotifyKind::Playlist,
            _ => SpotifyKind::Track,
        };

        Ok(Self {
            kind,
            id: caps["id"].to_string(),
        })
    }

    /// Vérifie si la chaîne est une URL du catalogue
    pub fn matches(url: &str) -> bool {
        Self::parse(url).is_ok()
    }

    /// Clé utilisée par le cache
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

/// Représente une piste Spotify
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Identifiant Spotify (vide pour les fichiers locaux d'une playlist)
    pub id: String,
    /// Titre de la piste
    pub name: String,
    /// Artistes, séparés par des virgules
    pub artists: String,
    /// Durée en millisecondes
    pub length: u64,
    /// URL publique de la piste
    pub uri: Option<String>,
    /// Pochette de l'album
    pub image: Option<String>,
}

/// Représente un album Spotify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: String,
    pub tracks: Vec<Track>,
    pub total_tracks: usize,
    pub image: Option<String>,
    pub uri: Option<String>,
}

/// Représente les meilleures pistes d'un artiste
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    /// "Top Tracks by <nom>"
    pub name: String,
    pub artists: String,
    pub tracks: Vec<Track>,
    pub total_tracks: usize,
    pub image: Option<String>,
    pub uri: Option<String>,
}

/// Représente une playlist Spotify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub tracks: Vec<Track>,
    pub total_tracks: usize,
    pub image: Option<String>,
    pub uri: Option<String>,
}

/// Résultat de la résolution d'une URL du catalogue
#[derive(Debug, Clone)]
pub enum SearchResult {
    Track(Track),
    Album(Album),
    Artist(Artist),
    Playlist(Playlist),
}

impl SearchResult {
    /// Nom affichable de l'objet
    pub fn name(&self) -> &str {
        match self {
            SearchResult::Track(t) => &t.name,
            SearchResult::Album(a) => &a.name,
            SearchResult::Artist(a) => &a.name,
            SearchResult::Playlist(p) => &p.name,
        }
    }

    /// Pistes contenues (une seule pour une piste)
    pub fn tracks(&self) -> Vec<Track> {
        match self {
            SearchResult::Track(t) => vec![t.clone()],
            SearchResult::Album(a) => a.tracks.clone(),
            SearchResult::Artist(a) => a.tracks.clone(),
            SearchResult::Playlist(p) => p.tracks.clone(),
        }
    }

    pub fn image(&self) -> Option<&str> {
        match self {
            SearchResult::Track(t) => t.image.as_deref(),
            SearchResult::Album(a) => a.image.as_deref(),
            SearchResult::Artist(a) => a.image.as_deref(),
            SearchResult::Playlist(p) => p.image.as_deref(),
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            SearchResult::Track(t) => t.uri.as_deref(),
            SearchResult::Album(a) => a.uri.as_deref(),
            SearchResult::Artist(a) => a.uri.as_deref(),
            SearchResult::Playlist(p) => p.uri.as_deref(),
        }
    }

    /// Vrai si le résultat est une collection de pistes
    pub fn is_collection(&self) -> bool {
        !matches!(self, SearchResult::Track(_))
    }
}
