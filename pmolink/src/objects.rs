//! Pistes, playlists et résultats de résolution
//!
//! Ces objets sont immuables : leurs champs ne sont accessibles qu'en
//! lecture une fois construits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source de recherche préfixée aux requêtes qui ne sont pas des URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// YouTube
    #[default]
    YtSearch,
    /// YouTube Music
    YtmSearch,
    /// SoundCloud
    ScSearch,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::YtSearch => "ytsearch",
            SearchType::YtmSearch => "ytmsearch",
            SearchType::ScSearch => "scsearch",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ytsearch" => Ok(SearchType::YtSearch),
            "ytmsearch" => Ok(SearchType::YtmSearch),
            "scsearch" => Ok(SearchType::ScSearch),
            other => Err(format!("unknown search type '{}'", other)),
        }
    }
}

/// Contexte de la demande à l'origine d'une piste (qui, où)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub guild_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub requester_id: Option<u64>,
}

/// Métadonnées d'une piste, au format du nœud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Millisecondes
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

fn youtube_thumbnail(info: &TrackInfo) -> Option<String> {
    let from_youtube = info.source_name.as_deref() == Some("youtube")
        || info
            .uri
            .as_deref()
            .is_some_and(|uri| uri.contains("youtube.com") || uri.contains("youtu.be"));

    (from_youtube && !info.identifier.is_empty())
        .then(|| format!("https://img.youtube.com/vi/{}/mqdefault.jpg", info.identifier))
}

/// Piste jouable par un nœud
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    track_id: String,
    info: TrackInfo,
    thumbnail: Option<String>,
    ctx: Option<RequestContext>,
    spotify: bool,
    search_type: Option<SearchType>,
}

impl Track {
    pub fn new(
        track_id: impl Into<String>,
        info: TrackInfo,
        ctx: Option<RequestContext>,
        spotify: bool,
        search_type: Option<SearchType>,
    ) -> Self {
        let thumbnail = info.thumbnail.clone().or_else(|| youtube_thumbnail(&info));
        Self {
            track_id: track_id.into(),
            info,
            thumbnail,
            ctx,
            spotify,
            search_type,
        }
    }

    /// Identifiant encodé à transmettre au nœud pour jouer la piste
    ///
    /// Pour une piste Spotify, c'est l'identifiant du catalogue : il faut
    /// d'abord la rechercher sur un nœud.
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    /// Durée en millisecondes
    pub fn length(&self) -> u64 {
        self.info.length
    }

    pub fn uri(&self) -> Option<&str> {
        self.info.uri.as_deref()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.info.source_name.as_deref()
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }

    pub fn is_seekable(&self) -> bool {
        self.info.is_seekable
    }

    pub fn position(&self) -> u64 {
        self.info.position
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn ctx(&self) -> Option<&RequestContext> {
        self.ctx.as_ref()
    }

    pub fn is_spotify(&self) -> bool {
        self.spotify
    }

    pub fn search_type(&self) -> Option<SearchType> {
        self.search_type
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.info.author, self.info.title)
    }
}

/// Playlist chargée depuis un nœud ou depuis Spotify
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    name: String,
    selected_track: Option<usize>,
    tracks: Vec<Track>,
    thumbnail: Option<String>,
    uri: Option<String>,
    ctx: Option<RequestContext>,
    spotify: bool,
}

impl Playlist {
    /// Playlist rapportée par un nœud
    ///
    /// Un index sélectionné négatif signifie « aucune sélection ». La
    /// vignette est celle de la première piste.
    pub fn from_node(
        name: impl Into<String>,
        selected_track: i64,
        tracks: Vec<Track>,
        ctx: Option<RequestContext>,
    ) -> Self {
        let thumbnail = tracks.first().and_then(|t| t.thumbnail().map(str::to_string));
        Self {
            name: name.into(),
            selected_track: usize::try_from(selected_track).ok(),
            tracks,
            thumbnail,
            uri: None,
            ctx,
            spotify: false,
        }
    }

    /// Collection issue du catalogue Spotify (album, artiste, playlist)
    pub fn from_spotify(
        name: impl Into<String>,
        tracks: Vec<Track>,
        thumbnail: Option<String>,
        uri: Option<String>,
        ctx: Option<RequestContext>,
    ) -> Self {
        Self {
            name: name.into(),
            selected_track: Some(0),
            tracks,
            thumbnail,
            uri,
            ctx,
            spotify: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_track
    }

    /// Piste sélectionnée, si l'index est valide
    pub fn selected_track(&self) -> Option<&Track> {
        self.selected_track.and_then(|i| self.tracks.get(i))
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn ctx(&self) -> Option<&RequestContext> {
        self.ctx.as_ref()
    }

    pub fn is_spotify(&self) -> bool {
        self.spotify
    }
}

/// Résultat d'une résolution réussie
///
/// Un échec est toujours une erreur `TrackLoad`, jamais une liste vide.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Tracks(Vec<Track>),
    Playlist(Playlist),
}

impl Resolution {
    pub fn tracks(&self) -> &[Track] {
        match self {
            Resolution::Tracks(tracks) => tracks,
            Resolution::Playlist(playlist) => playlist.tracks(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().is_empty()
    }

    pub fn is_playlist(&self) -> bool {
        matches!(self, Resolution::Playlist(_))
    }

    pub fn first(&self) -> Option<&Track> {
        self.tracks().first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(identifier: &str, uri: &str) -> TrackInfo {
        TrackInfo {
            identifier: identifier.into(),
            is_seekable: true,
            author: "Rick Astley".into(),
            length: 212000,
            is_stream: false,
            position: 0,
            title: "Never Gonna Give You Up".into(),
            uri: Some(uri.into()),
            source_name: None,
            thumbnail: None,
        }
    }

    #[test]
    fn test_search_type_round_trip() {
        assert_eq!("ytmsearch".parse::<SearchType>().unwrap(), SearchType::YtmSearch);
        assert_eq!(SearchType::ScSearch.to_string(), "scsearch");
        assert!("bing".parse::<SearchType>().is_err());
    }

    #[test]
    fn test_youtube_thumbnail_derivation() {
        let track = Track::new(
            "QAAA",
            info("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            None,
            false,
            Some(SearchType::YtSearch),
        );
        assert_eq!(
            track.thumbnail(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
        assert_eq!(track.to_string(), "Rick Astley - Never Gonna Give You Up");
    }

    #[test]
    fn test_no_thumbnail_for_other_sources() {
        let soundcloud = info("123", "https://soundcloud.com/x/y");
        let track = Track::new("QAAA", soundcloud, None, false, None);
        assert!(track.thumbnail().is_none());

        let mut explicit = info("123", "https://soundcloud.com/x/y");
        explicit.thumbnail = Some("https://img/cover.jpg".into());
        let track = Track::new("QAAA", explicit, None, false, None);
        assert_eq!(track.thumbnail(), Some("https://img/cover.jpg"));
    }

    #[test]
    fn test_playlist_from_node() {
        let tracks = vec![
            Track::new("a", info("aaa", "https://youtu.be/aaa"), None, false, None),
            Track::new("b", info("bbb", "https://youtu.be/bbb"), None, false, None),
        ];
        let playlist = Playlist::from_node("Mix", -1, tracks.clone(), None);
        assert_eq!(playlist.track_count(), 2);
        assert!(playlist.selected_track().is_none());
        assert_eq!(
            playlist.thumbnail(),
            Some("https://img.youtube.com/vi/aaa/mqdefault.jpg")
        );

        let playlist = Playlist::from_node("Mix", 1, tracks, None);
        assert_eq!(playlist.selected_track().unwrap().track_id(), "b");
    }

    #[test]
    fn test_resolution_accessors() {
        let track = Track::new("a", info("aaa", "https://youtu.be/aaa"), None, false, None);
        let resolution = Resolution::Tracks(vec![track]);
        assert_eq!(resolution.len(), 1);
        assert!(!resolution.is_playlist());
        assert_eq!(resolution.first().unwrap().identifier(), "aaa");
    }
}
