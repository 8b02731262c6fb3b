//! Résolution de requêtes en pistes
//!
//! Une requête est classée puis envoyée au bon résolveur :
//!
//! 1. texte libre (ni URL, ni chemin local) : préfixé par la source de recherche
//! 2. URL `open.spotify.com` : métadonnées lues dans le catalogue Spotify
//! 3. pièce jointe Discord : chargée par le nœud, titre tiré du nom de fichier
//! 4. le reste : `GET /loadtracks`, interprété selon `loadType`

use crate::error::{LinkError, Result, TrackLoadKind};
use crate::objects::{Playlist, RequestContext, Resolution, SearchType, Track, TrackInfo};
use crate::protocol::{LoadTracksResponse, RawTrack};
use lazy_static::lazy_static;
use pmospotify::{SearchResult, SpotifyClient};
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout par défaut des requêtes REST vers le nœud
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"https?://(?:www\.)?.+").expect("static regex");
    static ref SPOTIFY_URL_REGEX: Regex = Regex::new(
        r"^https?://open\.spotify\.com/(?P<type>album|artist|playlist|track)/(?P<id>[a-zA-Z0-9]+)"
    )
    .expect("static regex");
    static ref DISCORD_ATTACHMENT_REGEX: Regex = Regex::new(
        r"^https?://cdn\.discordapp\.com/attachments/(?P<channel_id>[0-9]+)/(?P<message_id>[0-9]+)/(?P<file>[a-zA-Z0-9_.]+)"
    )
    .expect("static regex");
}

/// Options d'une résolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub ctx: Option<RequestContext>,
    pub search_type: SearchType,
    /// La requête est un chemin local : jamais de préfixe de recherche
    pub local: bool,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctx(mut self, ctx: RequestContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }
}

/// Nature d'une requête, après ajout éventuel du préfixe de recherche
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Spotify(String),
    DiscordAttachment { url: String, file: String },
    Load(String),
}

/// Classe une requête ; la première règle qui s'applique l'emporte
pub fn classify(query: &str, options: &ResolveOptions) -> QueryKind {
    let query = if !URL_REGEX.is_match(query) && !options.local {
        format!("{}:{}", options.search_type, query)
    } else {
        query.to_string()
    };

    if SPOTIFY_URL_REGEX.is_match(&query) {
        return QueryKind::Spotify(query);
    }

    if let Some(caps) = DISCORD_ATTACHMENT_REGEX.captures(&query) {
        let file = caps["file"].to_string();
        return QueryKind::DiscordAttachment { url: query, file };
    }

    QueryKind::Load(query)
}

/// Client REST d'un nœud, avec accès optionnel au catalogue Spotify
#[derive(Clone)]
pub struct TrackResolver {
    client: Client,
    rest_uri: String,
    password: String,
    spotify: Option<Arc<SpotifyClient>>,
}

impl TrackResolver {
    pub fn new(rest_uri: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            rest_uri: rest_uri.into().trim_end_matches('/').to_string(),
            password: password.into(),
            spotify: None,
        })
    }

    /// Active la résolution des URLs Spotify
    pub fn with_spotify(mut self, spotify: Arc<SpotifyClient>) -> Self {
        self.spotify = Some(spotify);
        self
    }

    pub fn has_spotify(&self) -> bool {
        self.spotify.is_some()
    }

    pub fn rest_uri(&self) -> &str {
        &self.rest_uri
    }

    /// Résout une requête en pistes ou en playlist
    ///
    /// # Errors
    ///
    /// * `LinkError::TrackLoad` - le nœud n'a rien trouvé ou a échoué
    /// * `LinkError::InvalidSpotifyCredentials` - URL Spotify sans credentials
    pub async fn resolve(&self, query: &str, options: &ResolveOptions) -> Result<Resolution> {
        match classify(query, options) {
            QueryKind::Spotify(url) => self.resolve_spotify(&url, options).await,
            QueryKind::DiscordAttachment { url, file } => {
                self.resolve_attachment(&url, &file, options).await
            }
            QueryKind::Load(identifier) => self.resolve_load(&identifier, options).await,
        }
    }

    /// Reconstruit une piste à partir de son identifiant encodé
    pub async fn decode(&self, identifier: &str, ctx: Option<RequestContext>) -> Result<Track> {
        debug!("Decoding track {}", identifier);
        let response = self
            .client
            .get(format!("{}/decodetrack", self.rest_uri))
            .header("Authorization", &self.password)
            .query(&[("track", identifier)])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!("Decode of {} failed with status {}", identifier, response.status());
            return Err(LinkError::track_load(
                TrackLoadKind::DecodeFailed,
                "Failed to build track. Check if the identifier is correct and try again.",
            ));
        }

        let info: TrackInfo = response.json().await?;
        Ok(Track::new(identifier, info, ctx, false, None))
    }

    async fn load_tracks(&self, identifier: &str) -> Result<LoadTracksResponse> {
        debug!("Loading tracks for {}", identifier);
        let response = self
            .client
            .get(format!("{}/loadtracks", self.rest_uri))
            .header("Authorization", &self.password)
            .query(&[("identifier", identifier)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn resolve_spotify(&self, url: &str, options: &ResolveOptions) -> Result<Resolution> {
        let spotify = self
            .spotify
            .as_ref()
            .ok_or(LinkError::InvalidSpotifyCredentials)?;

        let result = spotify.search(url).await?;
        let to_track = |track: &pmospotify::Track| {
            let info = TrackInfo {
                identifier: track.id.clone(),
                is_seekable: true,
                author: track.artists.clone(),
                length: track.length,
                is_stream: false,
                position: 0,
                title: track.name.clone(),
                uri: track.uri.clone(),
                source_name: None,
                thumbnail: track.image.clone(),
            };
            Track::new(
                track.id.clone(),
                info,
                options.ctx.clone(),
                true,
                Some(options.search_type),
            )
        };

        Ok(match &result {
            SearchResult::Track(track) => Resolution::Tracks(vec![to_track(track)]),
            collection => {
                let tracks = collection.tracks().iter().map(to_track).collect();
                Resolution::Playlist(Playlist::from_spotify(
                    collection.name(),
                    tracks,
                    collection.image().map(str::to_string),
                    collection.uri().map(str::to_string),
                    options.ctx.clone(),
                ))
            }
        })
    }

    async fn resolve_attachment(
        &self,
        url: &str,
        file: &str,
        options: &ResolveOptions,
    ) -> Result<Resolution> {
        let data = self.load_tracks(url).await?;
        let Some(raw) = data.tracks.into_iter().next() else {
            return Err(LinkError::track_load(
                TrackLoadKind::AttachmentEmpty,
                format!("The attachment '{}' did not contain any track.", file),
            ));
        };

        let info = TrackInfo {
            identifier: raw.info.identifier,
            is_seekable: true,
            author: "Unknown".to_string(),
            length: raw.info.length,
            is_stream: false,
            position: 0,
            title: file.to_string(),
            uri: raw.info.uri,
            source_name: Some("http".to_string()),
            thumbnail: None,
        };

        Ok(Resolution::Tracks(vec![Track::new(
            raw.track,
            info,
            options.ctx.clone(),
            false,
            None,
        )]))
    }

    async fn resolve_load(&self, identifier: &str, options: &ResolveOptions) -> Result<Resolution> {
        let data = self.load_tracks(identifier).await?;
        let to_track = |raw: RawTrack| {
            Track::new(
                raw.track,
                raw.info,
                options.ctx.clone(),
                false,
                Some(options.search_type),
            )
        };

        match data.load_type.as_deref() {
            None | Some("") => Err(LinkError::track_load(
                TrackLoadKind::NoLoadType,
                "There was an error while trying to load this track.",
            )),
            Some("NO_MATCHES") => Err(LinkError::track_load(
                TrackLoadKind::NoMatches,
                "No matches found.",
            )),
            Some("LOAD_FAILED") => {
                let exception = data.exception;
                let message = exception
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| "The node failed to load this track.".to_string());
                let severity = exception
                    .and_then(|e| e.severity)
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                Err(LinkError::track_load(
                    TrackLoadKind::LoadFailed { severity },
                    message,
                ))
            }
            Some("PLAYLIST_LOADED") => {
                let (name, selected) = data
                    .playlist_info
                    .map(|info| (info.name, info.selected_track))
                    .unwrap_or_else(|| (String::new(), -1));
                let tracks = data.tracks.into_iter().map(to_track).collect();
                Ok(Resolution::Playlist(Playlist::from_node(
                    name,
                    selected,
                    tracks,
                    options.ctx.clone(),
                )))
            }
            Some("SEARCH_RESULT") | Some("TRACK_LOADED") => Ok(Resolution::Tracks(
                data.tracks.into_iter().map(to_track).collect(),
            )),
            Some(other) => {
                warn!("Unsupported loadType {}", other);
                Err(LinkError::track_load(
                    TrackLoadKind::NoLoadType,
                    format!("Unsupported load type '{}'.", other),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_gets_search_prefix() {
        let options = ResolveOptions::new();
        assert_eq!(
            classify("never gonna give you up", &options),
            QueryKind::Load("ytsearch:never gonna give you up".into())
        );

        let options = ResolveOptions::new().with_search_type(SearchType::ScSearch);
        assert_eq!(
            classify("lofi", &options),
            QueryKind::Load("scsearch:lofi".into())
        );
    }

    #[test]
    fn test_local_query_is_kept() {
        let options = ResolveOptions::new().local(true);
        assert_eq!(
            classify("/music/song.flac", &options),
            QueryKind::Load("/music/song.flac".into())
        );
    }

    #[test]
    fn test_urls_are_not_prefixed() {
        let options = ResolveOptions::new();
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ", &options),
            QueryKind::Load("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into())
        );
    }

    #[test]
    fn test_spotify_url() {
        let options = ResolveOptions::new();
        assert_eq!(
            classify("https://open.spotify.com/playlist/37i9dQZF1DX", &options),
            QueryKind::Spotify("https://open.spotify.com/playlist/37i9dQZF1DX".into())
        );
    }

    #[test]
    fn test_discord_attachment() {
        let options = ResolveOptions::new();
        let url = "https://cdn.discordapp.com/attachments/123/456/song.mp3";
        assert_eq!(
            classify(url, &options),
            QueryKind::DiscordAttachment {
                url: url.into(),
                file: "song.mp3".into()
            }
        );
    }

    #[test]
    fn test_trailing_slash_removed_from_rest_uri() {
        let resolver = TrackResolver::new("http://localhost:2333/", "pw").unwrap();
        assert_eq!(resolver.rest_uri(), "http://localhost:2333");
        assert!(!resolver.has_spotify());
    }
}
