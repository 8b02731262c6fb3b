//! Module d'accès au catalogue Spotify (albums, artistes, playlists, pistes)

use super::SpotifyApi;
use crate::error::Result;
use crate::models::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Taille de page maximale acceptée par l'API
const PAGE_LIMIT: &str = "100";

/// Réponse paginée de l'API
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SimpleArtistResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SimpleAlbumResponse {
    #[serde(default)]
    images: Vec<ImageResponse>,
}

/// Réponse de l'endpoint /tracks/{id}
#[derive(Debug, Deserialize)]
struct TrackResponse {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SimpleArtistResponse>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    external_urls: ExternalUrls,
    #[serde(default)]
    album: Option<SimpleAlbumResponse>,
}

/// Réponse de l'endpoint /albums/{id}
#[derive(Debug, Deserialize)]
struct AlbumResponse {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SimpleArtistResponse>,
    #[serde(default)]
    images: Vec<ImageResponse>,
    #[serde(default)]
    external_urls: ExternalUrls,
    tracks: Page<TrackResponse>,
}

/// Réponse de l'endpoint /artists/{id}
#[derive(Debug, Deserialize)]
struct ArtistResponse {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<ImageResponse>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<TrackResponse>,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResponse {
    #[serde(default)]
    track: Option<TrackResponse>,
}

/// Réponse de l'endpoint /playlists/{id}
#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    id: String,
    name: String,
    #[serde(default)]
    owner: Option<OwnerResponse>,
    #[serde(default)]
    images: Vec<ImageResponse>,
    #[serde(default)]
    external_urls: ExternalUrls,
    tracks: Page<PlaylistItemResponse>,
}

fn join_artists(artists: &[SimpleArtistResponse]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_image(images: &[ImageResponse]) -> Option<String> {
    images.first().map(|i| i.url.clone())
}

impl TrackResponse {
    /// `fallback_image` est utilisé quand la piste n'embarque pas son album
    fn into_track(self, fallback_image: Option<&str>) -> Track {
        let image = self
            .album
            .as_ref()
            .and_then(|album| first_image(&album.images))
            .or_else(|| fallback_image.map(str::to_string));

        Track {
            id: self.id.unwrap_or_default(),
            artists: join_artists(&self.artists),
            name: self.name,
            length: self.duration_ms,
            uri: self.external_urls.spotify,
            image,
        }
    }
}

impl SpotifyApi {
    /// Suit les liens `next` jusqu'à la dernière page
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        first: Page<T>,
    ) -> Result<(Vec<T>, Option<usize>)> {
        let total = first.total;
        let mut items = first.items;
        let mut next = first.next;

        while let Some(url) = next {
            debug!("Fetching next page {}", url);
            let page: Page<T> = self.get_url(&url, &[]).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok((items, total))
    }

    /// Récupère une piste par son ID
    pub async fn get_track(&self, track_id: &str) -> Result<Track> {
        debug!("Getting track {}", track_id);
        let response: TrackResponse = self.get(&format!("/tracks/{}", track_id), &[]).await?;
        Ok(response.into_track(None))
    }

    /// Récupère un album et toutes ses pistes
    pub async fn get_album(&self, album_id: &str) -> Result<Album> {
        debug!("Getting album {}", album_id);
        let response: AlbumResponse = self.get(&format!("/albums/{}", album_id), &[]).await?;

        let image = first_image(&response.images);
        let (items, _) = self.collect_pages(response.tracks).await?;
        let tracks: Vec<Track> = items
            .into_iter()
            .map(|t| t.into_track(image.as_deref()))
            .collect();

        Ok(Album {
            id: response.id,
            name: response.name,
            artists: join_artists(&response.artists),
            total_tracks: tracks.len(),
            tracks,
            image,
            uri: response.external_urls.spotify,
        })
    }

    /// Récupère les meilleures pistes d'un artiste
    pub async fn get_artist(&self, artist_id: &str) -> Result<Artist> {
        debug!("Getting artist {}", artist_id);
        let artist: ArtistResponse = self.get(&format!("/artists/{}", artist_id), &[]).await?;
        let top: TopTracksResponse = self
            .get(
                &format!("/artists/{}/top-tracks", artist_id),
                &[("market", self.market())],
            )
            .await?;

        // La plus petite image, comme pour les vignettes de recherche
        let image = artist.images.last().map(|i| i.url.clone());
        let tracks: Vec<Track> = top
            .tracks
            .into_iter()
            .map(|t| t.into_track(image.as_deref()))
            .collect();

        Ok(Artist {
            id: artist.id,
            name: format!("Top Tracks by {}", artist.name),
            artists: artist.name,
            total_tracks: tracks.len(),
            tracks,
            image,
            uri: artist.external_urls.spotify,
        })
    }

    /// Récupère une playlist et toutes ses pistes
    ///
    /// Les entrées sans piste (épisodes supprimés, fichiers indisponibles)
    /// sont ignorées.
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        debug!("Getting playlist {}", playlist_id);
        let response: PlaylistResponse = self
            .get(&format!("/playlists/{}", playlist_id), &[("limit", PAGE_LIMIT)])
            .await?;

        let image = first_image(&response.images);
        let (items, total) = self.collect_pages(response.tracks).await?;
        let tracks: Vec<Track> = items
            .into_iter()
            .filter_map(|item| item.track)
            .map(|t| t.into_track(None))
            .collect();

        Ok(Playlist {
            id: response.id,
            name: response.name,
            owner: response.owner.and_then(|o| o.display_name),
            total_tracks: total.unwrap_or(tracks.len()),
            tracks,
            image,
            uri: response.external_urls.spotify,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_response_conversion() {
        let response: TrackResponse = serde_json::from_value(json!({
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "artists": [{"name": "Rick Astley"}, {"name": "Someone"}],
            "duration_ms": 213573,
            "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"},
            "album": {"images": [{"url": "https://i.scdn.co/image/big"}, {"url": "https://i.scdn.co/image/small"}]}
        }))
        .unwrap();

        let track = response.into_track(Some("https://fallback"));
        assert_eq!(track.artists, "Rick Astley, Someone");
        assert_eq!(track.length, 213573);
        assert_eq!(track.image.as_deref(), Some("https://i.scdn.co/image/big"));
    }

    #[test]
    fn test_track_without_album_uses_fallback_image() {
        let response: TrackResponse = serde_json::from_value(json!({
            "id": null,
            "name": "Local file",
            "artists": []
        }))
        .unwrap();

        let track = response.into_track(Some("https://fallback"));
        assert_eq!(track.id, "");
        assert_eq!(track.image.as_deref(), Some("https://fallback"));
        assert!(track.uri.is_none());
    }
}
