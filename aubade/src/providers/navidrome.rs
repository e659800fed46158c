//! Subsonic API client for a Navidrome music server.

use super::{check_status, http_client};
use crate::config::NavidromeConfig;
use crate::errors::{AubadeError, Result};
use crate::greeting::{AlbumDetails, AlbumLibrary, AlbumSummary, Song};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const API_VERSION: &str = "1.16.1";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "subsonic-response")]
    response: SubsonicResponse<T>,
}

#[derive(Debug, Deserialize)]
struct SubsonicResponse<T> {
    status: String,
    #[serde(default)]
    error: Option<SubsonicError>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SubsonicError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumListBody {
    album_list2: AlbumList,
}

#[derive(Debug, Deserialize)]
struct AlbumList {
    #[serde(default)]
    album: Vec<ListedAlbum>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListedAlbum {
    id: String,
    name: String,
    #[serde(default)]
    artist: String,
    year: Option<i32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct AlbumBody {
    album: AlbumWithSongs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumWithSongs {
    #[serde(default)]
    song: Vec<Song>,
    cover_art: Option<String>,
}

/// Lists random albums, their tracks and cover art.
#[derive(Debug, Clone)]
pub struct NavidromeLibrary {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    client_name: String,
}

impl NavidromeLibrary {
    /// Creates a client from configuration.
    pub fn new(config: &NavidromeConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(
                concat!("aubade/", env!("CARGO_PKG_VERSION")),
                Duration::from_secs(config.timeout_secs),
            )?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client_name: config.client_name.clone(),
        })
    }

    fn auth(&self) -> [(&'static str, &str); 4] {
        [
            ("u", self.username.as_str()),
            ("p", self.password.as_str()),
            ("v", API_VERSION),
            ("c", self.client_name.as_str()),
        ]
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/rest/{method}.view", self.base_url)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http
            .get(self.endpoint(method))
            .query(&self.auth())
            .query(&[("f", "json")])
            .query(params)
            .send()
            .await?;
        let envelope: Envelope<T> = check_status("navidrome", response).await?.json().await?;

        let response = envelope.response;
        if response.status != "ok" {
            let message = response.error.map(|e| e.message).unwrap_or_default();
            return Err(AubadeError::collaborator(
                "navidrome",
                format!("{method} failed: {message}"),
            ));
        }
        response
            .body
            .ok_or_else(|| AubadeError::collaborator("navidrome", format!("{method} returned no body")))
    }
}

#[async_trait]
impl AlbumLibrary for NavidromeLibrary {
    async fn random_albums(&self, count: usize) -> Result<Vec<AlbumSummary>> {
        info!(count, "Fetching random albums");
        let size = count.to_string();
        let body: AlbumListBody = self
            .call("getAlbumList2", &[("type", "random"), ("size", size.as_str())])
            .await?;

        let albums: Vec<AlbumSummary> = body
            .album_list2
            .album
            .into_iter()
            .map(|a| AlbumSummary {
                id: a.id,
                name: a.name,
                artist: a.artist,
                year: a.year,
                genres: a.genres.into_iter().map(|g| g.name).collect(),
            })
            .collect();
        info!(albums = albums.len(), "Albums fetched");
        Ok(albums)
    }

    async fn album_details(&self, album_id: &str) -> Result<AlbumDetails> {
        let body: AlbumBody = self.call("getAlbum", &[("id", album_id)]).await?;
        debug!(album_id, tracks = body.album.song.len(), "Album details fetched");
        Ok(AlbumDetails {
            songs: body.album.song,
            cover_art: body.album.cover_art,
        })
    }

    async fn cover_art(&self, cover_art_id: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.endpoint("getCoverArt"))
            .query(&self.auth())
            .query(&[("id", cover_art_id)])
            .send()
            .await?;
        let bytes = check_status("navidrome", response).await?.bytes().await?;
        debug!(cover_art_id, bytes = bytes.len(), "Cover art fetched");
        Ok(bytes.to_vec())
    }

    fn song_reference(&self, song_id: &str) -> String {
        let mut params = self.auth().to_vec();
        params.push(("id", song_id));
        reqwest::Url::parse_with_params(&self.endpoint("stream"), &params)
            .map_or_else(|_| format!("{}?id={song_id}", self.endpoint("stream")), String::from)
    }
}
