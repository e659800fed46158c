//! Collaborator traits and the data they return.
//!
//! The greeting stages only see these traits. Concrete HTTP and command
//! clients live in [`crate::providers`]; test doubles in [`crate::testing`].

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One period of the daily forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    /// Period name, e.g. "Tonight" or "Tuesday".
    pub name: String,
    /// Chance of precipitation in percent.
    pub precipitation: Option<f64>,
    /// Free-text forecast.
    pub description: String,
}

/// Conditions for the first daylight hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyConditions {
    /// Temperature in °F.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Dewpoint in °C.
    pub dewpoint: Option<f64>,
    /// Wind speed, e.g. "5 mph".
    pub wind_speed: String,
    /// Wind direction, e.g. "NW".
    pub wind_direction: String,
    /// Chance of precipitation in percent.
    pub precipitation: Option<f64>,
    /// Short forecast, e.g. "Mostly Clear".
    pub conditions: String,
}

/// Weather around the next sunrise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// The coming night.
    pub overnight: ForecastPeriod,
    /// The first daylight hour.
    pub sunrise: HourlyConditions,
    /// The coming day.
    pub today: ForecastPeriod,
}

/// A book author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Year of birth.
    pub birth_year: Option<i32>,
    /// Year of death.
    pub death_year: Option<i32>,
}

/// A passage from a public-domain book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteratureExcerpt {
    /// Book title.
    pub title: String,
    /// First listed author.
    pub author: Author,
    /// The passage.
    pub excerpt: String,
}

/// An album as listed by the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Library id.
    pub id: String,
    /// Album title.
    pub name: String,
    /// Album artist.
    pub artist: String,
    /// Release year.
    pub year: Option<i32>,
    /// Genre names.
    #[serde(default)]
    pub genres: Vec<String>,
}

/// One track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Library id.
    pub id: String,
    /// Track title.
    pub title: String,
}

/// Tracks and cover art of an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDetails {
    /// Tracks in album order.
    pub songs: Vec<Song>,
    /// Cover art id, if the album has art.
    pub cover_art: Option<String>,
}

/// The chosen album, enriched as far as the library allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedAlbum {
    /// Listing data.
    #[serde(flatten)]
    pub summary: AlbumSummary,
    /// Tracks, when details could be fetched.
    #[serde(default)]
    pub songs: Vec<Song>,
    /// Description of the cover art, when it could be analyzed.
    #[serde(default)]
    pub art_description: Option<String>,
}

impl From<AlbumSummary> for SelectedAlbum {
    fn from(summary: AlbumSummary) -> Self {
        Self {
            summary,
            songs: Vec::new(),
            art_description: None,
        }
    }
}

/// Weather forecasts.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetches the report for the next sunrise.
    async fn report(&self) -> Result<WeatherReport>;
}

/// Random literature.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Fetches one random excerpt.
    async fn random_excerpt(&self) -> Result<LiteratureExcerpt>;
}

/// A music library.
#[async_trait]
pub trait AlbumLibrary: Send + Sync {
    /// Lists up to `count` random albums.
    async fn random_albums(&self, count: usize) -> Result<Vec<AlbumSummary>>;

    /// Fetches tracks and cover art id.
    async fn album_details(&self, album_id: &str) -> Result<AlbumDetails>;

    /// Fetches cover art image bytes.
    async fn cover_art(&self, cover_art_id: &str) -> Result<Vec<u8>>;

    /// A playable reference (stream URL) for a song.
    fn song_reference(&self, song_id: &str) -> String;
}

/// A text and vision language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Completes a text prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Answers a prompt about an image.
    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// Renders `text` to a WAV file at `output`.
    async fn render(&self, text: &str, output: &Path) -> Result<()>;
}
