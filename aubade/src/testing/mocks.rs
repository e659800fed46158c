//! In-memory collaborators that record how they were used.

use crate::errors::{AubadeError, PlaybackFailure, Result};
use crate::greeting::{
    AlbumDetails, AlbumLibrary, AlbumSummary, LanguageModel, LiteratureExcerpt, LiteratureSource,
    SpeechRenderer, WeatherReport, WeatherSource,
};
use crate::playback::PlaybackDevice;
use crate::schedule::SunriseSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// One call made on a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// `stop_all`
    StopAll,
    /// `set_volume`
    SetVolume(u8),
    /// `play_file`
    PlayFile(PathBuf),
    /// `play_cue`
    PlayCue(PathBuf),
    /// `queue_references`
    QueueReferences(Vec<String>),
}

/// A playback device that records calls and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Mutex<Vec<DeviceCall>>,
    fail_playback: Mutex<bool>,
    fail_auxiliary: Mutex<bool>,
}

impl RecordingDevice {
    /// Creates a device that succeeds at everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `play_file` fail.
    pub fn fail_playback(&self, fail: bool) {
        *self.fail_playback.lock() = fail;
    }

    /// Makes every call except `play_file` fail.
    pub fn fail_auxiliary(&self, fail: bool) {
        *self.fail_auxiliary.lock() = fail;
    }

    /// Returns the calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Counts successful `play_file` calls.
    #[must_use]
    pub fn greetings_played(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DeviceCall::PlayFile(_)))
            .count()
    }

    fn auxiliary(&self, call: DeviceCall, target: &str) -> Result<(), PlaybackFailure> {
        if *self.fail_auxiliary.lock() {
            return Err(PlaybackFailure::new(target, "device unavailable"));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlaybackDevice for RecordingDevice {
    async fn stop_all(&self) -> Result<(), PlaybackFailure> {
        self.auxiliary(DeviceCall::StopAll, "stop")
    }

    async fn set_volume(&self, volume: u8) -> Result<(), PlaybackFailure> {
        self.auxiliary(DeviceCall::SetVolume(volume), "volume")
    }

    async fn play_file(&self, path: &Path) -> Result<(), PlaybackFailure> {
        if *self.fail_playback.lock() {
            return Err(PlaybackFailure::new(path.display().to_string(), "player exited with 1"));
        }
        self.calls.lock().push(DeviceCall::PlayFile(path.to_path_buf()));
        Ok(())
    }

    async fn play_cue(&self, path: &Path) -> Result<(), PlaybackFailure> {
        self.auxiliary(DeviceCall::PlayCue(path.to_path_buf()), "cue")
    }

    async fn queue_references(&self, references: &[String]) -> Result<(), PlaybackFailure> {
        self.auxiliary(DeviceCall::QueueReferences(references.to_vec()), "queue")
    }
}

/// A weather source returning a fixed report, or failing.
#[derive(Debug)]
pub struct StaticWeather {
    report: Option<WeatherReport>,
    calls: Mutex<usize>,
}

impl StaticWeather {
    /// Returns `report` on every call.
    #[must_use]
    pub fn new(report: WeatherReport) -> Self {
        Self {
            report: Some(report),
            calls: Mutex::new(0),
        }
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            report: None,
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl WeatherSource for StaticWeather {
    async fn report(&self) -> Result<WeatherReport> {
        *self.calls.lock() += 1;
        self.report
            .clone()
            .ok_or_else(|| AubadeError::collaborator("weather", "service unavailable"))
    }
}

/// A literature source cycling through fixed excerpts.
#[derive(Debug)]
pub struct StaticLiterature {
    excerpts: Vec<LiteratureExcerpt>,
    calls: Mutex<usize>,
}

impl StaticLiterature {
    /// Cycles through `excerpts`; an empty list fails every call.
    #[must_use]
    pub fn new(excerpts: Vec<LiteratureExcerpt>) -> Self {
        Self {
            excerpts,
            calls: Mutex::new(0),
        }
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LiteratureSource for StaticLiterature {
    async fn random_excerpt(&self) -> Result<LiteratureExcerpt> {
        let mut calls = self.calls.lock();
        let index = *calls;
        *calls += 1;
        if self.excerpts.is_empty() {
            return Err(AubadeError::collaborator("gutendex", "catalog unavailable"));
        }
        Ok(self.excerpts[index % self.excerpts.len()].clone())
    }
}

/// A music library with fixed albums.
#[derive(Debug)]
pub struct StaticLibrary {
    albums: Vec<AlbumSummary>,
    details: Option<AlbumDetails>,
    cover_art: Vec<u8>,
    failing: bool,
    requested: Mutex<Vec<usize>>,
}

impl StaticLibrary {
    /// Lists `albums`; every album has `details` and a small cover image.
    #[must_use]
    pub fn new(albums: Vec<AlbumSummary>, details: AlbumDetails) -> Self {
        Self {
            albums,
            details: Some(details),
            cover_art: b"\x89PNG\r\n\x1a\n".to_vec(),
            failing: false,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Lists albums but fails every detail lookup.
    #[must_use]
    pub fn without_details(albums: Vec<AlbumSummary>) -> Self {
        Self {
            details: None,
            ..Self::new(albums, AlbumDetails { songs: Vec::new(), cover_art: None })
        }
    }

    /// Fails every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::without_details(Vec::new())
        }
    }

    /// Replaces the cover image bytes.
    #[must_use]
    pub fn with_cover_art(mut self, bytes: Vec<u8>) -> Self {
        self.cover_art = bytes;
        self
    }

    /// Returns the album counts requested so far.
    #[must_use]
    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(AubadeError::collaborator("navidrome", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl AlbumLibrary for StaticLibrary {
    async fn random_albums(&self, count: usize) -> Result<Vec<AlbumSummary>> {
        self.requested.lock().push(count);
        self.check()?;
        Ok(self.albums.iter().take(count).cloned().collect())
    }

    async fn album_details(&self, album_id: &str) -> Result<AlbumDetails> {
        self.check()?;
        self.details
            .clone()
            .ok_or_else(|| AubadeError::collaborator("navidrome", format!("album {album_id} not found")))
    }

    async fn cover_art(&self, _cover_art_id: &str) -> Result<Vec<u8>> {
        self.check()?;
        Ok(self.cover_art.clone())
    }

    fn song_reference(&self, song_id: &str) -> String {
        format!("https://music.local/rest/stream.view?id={song_id}")
    }
}

/// A language model answering from a script.
///
/// Each rule pairs a needle with a response; the first rule whose needle
/// occurs in the prompt wins. Unmatched prompts get the default response.
#[derive(Debug)]
pub struct ScriptedLanguageModel {
    rules: Vec<(String, String)>,
    default_response: String,
    vision_response: Option<String>,
    failing: bool,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedLanguageModel {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_response: String::new(),
            vision_response: Some("A pale sky over still water.".to_string()),
            failing: false,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedLanguageModel {
    /// Creates a model with no rules and an empty default response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Answers prompts containing `needle` with `response`.
    #[must_use]
    pub fn on(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    /// Sets the response for unmatched prompts.
    #[must_use]
    pub fn otherwise(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Sets the image description; `None` makes image calls fail.
    #[must_use]
    pub fn with_vision(mut self, response: Option<&str>) -> Self {
        self.vision_response = response.map(ToString::to_string);
        self
    }

    /// Returns every prompt seen, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Counts prompts containing `needle`.
    #[must_use]
    pub fn count_matching(&self, needle: &str) -> usize {
        self.prompts.lock().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.failing {
            return Err(AubadeError::collaborator("ollama", "model not loaded"));
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map_or_else(|| self.default_response.clone(), |(_, response)| response.clone()))
    }

    async fn describe_image(&self, prompt: &str, _image: &[u8]) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.failing {
            return Err(AubadeError::collaborator("ollama", "model not loaded"));
        }
        self.vision_response
            .clone()
            .ok_or_else(|| AubadeError::collaborator("ollama", "vision model unavailable"))
    }
}

/// Writes a fake WAV file containing the text.
#[derive(Debug, Default)]
pub struct FileWritingSpeech {
    failing: bool,
    rendered: Mutex<Vec<String>>,
}

impl FileWritingSpeech {
    /// Creates a renderer that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Returns the texts rendered so far.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }
}

#[async_trait]
impl SpeechRenderer for FileWritingSpeech {
    async fn render(&self, text: &str, output: &Path) -> Result<()> {
        if self.failing {
            return Err(AubadeError::collaborator("piper", "exit status 1"));
        }
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(text.as_bytes());
        std::fs::write(output, bytes)?;
        self.rendered.lock().push(text.to_string());
        Ok(())
    }
}

/// Sunrise at the same UTC time every day.
#[derive(Debug, Clone, Copy)]
pub struct FixedSunrise {
    time: NaiveTime,
}

impl FixedSunrise {
    /// Sunrise at `hour:minute` UTC.
    #[must_use]
    pub fn at(hour: u32, minute: u32) -> Self {
        Self {
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SunriseSource for FixedSunrise {
    fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        Ok(date.and_time(self.time).and_utc())
    }
}
