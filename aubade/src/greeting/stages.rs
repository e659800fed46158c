//! The six stages of the daily greeting.

use super::composition::{
    album_selection_prompt, extract_greeting, literature_judge_prompt, synthesis_prompt,
    GreetingLength, SourceMaterial, ALBUM_ART_PROMPT,
};
use super::sources::{
    AlbumLibrary, LanguageModel, LiteratureExcerpt, LiteratureSource, SelectedAlbum,
    SpeechRenderer, WeatherReport, WeatherSource,
};
use super::{ALBUM, ALBUM_ART, LITERATURE, RENDER, SYNTHESIS, WEATHER};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::AubadeError;
use crate::pipeline::{is_positive_verdict, select_with_fallback, validate_with_retry};
use crate::stages::GenerationStage;
use crate::utils::write_atomic;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn failure(error: &AubadeError) -> StageOutput {
    if error.is_transient() {
        StageOutput::fail_retryable(error.to_string())
    } else {
        StageOutput::fail(error.to_string())
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, StageOutput> {
    serde_json::to_value(value).map_err(|e| StageOutput::fail(format!("cannot encode output: {e}")))
}

fn seeded(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64))
}

/// Fetches the sunrise weather report.
pub struct WeatherStage {
    source: Arc<dyn WeatherSource>,
}

impl WeatherStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }
}

impl fmt::Debug for WeatherStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for WeatherStage {
    fn name(&self) -> &str {
        WEATHER
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        match self.source.report().await {
            Ok(report) => match to_value(&report) {
                Ok(value) => {
                    ctx.record_data("weather", value.clone());
                    StageOutput::ok_value("weather", value)
                }
                Err(output) => output,
            },
            Err(e) => failure(&e),
        }
    }
}

/// Fetches excerpts until the language model accepts one.
pub struct LiteratureStage {
    source: Arc<dyn LiteratureSource>,
    model: Arc<dyn LanguageModel>,
    max_attempts: usize,
}

impl LiteratureStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        source: Arc<dyn LiteratureSource>,
        model: Arc<dyn LanguageModel>,
        max_attempts: usize,
    ) -> Self {
        Self {
            source,
            model,
            max_attempts,
        }
    }
}

impl fmt::Debug for LiteratureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiteratureStage")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for LiteratureStage {
    fn name(&self) -> &str {
        LITERATURE
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let source = &self.source;
        let model = &self.model;

        let validated = validate_with_retry(
            self.max_attempts,
            move |_attempt| async move { source.random_excerpt().await },
            move |candidate: &LiteratureExcerpt| {
                let prompt = literature_judge_prompt(candidate);
                async move {
                    let judgment = model.generate(&prompt).await?;
                    ctx.record_exchange("literature_judge", &prompt, &judgment);
                    Ok(is_positive_verdict(&judgment))
                }
            },
        )
        .await;

        match validated {
            Ok(Some(validated)) => {
                info!(title = %validated.candidate.title, attempt = validated.attempt, "Literature accepted");
                match to_value(&validated.candidate) {
                    Ok(value) => StageOutput::ok_value("literature", value)
                        .with_value("attempts", json!(validated.attempt)),
                    Err(output) => output,
                }
            }
            Ok(None) => StageOutput::absent(format!(
                "no suitable excerpt after {} attempts",
                self.max_attempts
            )),
            Err(e) => StageOutput::fail(e.to_string()),
        }
    }
}

/// Lists random albums and asks the language model to pick one.
pub struct AlbumSelectionStage {
    library: Arc<dyn AlbumLibrary>,
    model: Arc<dyn LanguageModel>,
    choices: usize,
    rng: Mutex<StdRng>,
}

impl AlbumSelectionStage {
    /// Creates the stage; `seed` makes the fallback choice reproducible.
    #[must_use]
    pub fn new(
        library: Arc<dyn AlbumLibrary>,
        model: Arc<dyn LanguageModel>,
        choices: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            library,
            model,
            choices,
            rng: seeded(seed),
        }
    }
}

impl fmt::Debug for AlbumSelectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumSelectionStage")
            .field("choices", &self.choices)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for AlbumSelectionStage {
    fn name(&self) -> &str {
        ALBUM
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let albums = match self.library.random_albums(self.choices).await {
            Ok(albums) if albums.is_empty() => return StageOutput::absent("library returned no albums"),
            Ok(albums) => albums,
            Err(e) => return failure(&e),
        };

        let literature = match ctx.inputs().get_as::<LiteratureExcerpt>(LITERATURE, "literature") {
            Ok(literature) => literature,
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let prompt = album_selection_prompt(&albums, literature.as_ref());
        let judgment = match self.model.generate(&prompt).await {
            Ok(judgment) => judgment,
            Err(e) => return failure(&e),
        };
        ctx.record_exchange("album_selection", &prompt, &judgment);

        let selection = {
            let mut rng = self.rng.lock();
            select_with_fallback(&judgment, albums.len(), &mut *rng)
        };
        let Some(selection) = selection else {
            return StageOutput::absent("nothing to choose from");
        };

        let judged = selection.is_judged();
        let Some(album) = albums.into_iter().nth(selection.index) else {
            return StageOutput::fail(format!("choice {} out of range", selection.index + 1));
        };
        info!(name = %album.name, artist = %album.artist, judged, "Album selected");

        match to_value(&SelectedAlbum::from(album)) {
            Ok(value) => StageOutput::ok_value("album", value)
                .with_value("choice", json!(selection.index + 1))
                .with_value("judged", json!(judged)),
            Err(output) => output,
        }
    }
}

/// Adds tracks, stream references and a cover art description to the album.
pub struct AlbumArtStage {
    library: Arc<dyn AlbumLibrary>,
    model: Arc<dyn LanguageModel>,
}

impl AlbumArtStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(library: Arc<dyn AlbumLibrary>, model: Arc<dyn LanguageModel>) -> Self {
        Self { library, model }
    }

    async fn describe(&self, ctx: &StageContext, cover_art_id: &str) -> Option<String> {
        let image = match self.library.cover_art(cover_art_id).await {
            Ok(image) if image.is_empty() => {
                warn!("Cover art is empty, skipping analysis");
                return None;
            }
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Cover art unavailable, skipping analysis");
                return None;
            }
        };

        match self.model.describe_image(ALBUM_ART_PROMPT, &image).await {
            Ok(description) => {
                ctx.record_exchange("album_art", ALBUM_ART_PROMPT, &description);
                let description = description.trim().to_string();
                (!description.is_empty()).then_some(description)
            }
            Err(e) => {
                warn!(error = %e, "Cover art analysis failed");
                None
            }
        }
    }
}

impl fmt::Debug for AlbumArtStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumArtStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for AlbumArtStage {
    fn name(&self) -> &str {
        ALBUM_ART
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let mut album = match ctx.inputs().get_as::<SelectedAlbum>(ALBUM, "album") {
            Ok(Some(album)) => album,
            Ok(None) => return StageOutput::absent("no album selected"),
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let mut references = Vec::new();
        match self.library.album_details(&album.summary.id).await {
            Ok(details) => {
                references = details
                    .songs
                    .iter()
                    .map(|song| self.library.song_reference(&song.id))
                    .collect();
                album.songs = details.songs;
                match details.cover_art {
                    Some(cover_art_id) => {
                        album.art_description = self.describe(ctx, &cover_art_id).await;
                    }
                    None => warn!(album = %album.summary.name, "No cover art available, skipping analysis"),
                }
            }
            Err(e) => warn!(error = %e, "Album details unavailable, skipping art analysis"),
        }

        debug!(songs = album.songs.len(), described = album.art_description.is_some(), "Album enriched");
        match to_value(&album) {
            Ok(value) => StageOutput::ok_value("album", value).with_value("references", json!(references)),
            Err(output) => output,
        }
    }
}

/// Composes the greeting text from whatever sources are present.
pub struct SynthesisStage {
    model: Arc<dyn LanguageModel>,
    length: GreetingLength,
    rng: Mutex<StdRng>,
}

impl SynthesisStage {
    /// Creates the stage; `seed` makes the target length reproducible.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, length: GreetingLength, seed: Option<u64>) -> Self {
        Self {
            model,
            length,
            rng: seeded(seed),
        }
    }
}

impl fmt::Debug for SynthesisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisStage")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for SynthesisStage {
    fn name(&self) -> &str {
        SYNTHESIS
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let inputs = ctx.inputs();
        let read = || -> Result<_, crate::errors::UndeclaredDependencyError> {
            let weather = inputs.get_as::<WeatherReport>(WEATHER, "weather")?;
            let literature = inputs.get_as::<LiteratureExcerpt>(LITERATURE, "literature")?;
            let album = match inputs.get_as::<SelectedAlbum>(ALBUM_ART, "album")? {
                Some(album) => Some(album),
                None => inputs.get_as::<SelectedAlbum>(ALBUM, "album")?,
            };
            Ok((weather, literature, album))
        };
        let (weather, literature, album) = match read() {
            Ok(sources) => sources,
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let material = SourceMaterial {
            weather: weather.as_ref(),
            literature: literature.as_ref(),
            album: album.as_ref(),
        };
        let (target, bounds) = {
            let mut rng = self.rng.lock();
            let target = self.length.sample(&mut *rng);
            (target, GreetingLength::bounds(target, &mut *rng))
        };
        debug!(target, lower = bounds.0, upper = bounds.1, "Greeting length chosen");

        let prompt = synthesis_prompt(&material, bounds);
        let response = match self.model.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => return failure(&e),
        };
        ctx.record_exchange("synthesis", &prompt, &response);

        let greeting = extract_greeting(&response);
        if greeting.is_empty() {
            return StageOutput::fail_retryable("language model returned an empty greeting");
        }

        let words = greeting.split_whitespace().count();
        info!(words, target, "Greeting composed");
        StageOutput::ok_value("greeting", json!(greeting))
            .with_value("target_words", json!(target))
            .with_value("words", json!(words))
    }
}

/// Renders the greeting to a WAV file in the run directory.
pub struct RenderStage {
    speech: Arc<dyn SpeechRenderer>,
    output_dir: PathBuf,
}

impl RenderStage {
    /// Creates the stage writing into `output_dir`.
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechRenderer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            speech,
            output_dir: output_dir.into(),
        }
    }
}

impl fmt::Debug for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderStage")
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationStage for RenderStage {
    fn name(&self) -> &str {
        RENDER
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let greeting = match ctx.inputs().get_str(SYNTHESIS, "greeting") {
            Ok(Some(greeting)) => greeting.to_string(),
            Ok(None) => return StageOutput::fail("no greeting to render"),
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let text_path = self.output_dir.join("greeting.txt");
        if let Err(e) = write_atomic(&text_path, greeting.as_bytes()) {
            return StageOutput::fail(format!("cannot write {}: {e}", text_path.display()));
        }

        let audio_path = self.output_dir.join("greeting.wav");
        if let Err(e) = self.speech.render(&greeting, &audio_path).await {
            return failure(&e);
        }

        match std::fs::metadata(&audio_path) {
            Ok(meta) if meta.len() > 0 => {
                info!(path = %audio_path.display(), bytes = meta.len(), "Greeting rendered");
                StageOutput::ok_value("audio_path", json!(audio_path.to_string_lossy()))
                    .with_value("text_path", json!(text_path.to_string_lossy()))
            }
            Ok(_) => StageOutput::fail("speech renderer produced an empty file"),
            Err(e) => StageOutput::fail(format!("no audio at {}: {e}", audio_path.display())),
        }
    }
}
