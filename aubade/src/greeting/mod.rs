//! The daily greeting pipeline.
//!
//! Six stages run in this order:
//!
//! | stage       | role      | criticality   | reads                                   |
//! |-------------|-----------|---------------|-----------------------------------------|
//! | `weather`   | source    | semi-critical |                                         |
//! | `literature`| source    | optional      |                                         |
//! | `album`     | source    | optional      | `literature`                            |
//! | `album_art` | transform | optional      | `album`                                 |
//! | `synthesis` | transform | critical      | `weather`, `literature`, `album`, `album_art` |
//! | `render`    | transform | critical      | `synthesis`                             |
//!
//! [`greeting_pipeline`] wires them to concrete collaborators and
//! [`GreetingAssembler`] turns their outputs into an artifact.

pub mod composition;
pub mod formatters;
pub mod sources;
pub mod stages;

pub use composition::{GreetingLength, SourceMaterial};
pub use sources::{
    AlbumDetails, AlbumLibrary, AlbumSummary, Author, ForecastPeriod, HourlyConditions,
    LanguageModel, LiteratureExcerpt, LiteratureSource, SelectedAlbum, Song, SpeechRenderer,
    WeatherReport, WeatherSource,
};
pub use stages::{
    AlbumArtStage, AlbumSelectionStage, LiteratureStage, RenderStage, SynthesisStage, WeatherStage,
};

use crate::config::AubadeConfig;
use crate::core::{ArtifactBody, Criticality, StageData};
use crate::errors::PipelineValidationError;
use crate::pipeline::{ArtifactAssembler, OrchestratorBuilder, SourceQuorum, StageOrchestrator, StageSpec};
use crate::trace::TraceSink;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Weather stage name.
pub const WEATHER: &str = "weather";
/// Literature stage name.
pub const LITERATURE: &str = "literature";
/// Album selection stage name.
pub const ALBUM: &str = "album";
/// Album art stage name.
pub const ALBUM_ART: &str = "album_art";
/// Synthesis stage name.
pub const SYNTHESIS: &str = "synthesis";
/// Render stage name.
pub const RENDER: &str = "render";

/// Attempts allowed for synthesis when the model returns nothing usable.
const SYNTHESIS_ATTEMPTS: usize = 2;

/// The external services the stages talk to.
#[derive(Clone)]
pub struct Collaborators {
    /// Forecast provider.
    pub weather: Arc<dyn WeatherSource>,
    /// Book catalog.
    pub literature: Arc<dyn LiteratureSource>,
    /// Music library.
    pub library: Arc<dyn AlbumLibrary>,
    /// Text and vision model.
    pub model: Arc<dyn LanguageModel>,
    /// Text-to-speech.
    pub speech: Arc<dyn SpeechRenderer>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Knobs for one pipeline.
#[derive(Debug, Clone)]
pub struct GreetingOptions {
    /// Excerpts judged before literature is given up.
    pub literature_attempts: usize,
    /// Albums offered to the selection judge.
    pub album_choices: usize,
    /// Target length distribution.
    pub length: GreetingLength,
    /// Sources required before synthesis.
    pub quorum: SourceQuorum,
    /// Where `greeting.txt` and `greeting.wav` are written.
    pub output_dir: PathBuf,
    /// Seed for every random choice; `None` uses entropy.
    pub seed: Option<u64>,
}

impl GreetingOptions {
    /// Options from configuration, writing into `output_dir`.
    #[must_use]
    pub fn from_config(config: &AubadeConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            literature_attempts: config.pipeline.literature_attempts,
            album_choices: config.pipeline.album_choices,
            length: GreetingLength::from_config(&config.composition),
            quorum: config.quorum(),
            output_dir: output_dir.into(),
            seed: None,
        }
    }

    /// Fixes the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Builds the six-stage greeting orchestrator.
pub fn greeting_pipeline(
    collaborators: &Collaborators,
    options: &GreetingOptions,
    trace: Arc<dyn TraceSink>,
) -> Result<StageOrchestrator, PipelineValidationError> {
    let seed = options.seed;
    OrchestratorBuilder::new("daily-greeting")
        .stage(StageSpec::source(
            WEATHER,
            Arc::new(WeatherStage::new(Arc::clone(&collaborators.weather))),
            Criticality::SemiCritical,
        ))?
        .stage(StageSpec::source(
            LITERATURE,
            Arc::new(LiteratureStage::new(
                Arc::clone(&collaborators.literature),
                Arc::clone(&collaborators.model),
                options.literature_attempts,
            )),
            Criticality::Optional,
        ))?
        .stage(
            StageSpec::source(
                ALBUM,
                Arc::new(AlbumSelectionStage::new(
                    Arc::clone(&collaborators.library),
                    Arc::clone(&collaborators.model),
                    options.album_choices,
                    seed,
                )),
                Criticality::Optional,
            )
            .with_dependency(LITERATURE),
        )?
        .stage(
            StageSpec::transform(
                ALBUM_ART,
                Arc::new(AlbumArtStage::new(
                    Arc::clone(&collaborators.library),
                    Arc::clone(&collaborators.model),
                )),
                Criticality::Optional,
            )
            .with_dependency(ALBUM),
        )?
        .stage(
            StageSpec::transform(
                SYNTHESIS,
                Arc::new(SynthesisStage::new(
                    Arc::clone(&collaborators.model),
                    options.length,
                    seed.map(|s| s.wrapping_add(1)),
                )),
                Criticality::Critical,
            )
            .with_dependencies([WEATHER, LITERATURE, ALBUM, ALBUM_ART])
            .with_attempts(SYNTHESIS_ATTEMPTS),
        )?
        .stage(
            StageSpec::transform(
                RENDER,
                Arc::new(RenderStage::new(
                    Arc::clone(&collaborators.speech),
                    options.output_dir.clone(),
                )),
                Criticality::Critical,
            )
            .with_dependency(SYNTHESIS),
        )?
        .with_quorum(options.quorum)
        .with_trace_sink(trace)
        .with_assembler(Arc::new(GreetingAssembler))
        .build()
}

/// Reads the greeting text, the rendered audio and the album references.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingAssembler;

impl ArtifactAssembler for GreetingAssembler {
    fn assemble(&self, outputs: &HashMap<String, StageData>) -> Result<ArtifactBody, String> {
        let text = outputs
            .get(SYNTHESIS)
            .and_then(|o| o.get("greeting"))
            .and_then(serde_json::Value::as_str)
            .ok_or("synthesis produced no greeting")?
            .to_string();

        let audio_path = outputs
            .get(RENDER)
            .and_then(|o| o.get("audio_path"))
            .and_then(serde_json::Value::as_str)
            .ok_or("render produced no audio path")?;
        let audio = std::fs::read(audio_path).map_err(|e| format!("cannot read {audio_path}: {e}"))?;
        if audio.is_empty() {
            return Err(format!("{audio_path} is empty"));
        }

        let references = outputs
            .get(ALBUM_ART)
            .and_then(|o| o.get("references"))
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .unwrap_or_default();

        Ok(ArtifactBody {
            text,
            audio,
            references,
        })
    }
}
