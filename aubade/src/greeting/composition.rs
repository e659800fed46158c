//! Prompt construction, target length and response extraction.

use super::formatters::{format_album, format_albums, format_literature, format_weather};
use super::sources::{AlbumSummary, LiteratureExcerpt, SelectedAlbum, WeatherReport};
use crate::config::CompositionConfig;
use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use tracing::{debug, warn};

/// Prompt for describing album cover art.
pub const ALBUM_ART_PROMPT: &str = "Provide a detailed, factual description of the provided album cover art. Use three to five bullet points.\n\nRespond with only the description, no other text. Use markdown bullet points.";

const GREETING_MARKER: &str = "GREETING:";

/// Log-normal distribution of greeting lengths, in words.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreetingLength {
    /// Median length.
    pub mean: f64,
    /// First-quartile length; sets the spread.
    pub first_quartile: f64,
    /// Shortest allowed length.
    pub min: u32,
}

impl Default for GreetingLength {
    fn default() -> Self {
        Self {
            mean: 140.0,
            first_quartile: 100.0,
            min: 80,
        }
    }
}

impl GreetingLength {
    /// Creates the distribution from configuration.
    #[must_use]
    pub fn from_config(config: &CompositionConfig) -> Self {
        Self {
            mean: config.mean_words,
            first_quartile: config.first_quartile_words,
            min: config.min_words,
        }
    }

    /// Draws a target length, never below the minimum.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let mu = self.mean.ln();
        let sigma = (self.mean / self.first_quartile).ln();
        debug!(mu, sigma, "Sampling greeting length");

        let drawn = match LogNormal::new(mu, sigma) {
            Ok(dist) => dist.sample(rng),
            Err(e) => {
                warn!(error = %e, "Invalid length distribution, using the mean");
                self.mean
            }
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let length = drawn.clamp(0.0, f64::from(u32::MAX)) as u32;
        length.max(self.min)
    }

    /// A band of 1-10 words either side of `target`.
    pub fn bounds<R: Rng + ?Sized>(target: u32, rng: &mut R) -> (u32, u32) {
        let lower = target.saturating_sub(rng.gen_range(1..=10));
        let upper = target.saturating_add(rng.gen_range(1..=10));
        (lower, upper)
    }
}

/// The sources available to the synthesis prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceMaterial<'a> {
    /// Weather, if fetched.
    pub weather: Option<&'a WeatherReport>,
    /// Literature, if accepted.
    pub literature: Option<&'a LiteratureExcerpt>,
    /// Album, if selected.
    pub album: Option<&'a SelectedAlbum>,
}

impl SourceMaterial<'_> {
    /// Returns true if no source is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weather.is_none() && self.literature.is_none() && self.album.is_none()
    }
}

/// Asks whether an excerpt is worth writing from.
#[must_use]
pub fn literature_judge_prompt(literature: &LiteratureExcerpt) -> String {
    format!(
        "Please evaluate whether the following literary excerpt is interesting material from which to source literary style or elements for creative writing.\n\n\
         {}\n\n\
         Respond in the following format exactly:\n\
         REASONING: One sentence reasoning about the suitability of the text.\n\
         VERDICT: YES if suitable NO if not",
        format_literature(literature)
    )
}

/// Asks for one album, paired with the literature when there is some.
#[must_use]
pub fn album_selection_prompt(albums: &[AlbumSummary], literature: Option<&LiteratureExcerpt>) -> String {
    let request = match literature {
        Some(literature) => format!(
            "Please select one and only one of the following albums which would pair most interestingly with the selected literary excerpt, whether by contrast or by complement.\n\n{}\n\n{}",
            format_albums(albums),
            format_literature(literature)
        ),
        None => format!(
            "Please select one and only one of the following albums which would be most interesting for a morning wake-up greeting.\n\n{}",
            format_albums(albums)
        ),
    };
    format!(
        "{request}\n\n\
         Respond in the following format exactly:\n\
         REASONING: Two or three sentences considering different options before deciding on the best choice.\n\
         VERDICT: [number only] (just the number 1-{}, nothing else)",
        albums.len()
    )
}

/// Builds the synthesis prompt, mentioning only the sources that are present.
#[must_use]
pub fn synthesis_prompt(material: &SourceMaterial<'_>, bounds: (u32, u32)) -> String {
    let mut prompt = String::from("Compose a motivating morning wake-up call.");

    if !material.is_empty() {
        prompt.push_str(" Write based on the following source material:");
        if let Some(weather) = material.weather {
            prompt.push_str("\n\n");
            prompt.push_str(&format_weather(weather));
        }
        if let Some(literature) = material.literature {
            prompt.push_str("\n\n");
            prompt.push_str(&format_literature(literature));
        }
        if let Some(album) = material.album {
            prompt.push_str("\n\n");
            prompt.push_str(&format_album(album));
        }
        prompt.push('\n');

        if material.weather.is_some() {
            prompt.push_str("\nThe listener can see and feel the current weather.");
        }
        if material.literature.is_some() {
            prompt.push_str("\nThe listener has NOT read the literature excerpt.");
        }
        if material.album.is_some() {
            prompt.push_str("\nThe listener has NOT seen or heard the album yet.");
        }
        prompt.push_str("\n\n");

        if material.literature.is_some() {
            prompt.push_str(
                "Consider whether the literature excerpt has any distinctive structural or stylistic elements. ",
            );
        }
        prompt.push_str(
            "Avoid references that are too specific or out of context.\n\n\
             Weave these elements into a unified vision. Avoid scattered fragments.",
        );
    }

    prompt.push_str(&format!(
        "\n\nMaintain an impersonal voice.\n\n\
         Please keep the final greeting between {} and {} words in length. Respond in the following format exactly:\n\n\
         REASONING:",
        bounds.0, bounds.1
    ));
    if !material.is_empty() {
        prompt.push_str("\n(A few paragraphs pondering the sources)");
    }
    prompt.push_str("\n(A few paragraphs planning the greeting)\n\nGREETING:\n(The final generated greeting)");
    prompt
}

/// Takes the text after the `GREETING:` marker, or the whole response.
#[must_use]
pub fn extract_greeting(response: &str) -> String {
    let upper = response.to_ascii_uppercase();
    let Some(start) = upper.find(GREETING_MARKER) else {
        warn!("No GREETING: marker in synthesis response, using full response");
        return response.trim().to_string();
    };

    let greeting = response[start + GREETING_MARKER.len()..].trim();
    let greeting = greeting
        .strip_prefix('"')
        .and_then(|g| g.strip_suffix('"'))
        .unwrap_or(greeting);
    debug!(words = greeting.split_whitespace().count(), "Greeting extracted");
    greeting.to_string()
}
