//! Random public-domain excerpts from the Gutendex catalog.

use super::{check_status, http_client};
use crate::config::LiteratureConfig;
use crate::errors::{AubadeError, Result};
use crate::greeting::{Author, LiteratureExcerpt, LiteratureSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const TEXT_FORMATS: [&str; 3] = [
    "text/plain; charset=utf-8",
    "text/plain; charset=us-ascii",
    "text/plain",
];

const START_MARKER: &str = r"\*\*\* START OF (THE|THIS) PROJECT GUTENBERG.*?\*\*\*";
const END_MARKER: &str = r"\*\*\* END OF (THE|THIS) PROJECT GUTENBERG.*?\*\*\*";

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Book>,
}

#[derive(Debug, Deserialize)]
struct Book {
    id: u64,
    title: String,
    #[serde(default)]
    authors: Vec<BookAuthor>,
    #[serde(default)]
    formats: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct BookAuthor {
    name: String,
    birth_year: Option<i32>,
    death_year: Option<i32>,
}

impl Book {
    fn text_url(&self) -> Option<&str> {
        TEXT_FORMATS
            .iter()
            .find_map(|format| self.formats.get(*format))
            .map(String::as_str)
    }

    fn author(&self) -> Author {
        self.authors.first().map_or_else(
            || Author {
                name: "Unknown".to_string(),
                birth_year: None,
                death_year: None,
            },
            |a| Author {
                name: a.name.clone(),
                birth_year: a.birth_year,
                death_year: a.death_year,
            },
        )
    }
}

/// Cuts a passage of about `length` characters from the body of a book.
///
/// The Project Gutenberg header and footer are removed, `padding`
/// characters are skipped at both ends, and the window is trimmed to whole
/// words. Returns `None` if the book is too short.
pub fn extract_excerpt<R: Rng + ?Sized>(
    text: &str,
    length: usize,
    padding: usize,
    rng: &mut R,
) -> Option<String> {
    let mut body = text;
    if let Some(m) = Regex::new(START_MARKER).ok()?.find(body) {
        body = &body[m.end()..];
    }
    if let Some(m) = Regex::new(END_MARKER).ok()?.find(body) {
        body = &body[..m.start()];
    }

    let chars: Vec<char> = body.chars().collect();
    if chars.len() < padding * 2 + length {
        warn!(chars = chars.len(), "Book text too short after trimming");
        return None;
    }

    let inner = &chars[padding..chars.len() - padding];
    let start = rng.gen_range(0..=inner.len() - length);
    let window: String = inner[start..start + length].iter().collect();
    let window = window.trim();

    let excerpt = match (window.find(' '), window.rfind(' ')) {
        (Some(first), Some(last)) if first > 0 && last > first => &window[first + 1..last],
        _ => window,
    };
    Some(excerpt.to_string())
}

/// Picks a random catalog page, a random book on it and a random passage.
#[derive(Debug)]
pub struct GutendexLiterature {
    http: reqwest::Client,
    catalog_url: String,
    excerpt_chars: usize,
    padding_chars: usize,
    pages: Exp<f64>,
    rng: Mutex<StdRng>,
}

impl GutendexLiterature {
    /// Creates a client from configuration.
    pub fn new(config: &LiteratureConfig) -> Result<Self> {
        let pages = Exp::new(config.page_rate)
            .map_err(|e| AubadeError::Config(format!("literature.page_rate: {e}")))?;
        Ok(Self {
            http: http_client(
                concat!("aubade/", env!("CARGO_PKG_VERSION")),
                Duration::from_secs(config.timeout_secs),
            )?,
            catalog_url: config.catalog_url.clone(),
            excerpt_chars: config.excerpt_chars,
            padding_chars: config.padding_chars,
            pages,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Makes page, book and passage choices reproducible.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    fn random_page(&self) -> u64 {
        let draw = self.pages.sample(&mut *self.rng.lock());
        // pages are 1 + floor(draw)
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let page = draw as u64;
        page + 1
    }
}

#[async_trait]
impl LiteratureSource for GutendexLiterature {
    async fn random_excerpt(&self) -> Result<LiteratureExcerpt> {
        let page = self.random_page();
        info!(page, "Fetching literature catalog page");

        let response = self
            .http
            .get(&self.catalog_url)
            .query(&[("languages", "en".to_string()), ("page", page.to_string())])
            .send()
            .await?;
        let listing: Page = check_status("gutendex", response).await?.json().await?;

        let book = {
            let mut rng = self.rng.lock();
            listing.results.choose(&mut *rng)
        }
        .ok_or_else(|| AubadeError::collaborator("gutendex", format!("no books on page {page}")))?;

        let text_url = book.text_url().ok_or_else(|| {
            AubadeError::collaborator(
                "gutendex",
                format!("no plain text for '{}' ({})", book.title, book.id),
            )
        })?;
        debug!(id = book.id, title = %book.title, url = text_url, "Fetching book text");

        let response = self.http.get(text_url).send().await?;
        let text = check_status("gutendex", response).await?.text().await?;

        let excerpt = {
            let mut rng = self.rng.lock();
            extract_excerpt(&text, self.excerpt_chars, self.padding_chars, &mut *rng)
        }
        .ok_or_else(|| AubadeError::collaborator("gutendex", format!("'{}' is too short", book.title)))?;

        info!(title = %book.title, chars = excerpt.len(), "Literature excerpt extracted");
        Ok(LiteratureExcerpt {
            title: book.title.clone(),
            author: book.author(),
            excerpt,
        })
    }
}
