//! Plain-text renderings of source data for prompts.

use super::sources::{AlbumSummary, LiteratureExcerpt, SelectedAlbum, WeatherReport};
use std::fmt::Write;

fn percent(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

fn year(year: Option<i32>) -> String {
    year.map_or_else(|| "unknown year".to_string(), |y| y.to_string())
}

fn genres(genres: &[String]) -> String {
    if genres.is_empty() {
        "Unknown genre".to_string()
    } else {
        genres.join(", ")
    }
}

/// Formats the weather section.
#[must_use]
pub fn format_weather(weather: &WeatherReport) -> String {
    let sunrise = &weather.sunrise;
    let humidity = sunrise
        .humidity
        .map_or_else(|| "unknown".to_string(), |h| h.to_string());
    let dewpoint = sunrise
        .dewpoint
        .map_or_else(|| "unknown ".to_string(), |d| format!("{d:.2}"));

    format!(
        "WEATHER DATA:\n\
         Overnight: {} {}% chance of precipitation.\n\
         Sunrise (NOW): {}°F, {}, {humidity}% humidity, dewpoint {dewpoint}°C, wind {} from {}, {}% chance of precipitation.\n\
         Today ({}): {} {}% chance of precipitation.",
        weather.overnight.description,
        percent(weather.overnight.precipitation),
        sunrise.temperature,
        sunrise.conditions,
        sunrise.wind_speed,
        sunrise.wind_direction,
        percent(sunrise.precipitation),
        weather.today.name,
        weather.today.description,
        percent(weather.today.precipitation),
    )
}

/// Formats the literature section.
#[must_use]
pub fn format_literature(literature: &LiteratureExcerpt) -> String {
    let author = &literature.author;
    let mut byline = author.name.clone();
    if let (Some(birth), Some(death)) = (author.birth_year, author.death_year) {
        let _ = write!(byline, " ({birth}-{death})");
    }
    format!(
        "LITERATURE EXCERPT: \"{}\" by {byline}:\n\n{}",
        literature.title, literature.excerpt
    )
}

/// Formats the numbered album list offered for selection.
#[must_use]
pub fn format_albums(albums: &[AlbumSummary]) -> String {
    let lines: Vec<String> = albums
        .iter()
        .enumerate()
        .map(|(i, album)| {
            format!(
                "[{}] \"{}\" by {} ({}) - Genres: {}",
                i + 1,
                album.name,
                album.artist,
                year(album.year),
                genres(&album.genres)
            )
        })
        .collect();
    format!("ALBUMS:\n{}", lines.join("\n"))
}

/// Formats the selected album with its tracklist.
#[must_use]
pub fn format_album(album: &SelectedAlbum) -> String {
    let summary = &album.summary;
    let mut out = format!(
        "SELECTED ALBUM: \"{}\" by {} ({})\nGenres: {}\nTracklist:",
        summary.name,
        summary.artist,
        year(summary.year),
        genres(&summary.genres)
    );
    for (i, song) in album.songs.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, song.title);
    }
    if let Some(description) = &album.art_description {
        let _ = write!(out, "\nCover art description:\n{description}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::sources::{Author, ForecastPeriod, HourlyConditions, Song};
    use pretty_assertions::assert_eq;

    fn weather() -> WeatherReport {
        WeatherReport {
            overnight: ForecastPeriod {
                name: "Tonight".to_string(),
                precipitation: Some(20.0),
                description: "Mostly clear, with a low around 41.".to_string(),
            },
            sunrise: HourlyConditions {
                temperature: 43.0,
                humidity: Some(86.0),
                dewpoint: Some(3.888_888_888_9),
                wind_speed: "5 mph".to_string(),
                wind_direction: "NW".to_string(),
                precipitation: None,
                conditions: "Sunny".to_string(),
            },
            today: ForecastPeriod {
                name: "Tuesday".to_string(),
                precipitation: Some(0.0),
                description: "Sunny, with a high near 62.".to_string(),
            },
        }
    }

    #[test]
    fn test_format_weather() {
        assert_eq!(
            format_weather(&weather()),
            "WEATHER DATA:\n\
             Overnight: Mostly clear, with a low around 41. 20% chance of precipitation.\n\
             Sunrise (NOW): 43°F, Sunny, 86% humidity, dewpoint 3.89°C, wind 5 mph from NW, 0% chance of precipitation.\n\
             Today (Tuesday): Sunny, with a high near 62. 0% chance of precipitation."
        );
    }

    #[test]
    fn test_format_literature_with_and_without_years() {
        let mut literature = LiteratureExcerpt {
            title: "Walden".to_string(),
            author: Author {
                name: "Thoreau, Henry David".to_string(),
                birth_year: Some(1817),
                death_year: Some(1862),
            },
            excerpt: "I went to the woods".to_string(),
        };
        assert_eq!(
            format_literature(&literature),
            "LITERATURE EXCERPT: \"Walden\" by Thoreau, Henry David (1817-1862):\n\nI went to the woods"
        );

        literature.author.death_year = None;
        assert!(format_literature(&literature).starts_with("LITERATURE EXCERPT: \"Walden\" by Thoreau, Henry David:"));
    }

    #[test]
    fn test_format_albums() {
        let albums = vec![
            AlbumSummary {
                id: "a1".to_string(),
                name: "Kind of Blue".to_string(),
                artist: "Miles Davis".to_string(),
                year: Some(1959),
                genres: vec!["Jazz".to_string(), "Modal".to_string()],
            },
            AlbumSummary {
                id: "a2".to_string(),
                name: "Untitled".to_string(),
                artist: "Nobody".to_string(),
                year: None,
                genres: Vec::new(),
            },
        ];
        assert_eq!(
            format_albums(&albums),
            "ALBUMS:\n[1] \"Kind of Blue\" by Miles Davis (1959) - Genres: Jazz, Modal\n\
             [2] \"Untitled\" by Nobody (unknown year) - Genres: Unknown genre"
        );
    }

    #[test]
    fn test_format_album() {
        let mut album = SelectedAlbum::from(AlbumSummary {
            id: "a1".to_string(),
            name: "Kind of Blue".to_string(),
            artist: "Miles Davis".to_string(),
            year: Some(1959),
            genres: vec!["Jazz".to_string()],
        });
        album.songs = vec![
            Song { id: "s1".to_string(), title: "So What".to_string() },
            Song { id: "s2".to_string(), title: "Freddie Freeloader".to_string() },
        ];
        assert_eq!(
            format_album(&album),
            "SELECTED ALBUM: \"Kind of Blue\" by Miles Davis (1959)\nGenres: Jazz\nTracklist:\n1. So What\n2. Freddie Freeloader"
        );

        album.art_description = Some("- A trumpeter in blue light".to_string());
        assert!(format_album(&album).ends_with("\nCover art description:\n- A trumpeter in blue light"));
    }
}
