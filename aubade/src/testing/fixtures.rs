//! Sample source data.

use crate::greeting::{
    AlbumDetails, AlbumSummary, Author, ForecastPeriod, HourlyConditions, LiteratureExcerpt, Song,
    WeatherReport,
};

/// A mild spring morning.
#[must_use]
pub fn sample_weather() -> WeatherReport {
    WeatherReport {
        overnight: ForecastPeriod {
            name: "Tonight".to_string(),
            precipitation: Some(10.0),
            description: "Mostly clear, with a low around 38.".to_string(),
        },
        sunrise: HourlyConditions {
            temperature: 40.0,
            humidity: Some(81.0),
            dewpoint: Some(2.222_222),
            wind_speed: "3 mph".to_string(),
            wind_direction: "W".to_string(),
            precipitation: Some(2.0),
            conditions: "Sunny".to_string(),
        },
        today: ForecastPeriod {
            name: "Saturday".to_string(),
            precipitation: Some(5.0),
            description: "Sunny, with a high near 61.".to_string(),
        },
    }
}

/// A short public-domain passage.
#[must_use]
pub fn sample_excerpt() -> LiteratureExcerpt {
    LiteratureExcerpt {
        title: "Walden".to_string(),
        author: Author {
            name: "Thoreau, Henry David".to_string(),
            birth_year: Some(1817),
            death_year: Some(1862),
        },
        excerpt: "Every morning was a cheerful invitation to make my life of equal simplicity."
            .to_string(),
    }
}

/// Five albums.
#[must_use]
pub fn sample_albums() -> Vec<AlbumSummary> {
    [
        ("al-1", "Kind of Blue", "Miles Davis", 1959, "Jazz"),
        ("al-2", "Music for Airports", "Brian Eno", 1978, "Ambient"),
        ("al-3", "Pet Sounds", "The Beach Boys", 1966, "Pop"),
        ("al-4", "Harvest", "Neil Young", 1972, "Folk"),
        ("al-5", "Blue Lines", "Massive Attack", 1991, "Trip Hop"),
    ]
    .iter()
    .map(|(id, name, artist, year, genre)| AlbumSummary {
        id: (*id).to_string(),
        name: (*name).to_string(),
        artist: (*artist).to_string(),
        year: Some(*year),
        genres: vec![(*genre).to_string()],
    })
    .collect()
}

/// Three tracks with cover art.
#[must_use]
pub fn sample_details() -> AlbumDetails {
    AlbumDetails {
        songs: vec![
            Song { id: "so-1".to_string(), title: "1/1".to_string() },
            Song { id: "so-2".to_string(), title: "2/1".to_string() },
            Song { id: "so-3".to_string(), title: "1/2".to_string() },
        ],
        cover_art: Some("al-2".to_string()),
    }
}
