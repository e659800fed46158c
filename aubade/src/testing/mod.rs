//! Testing utilities.
//!
//! This module provides:
//! - In-memory collaborators for the greeting stages
//! - A playback device that records calls and a fixed sunrise
//! - Sample source data

mod fixtures;
mod mocks;

pub use fixtures::{sample_albums, sample_details, sample_excerpt, sample_weather};
pub use mocks::{
    DeviceCall, FileWritingSpeech, FixedSunrise, RecordingDevice, ScriptedLanguageModel, StaticLibrary,
    StaticLiterature, StaticWeather,
};
