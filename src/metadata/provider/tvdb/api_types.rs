use crate::metadata::provider::lenient;
use serde::Deserialize;
use std::collections::HashMap;

/// Every v4 payload wraps its body in `data`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub token: String,
}

// Search
#[derive(Debug, Deserialize)]
pub struct SearchHit {
    /// String in practice, occasionally a number
    #[serde(default)]
    pub tvdb_id: serde_json::Value,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub slug: Option<String>,
    /// Three-letter language code to title
    #[serde(default, deserialize_with = "lenient")]
    pub translations: Option<HashMap<String, String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub overviews: Option<HashMap<String, String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_air_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

impl SearchHit {
    pub fn numeric_id(&self) -> Option<u64> {
        match &self.tvdb_id {
            serde_json::Value::String(raw) => raw.trim().parse().ok(),
            serde_json::Value::Number(number) => number.as_u64(),
            _ => None,
        }
    }
}

// Extended records
#[derive(Debug, Deserialize)]
pub struct StatusRef {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSet {
    #[serde(default)]
    pub name_translations: Vec<NameTranslation>,
    #[serde(default)]
    pub overview_translations: Vec<OverviewTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct NameTranslation {
    pub language: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverviewTranslation {
    pub language: String,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
}

impl TranslationSet {
    pub fn name(&self, language: &str) -> Option<String> {
        self.name_translations
            .iter()
            .find(|t| t.language == language)
            .and_then(|t| t.name.clone())
    }

    pub fn overview(&self, language: &str) -> Option<String> {
        self.overview_translations
            .iter()
            .find(|t| t.language == language)
            .and_then(|t| t.overview.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct Release {
    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovieExtended {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StatusRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_release: Option<Release>,
    #[serde(default, deserialize_with = "lenient")]
    pub translations: Option<TranslationSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesExtended {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_aired: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StatusRef>,
    #[serde(default)]
    pub seasons: Vec<SeasonRecord>,
    #[serde(default, deserialize_with = "lenient")]
    pub translations: Option<TranslationSet>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonRecord {
    pub id: u64,
    pub number: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub season_type: Option<SeasonTypeRef>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonTypeRef {
    /// Machine name: `official`, `dvd`, `absolute`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
}

// Episode listing
#[derive(Debug, Deserialize)]
pub struct EpisodePage {
    pub data: EpisodePageData,
    #[serde(default, deserialize_with = "lenient")]
    pub links: Option<Links>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodePageData {
    #[serde(default, deserialize_with = "lenient")]
    pub series: Option<SeriesRef>,
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesRef {
    #[serde(default, deserialize_with = "lenient")]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub id: u64,
    pub season_number: u32,
    pub number: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub aired: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<u32>,
}
