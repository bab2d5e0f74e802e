use crate::metadata::provider::lenient;
use serde::Deserialize;

const fn first_page() -> u32 {
    1
}

// Search responses
#[derive(Debug, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct MovieResult {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub original_title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TvResult {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub original_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_air_date: Option<String>,
}

// Detail responses
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub original_title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub translations: Option<Translations>,
}

#[derive(Debug, Deserialize)]
pub struct TvDetails {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub original_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_air_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
    #[serde(default, deserialize_with = "lenient")]
    pub translations: Option<Translations>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonSummary {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u64>,
    pub season_number: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub air_date: Option<String>,
}

/// Season details; episode lists that span several pages report `total_pages`
#[derive(Debug, Deserialize)]
pub struct SeasonDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub air_date: Option<String>,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub episodes: Vec<EpisodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeResult {
    pub id: u64,
    pub episode_number: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub still_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub air_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<u32>,
}

// append_to_response=translations
#[derive(Debug, Default, Deserialize)]
pub struct Translations {
    #[serde(default)]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
pub struct Translation {
    pub iso_639_1: String,
    #[serde(default)]
    pub data: TranslationData,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslationData {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Option<String>,
}

impl Translations {
    pub fn for_language(&self, language: &str) -> Option<&TranslationData> {
        self.translations
            .iter()
            .find(|t| t.iso_639_1.eq_ignore_ascii_case(language))
            .map(|t| &t.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_defaults() {
        let empty: SearchResponse<MovieResult> =
            serde_json::from_str(r#"{"total_results": 0}"#).unwrap();
        assert_eq!((empty.page, empty.total_pages), (1, 1));
        assert!(empty.results.is_empty());

        let page: SearchResponse<TvResult> = serde_json::from_str(
            r#"{"page": 2, "total_pages": 3, "results": [{"id": 1396, "name": "Breaking Bad"}]}"#,
        )
        .unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.results[0].id, 1396);
        assert_eq!(page.results[0].name.as_deref(), Some("Breaking Bad"));
    }
}
