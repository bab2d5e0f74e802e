use crate::metadata::provider::lenient;
use serde::Deserialize;

/// Body of the `imdb$<name>(...)` JSONP wrapper
#[derive(Debug, Default, Deserialize)]
pub struct SuggestResponse {
    #[serde(default)]
    pub d: Vec<SuggestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestEntry {
    /// `tt0133093` for titles, `nm...` for people
    pub id: String,
    /// Label
    #[serde(default, deserialize_with = "lenient")]
    pub l: Option<String>,
    /// Qualifier, e.g. `feature` or `TV series`; absent for people
    #[serde(default, deserialize_with = "lenient")]
    pub q: Option<String>,
    /// Year
    #[serde(default, deserialize_with = "lenient")]
    pub y: Option<i32>,
    /// `[url, width, height]`
    #[serde(default, deserialize_with = "lenient")]
    pub i: Option<Vec<serde_json::Value>>,
}

impl SuggestEntry {
    pub fn poster(&self) -> Option<String> {
        self.i
            .as_ref()?
            .first()?
            .as_str()
            .map(str::to_string)
    }
}
