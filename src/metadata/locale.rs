use crate::metadata::{MetadataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 639-1 to ISO 639-2/T mapping for the languages TVDB translations use
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("de", "deu"),
    ("en", "eng"),
    ("es", "spa"),
    ("fr", "fra"),
    ("it", "ita"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("nl", "nld"),
    ("pl", "pol"),
    ("pt", "por"),
    ("ru", "rus"),
    ("sv", "swe"),
    ("zh", "zho"),
];

/// Language (and optional region) used to query providers, e.g. `it-IT`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    /// Build a locale, rejecting languages no provider understands
    pub fn new(language: &str, region: Option<&str>) -> Result<Self> {
        let language = language.to_ascii_lowercase();
        if !LANGUAGE_CODES.iter().any(|(iso1, _)| *iso1 == language) {
            return Err(MetadataError::Validation(format!(
                "Unsupported locale language: {language}"
            )));
        }

        Ok(Self {
            language,
            region: region.map(str::to_ascii_uppercase),
        })
    }

    #[must_use]
    pub fn english() -> Self {
        Self {
            language: "en".to_string(),
            region: Some("US".to_string()),
        }
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// BCP-47 style tag as TMDB expects it (`it-IT`)
    #[must_use]
    pub fn tmdb_tag(&self) -> String {
        self.to_string()
    }

    /// Three-letter code as TVDB translations use it (`ita`)
    #[must_use]
    pub fn tvdb_code(&self) -> &'static str {
        LANGUAGE_CODES
            .iter()
            .find(|(iso1, _)| *iso1 == self.language)
            .map_or("eng", |(_, iso2)| iso2)
    }

    /// Two locales with the same language yield the same upstream results
    #[must_use]
    pub fn same_language(&self, other: &Self) -> bool {
        self.language == other.language
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::english()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => f.write_str(&self.language),
        }
    }
}

impl FromStr for Locale {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(2, |c| c == '-' || c == '_');
        let language = parts.next().filter(|l| l.len() == 2).ok_or_else(|| {
            MetadataError::Validation(format!("Invalid locale: {s}"))
        })?;
        let region = parts.next().filter(|r| !r.is_empty());

        Self::new(language, region)
    }
}

impl TryFrom<String> for Locale {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_codes() {
        let locale: Locale = "it-IT".parse().unwrap();
        assert_eq!(locale.tmdb_tag(), "it-IT");
        assert_eq!(locale.tvdb_code(), "ita");

        let bare: Locale = "de".parse().unwrap();
        assert_eq!(bare.tmdb_tag(), "de");
        assert_eq!(bare.tvdb_code(), "deu");

        let underscored: Locale = "pt_br".parse().unwrap();
        assert_eq!(underscored.to_string(), "pt-BR");
    }

    #[test]
    fn test_unsupported_language_is_validation_error() {
        assert!(matches!(
            "xx-XX".parse::<Locale>(),
            Err(MetadataError::Validation(_))
        ));
        assert!(matches!(
            "italian".parse::<Locale>(),
            Err(MetadataError::Validation(_))
        ));
    }

    #[test]
    fn test_same_language_ignores_region() {
        let us: Locale = "en-US".parse().unwrap();
        let gb: Locale = "en-GB".parse().unwrap();
        assert!(us.same_language(&gb));
        assert!(!us.same_language(&"it-IT".parse().unwrap()));
    }
}
