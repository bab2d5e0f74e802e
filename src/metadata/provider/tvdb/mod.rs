mod api_types;
mod provider;

pub use provider::{TVDB_API_URL, TVDB_SITE_URL, TvdbProvider};

use crate::metadata::{MetadataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Season ordering a show tree is built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    #[default]
    Official,
    Dvd,
    Absolute,
    Alternate,
    Regional,
}

impl SeasonType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Dvd => "dvd",
            Self::Absolute => "absolute",
            Self::Alternate => "alternate",
            Self::Regional => "regional",
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "official" | "default" => Ok(Self::Official),
            "dvd" => Ok(Self::Dvd),
            "absolute" => Ok(Self::Absolute),
            "alternate" => Ok(Self::Alternate),
            "regional" => Ok(Self::Regional),
            other => Err(MetadataError::Validation(format!(
                "Unsupported season type: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_type_parsing() {
        assert_eq!("DVD".parse::<SeasonType>().unwrap(), SeasonType::Dvd);
        assert_eq!("default".parse::<SeasonType>().unwrap(), SeasonType::Official);
        assert!("aired".parse::<SeasonType>().is_err());
    }
}
