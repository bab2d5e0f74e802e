mod api_types;
mod provider;

pub use provider::{IMDB_SITE_URL, SUGGEST_API_URL, SuggestProvider};
