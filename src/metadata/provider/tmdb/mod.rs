mod api_types;
mod provider;

pub use provider::{TMDB_API_URL, TMDB_IMAGE_URL, TMDB_SITE_URL, TmdbProvider};
