use crate::metadata::{
    MediaGuid,
    types::{EpisodeSlot, Season},
};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Which upstream call produced a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FragmentSource {
    /// Season metadata call; its season-level fields win
    Metadata,
    /// Paginated episode listing; contributes episodes
    Listing,
}

/// Partial view of one season
#[derive(Debug, Clone)]
pub struct SeasonFragment {
    pub source: FragmentSource,
    pub season: Season,
}

impl SeasonFragment {
    pub const fn metadata(season: Season) -> Self {
        Self {
            source: FragmentSource::Metadata,
            season,
        }
    }

    pub const fn listing(season: Season) -> Self {
        Self {
            source: FragmentSource::Listing,
            season,
        }
    }
}

/// Merge season fragments into one ordered season list.
///
/// Fragments sharing a season GUID collapse into one season. Season-level
/// fields come from metadata fragments first and are only filled from
/// listing fragments when absent. Episodes are unioned and deduplicated by
/// GUID. On return seasons are ascending by number and so are the episodes
/// of every season, regardless of input order.
pub fn merge_seasons(fragments: impl IntoIterator<Item = SeasonFragment>) -> Vec<Season> {
    let mut fragments: Vec<SeasonFragment> = fragments.into_iter().collect();
    // Stable: fragments from the same source keep their arrival order.
    fragments.sort_by_key(|f| f.source);

    let mut seasons: Vec<Season> = Vec::new();
    let mut positions: HashMap<MediaGuid, usize> = HashMap::new();
    let mut seen_episodes: Vec<HashSet<MediaGuid>> = Vec::new();

    for SeasonFragment { season, .. } in fragments {
        match positions.get(&season.guid) {
            Some(&position) => {
                absorb(&mut seasons[position], &mut seen_episodes[position], season);
            }
            None => {
                let mut fresh = season;
                let mut seen = HashSet::new();
                fresh
                    .episodes
                    .retain(|episode| seen.insert(episode.media.guid.clone()));

                positions.insert(fresh.guid.clone(), seasons.len());
                seasons.push(fresh);
                seen_episodes.push(seen);
            }
        }
    }

    for season in &mut seasons {
        finalize(season);
    }
    seasons.sort_by_key(|s| s.number);
    seasons
}

/// Fold `incoming` into `target`; fields already set on `target` win
fn absorb(target: &mut Season, seen: &mut HashSet<MediaGuid>, incoming: Season) {
    target.source_id = target.source_id.or(incoming.source_id);
    target.source_url = target.source_url.take().or(incoming.source_url);
    target.title = target.title.take().or(incoming.title);
    target.overview = target.overview.take().or(incoming.overview);
    target.image = target.image.take().or(incoming.image);
    target.air_date = target.air_date.or(incoming.air_date);

    for episode in incoming.episodes {
        if seen.insert(episode.media.guid.clone()) {
            target.episodes.push(episode);
        }
    }
}

fn finalize(season: &mut Season) {
    season.episodes.sort_by_key(|e| e.number);

    let before = season.episodes.len();
    season.episodes.dedup_by(|later, kept| later.number == kept.number);
    if season.episodes.len() != before {
        warn!(
            season = %season.guid,
            dropped = before - season.episodes.len(),
            "Distinct episodes share a number, keeping the first"
        );
    }

    if season.air_date.is_none() {
        season.air_date = season.episodes.first().and_then(|e| e.media.air_date);
    }

    let missing: Vec<u32> = season
        .episode_slots()
        .into_iter()
        .filter_map(|slot| match slot {
            EpisodeSlot::Missing(number) => Some(number),
            EpisodeSlot::Present(_) => None,
        })
        .collect();
    season.missing_episodes = missing;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        Provider,
        types::{Episode, Media},
    };
    use chrono::NaiveDate;

    fn show() -> MediaGuid {
        MediaGuid::series(Provider::Tvdb, "81189")
    }

    fn date(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2008, 1, day)
    }

    fn episode(season: u32, number: u32) -> Episode {
        let guid = show().season(season).episode(number);
        Episode::new(
            Media::new(guid, u64::from(season * 100 + number))
                .with_title(Some(format!("S{season}E{number}")))
                .with_air_date(date(number)),
            number,
        )
    }

    fn season(number: u32, episodes: &[u32]) -> Season {
        let mut season = Season::new(show().season(number), number);
        season.episodes = episodes.iter().map(|n| episode(number, *n)).collect();
        season
    }

    fn numbers(season: &Season) -> Vec<u32> {
        season.episodes.iter().map(|e| e.number).collect()
    }

    #[test]
    fn test_same_guid_fragments_merge_into_one() {
        let merged = merge_seasons([
            SeasonFragment::listing(season(1, &[1, 2, 3])),
            SeasonFragment::listing(season(1, &[3, 4, 5])),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(numbers(&merged[0]), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_first_position_season_still_merges() {
        // The season first seen sits at position 0 and must still be found.
        let merged = merge_seasons([
            SeasonFragment::listing(season(0, &[1])),
            SeasonFragment::listing(season(1, &[1])),
            SeasonFragment::listing(season(0, &[2])),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].number, 0);
        assert_eq!(numbers(&merged[0]), vec![1, 2]);
    }

    #[test]
    fn test_metadata_fields_win_over_listing() {
        let mut meta = season(2, &[]);
        meta.title = Some("Season 2".to_string());
        meta.image = Some("https://artworks.thetvdb.com/s2.jpg".to_string());
        meta.source_id = Some(30272);

        let mut listing = season(2, &[1, 2]);
        listing.title = Some("Stagione 2".to_string());
        listing.overview = Some("Walt expands.".to_string());

        // Listing arrives first; the metadata fragment still wins.
        let merged = merge_seasons([
            SeasonFragment::listing(listing),
            SeasonFragment::metadata(meta),
        ]);

        let season = &merged[0];
        assert_eq!(season.title.as_deref(), Some("Season 2"));
        assert_eq!(season.overview.as_deref(), Some("Walt expands."));
        assert_eq!(season.source_id, Some(30272));
        assert_eq!(numbers(season), vec![1, 2]);
    }

    #[test]
    fn test_air_date_backfilled_from_first_episode() {
        let merged = merge_seasons([
            SeasonFragment::metadata(season(1, &[])),
            SeasonFragment::listing(season(1, &[4, 2, 3])),
        ]);

        assert_eq!(merged[0].air_date, date(2));
    }

    #[test]
    fn test_existing_air_date_is_kept() {
        let mut meta = season(1, &[]);
        meta.air_date = date(20);

        let merged = merge_seasons([
            SeasonFragment::metadata(meta),
            SeasonFragment::listing(season(1, &[1])),
        ]);

        assert_eq!(merged[0].air_date, date(20));
    }

    #[test]
    fn test_output_is_sorted_regardless_of_input() {
        let merged = merge_seasons([
            SeasonFragment::listing(season(3, &[9, 2, 5])),
            SeasonFragment::listing(season(0, &[2, 1])),
            SeasonFragment::listing(season(1, &[3, 1, 2])),
        ]);

        let season_numbers: Vec<u32> = merged.iter().map(|s| s.number).collect();
        assert_eq!(season_numbers, vec![0, 1, 3]);
        assert_eq!(numbers(&merged[2]), vec![2, 5, 9]);

        // Sparse numbering is kept, gaps become explicit slots.
        assert_eq!(merged[2].episode_slots().len(), 8);
        assert_eq!(merged[2].missing_episodes, vec![3, 4, 6, 7, 8]);
        assert!(merged[1].missing_episodes.is_empty());
    }

    #[test]
    fn test_missing_episodes_are_serialized() {
        let merged = merge_seasons([
            SeasonFragment::metadata(season(1, &[])),
            SeasonFragment::listing(season(1, &[1, 4])),
        ]);

        let json = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(json["missing_episodes"], serde_json::json!([2, 3]));
        assert_eq!(json["episodes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_listing_only_season_is_kept() {
        let merged = merge_seasons([
            SeasonFragment::metadata(season(1, &[])),
            SeasonFragment::listing(season(1, &[1])),
            SeasonFragment::listing(season(2, &[1])),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(numbers(&merged[1]), vec![1]);
    }

    #[test]
    fn test_conflicting_episode_numbers_keep_first() {
        let mut listing = season(1, &[1]);
        let mut impostor = episode(1, 1);
        impostor.media.guid = show().season(7).episode(1);
        impostor.media.title = Some("Impostor".to_string());
        listing.episodes.push(impostor);

        let merged = merge_seasons([SeasonFragment::listing(listing)]);

        assert_eq!(merged[0].episodes.len(), 1);
        assert_eq!(merged[0].episodes[0].media.title.as_deref(), Some("S1E1"));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let fragments = vec![
            SeasonFragment::listing(season(2, &[2, 1])),
            SeasonFragment::metadata(season(1, &[])),
            SeasonFragment::listing(season(1, &[1])),
        ];

        let first = serde_json::to_string(&merge_seasons(fragments.clone())).unwrap();
        let second = serde_json::to_string(&merge_seasons(fragments)).unwrap();
        assert_eq!(first, second);
    }
}
