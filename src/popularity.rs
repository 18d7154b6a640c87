//! Popularity scoring for package projects.
//!
//! The score is a weighted sum of download and vote counts, a recency step
//! for the last update, and four fixed boosts for project traits:
//!
//! | Term | Weight | Value |
//! |------|--------|-------|
//! | downloads | 1 | raw count |
//! | votes | 100 | raw count |
//! | recency | 100 | 0..=5, see [`recency_points`] |
//! | works on cloud | 500 | 0 or 1 |
//! | has forum | 500 | 0 or 1 |
//! | has source link | 500 | 0 or 1 |
//! | open for collaboration | 500 | 0 or 1 |
//!
//! There is no clamping. Download counts dominate for large projects while
//! the trait boosts give small projects a floor.
//!
//! The recency term is measured against the clock at scoring time, so the
//! same inputs score lower as they age.

use chrono::{DateTime, Utc};

const DOWNLOAD_WEIGHT: i64 = 1;
const VOTE_WEIGHT: i64 = 100;
const RECENCY_WEIGHT: i64 = 100;
const TRAIT_WEIGHT: i64 = 500;

/// Signals feeding one popularity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularityInputs {
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub works_on_cloud: bool,
    pub has_forum: bool,
    pub has_source_link: bool,
    pub open_for_collab: bool,
    pub downloads: i64,
    pub votes: i64,
}

impl PopularityInputs {
    /// Score against the current wall clock.
    pub fn score(&self) -> i64 {
        self.score_at(Utc::now())
    }

    /// Score as if evaluated at `now`.
    pub fn score_at(&self, now: DateTime<Utc>) -> i64 {
        let days = (now - self.update_date).num_seconds() as f64 / 86_400.0;

        let ranking = [
            (DOWNLOAD_WEIGHT, self.downloads),
            (VOTE_WEIGHT, self.votes),
            (RECENCY_WEIGHT, recency_points(days)),
            (TRAIT_WEIGHT, i64::from(self.works_on_cloud)),
            (TRAIT_WEIGHT, i64::from(self.has_forum)),
            (TRAIT_WEIGHT, i64::from(self.has_source_link)),
            (TRAIT_WEIGHT, i64::from(self.open_for_collab)),
        ];

        ranking.iter().map(|(weight, value)| weight * value).sum()
    }
}

/// Step function over days since the last update.
pub fn recency_points(days: f64) -> i64 {
    match days {
        d if d <= 30.0 => 5,
        d if d <= 60.0 => 4,
        d if d <= 120.0 => 3,
        d if d <= 355.0 => 2,
        d if d <= 700.0 => 1,
        _ => 0,
    }
}
