use std::cmp::Ordering;

use crate::database::schema::{Recipe, SortKey};

/// Active sort key and hashtag filter of a result view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortFilterController {
    sort: SortKey,
    hashtag: Option<String>,
}

impl SortFilterController {
    pub fn new(sort: SortKey) -> Self {
        Self {
            sort,
            hashtag: None,
        }
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn hashtag(&self) -> Option<&str> {
        self.hashtag.as_deref()
    }

    /// Returns whether the key changed.
    pub fn set_sort(&mut self, sort: SortKey) -> bool {
        let changed = self.sort != sort;
        self.sort = sort;
        changed
    }

    /// Selecting the active hashtag clears the filter.
    pub fn toggle_hashtag(&mut self, hashtag: &str) {
        self.hashtag = match self.hashtag.as_deref() {
            Some(active) if active == hashtag => None,
            _ => Some(hashtag.to_string()),
        };
    }

    pub fn clear_hashtag(&mut self) {
        self.hashtag = None;
    }

    pub fn keeps(&self, recipe: &Recipe) -> bool {
        self.hashtag
            .as_deref()
            .map(|hashtag| recipe.has_hashtag(hashtag))
            .unwrap_or(true)
    }

    /// Hashtag filter, then a stable sort by the active key.
    pub fn apply(&self, recipes: &[Recipe]) -> Vec<Recipe> {
        let mut view: Vec<Recipe> = recipes
            .iter()
            .filter(|recipe| self.keeps(recipe))
            .cloned()
            .collect();

        view.sort_by(|a, b| compare(self.sort, a, b));
        view
    }
}

pub fn compare(sort: SortKey, a: &Recipe, b: &Recipe) -> Ordering {
    match sort {
        // `None < Some`, so comparing b to a puts absent timestamps last
        SortKey::Recent => b.created_at.cmp(&a.created_at),
        SortKey::Popular => b.popularity().total_cmp(&a.popularity()),
        SortKey::Duration => {
            let minutes = |recipe: &Recipe| recipe.preparation_minutes().unwrap_or(u64::MAX);
            minutes(a).cmp(&minutes(b))
        }
    }
}
