use std::{cmp::Ordering, sync::Arc};

use tokio::sync::Mutex;

use super::{
    controller::{compare, SortFilterController},
    executor::{filter_recipes, normalize_term},
    sequence::RequestSequence,
};
use crate::{
    constants::RECIPES_COLLECTION,
    database::{
        error::QueryError,
        form::FormData,
        pagination::{CursorManager, Page},
        schema::{Recipe, SortKey},
        store::{Cursor, Document, DocumentStore, Predicate, StoreQuery},
    },
};

/// What a result page lists: a free-text search or a category.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingScope {
    Search(String),
    Category {
        title: String,
        gluten_free: Option<bool>,
        term: Option<String>,
    },
}

impl ListingScope {
    pub fn search(term: &str) -> Self {
        Self::Search(normalize_term(term))
    }

    pub fn category(title: &str) -> Self {
        Self::Category {
            title: title.to_string(),
            gluten_free: None,
            term: None,
        }
    }

    /// Equality predicates pushed down to the store.
    pub fn predicates(&self) -> Vec<Predicate> {
        match self {
            ListingScope::Search(_) => vec![],
            ListingScope::Category {
                title, gluten_free, ..
            } => {
                let mut predicates = vec![Predicate::eq("category", title.as_str())];
                if let Some(gluten_free) = gluten_free {
                    predicates.push(Predicate::eq("glutenFree", *gluten_free));
                }
                predicates
            }
        }
    }

    /// Local text filter applied before paging.
    pub fn term(&self) -> Option<&str> {
        match self {
            ListingScope::Search(term) => Some(term.as_str()),
            ListingScope::Category { term, .. } => term.as_deref().filter(|t| !t.is_empty()),
        }
    }

    /// A blank free-text search lists nothing and never reaches the store.
    pub fn is_blank(&self) -> bool {
        matches!(self, ListingScope::Search(term) if term.is_empty())
    }

    pub fn with_term(&self, term: &str) -> Self {
        match self {
            ListingScope::Search(_) => Self::search(term),
            ListingScope::Category {
                title, gluten_free, ..
            } => Self::Category {
                title: title.to_owned(),
                gluten_free: *gluten_free,
                term: Some(normalize_term(term)).filter(|t| !t.is_empty()),
            },
        }
    }
}

/// Fetches the rows following `cursor` in the parsed order of the active sort
/// key. The store narrows the set by the scope's predicates; text filter,
/// hashtag filter and ordering run on parsed recipes, so every page follows
/// the same total order: the sort key, then the recipe id.
pub async fn fetch_page<S: DocumentStore>(
    store: &S,
    scope: &ListingScope,
    controller: &SortFilterController,
    cursor: Option<Cursor>,
    page_size: usize,
) -> Result<Page<Recipe>, QueryError> {
    if scope.is_blank() {
        return Ok(Page::no_rows());
    }

    let query = scope
        .predicates()
        .into_iter()
        .fold(StoreQuery::collection(RECIPES_COLLECTION), StoreQuery::filter);

    let mut recipes: Vec<Recipe> = store
        .query(&query)
        .await?
        .iter()
        .map(Recipe::from_document)
        .collect();
    recipes.sort_by(|a, b| a.id.cmp(&b.id));

    let recipes = match scope.term() {
        Some(term) => filter_recipes(recipes, term),
        None => recipes,
    };

    let sort = controller.sort();
    let ordered = controller.apply(&recipes);
    let start = match &cursor {
        Some(cursor) => {
            let anchor = anchor(sort, cursor);
            ordered
                .iter()
                .position(|recipe| follows(sort, recipe, &anchor))
                .unwrap_or(ordered.len())
        }
        None => 0,
    };

    let mut rows: Vec<Recipe> = ordered.into_iter().skip(start).collect();
    let more = rows.len() > page_size;
    rows.truncate(page_size);

    let next = match rows.last() {
        Some(last) if more => Some(position(sort, last)),
        _ => None,
    };
    Ok(Page::from_rows(rows, next))
}

fn position(sort: SortKey, recipe: &Recipe) -> Cursor {
    Cursor {
        id: recipe.id.to_owned(),
        value: recipe.sort_value(sort),
    }
}

/// Rebuilds the ordering field of the row a cursor was taken from.
fn anchor(sort: SortKey, cursor: &Cursor) -> Recipe {
    let mut fields = FormData::new();
    if let Some(value) = &cursor.value {
        fields.insert(sort.field().into(), value.to_owned());
    }
    Recipe::from_document(&Document::new(&cursor.id, fields))
}

fn follows(sort: SortKey, recipe: &Recipe, anchor: &Recipe) -> bool {
    compare(sort, recipe, anchor).then_with(|| recipe.id.cmp(&anchor.id)) == Ordering::Greater
}

struct ListingState {
    scope: ListingScope,
    controller: SortFilterController,
    cursor: CursorManager,
    visible: Vec<Recipe>,
    loading: bool,
    /// The last refresh failed; loading more retries the first page.
    retry: bool,
}

/// State of a search or category results page: visible recipes, active sort
/// and hashtag, and the pagination cursor.
pub struct ResultListing<S> {
    store: Arc<S>,
    page_size: usize,
    sequence: RequestSequence,
    state: Mutex<ListingState>,
}

impl<S: DocumentStore> ResultListing<S> {
    pub fn new(store: Arc<S>, scope: ListingScope, page_size: usize) -> Self {
        Self {
            store,
            page_size,
            sequence: RequestSequence::new(),
            state: Mutex::new(ListingState {
                scope,
                controller: SortFilterController::default(),
                cursor: CursorManager::new(),
                visible: vec![],
                loading: false,
                retry: false,
            }),
        }
    }

    pub async fn visible(&self) -> Vec<Recipe> {
        self.state.lock().await.visible.clone()
    }

    pub async fn sort(&self) -> SortKey {
        self.state.lock().await.controller.sort()
    }

    pub async fn hashtag(&self) -> Option<String> {
        self.state.lock().await.controller.hashtag().map(String::from)
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// Whether "load more" should be offered.
    pub async fn can_load_more(&self) -> bool {
        let state = self.state.lock().await;
        state.cursor.has_more() || state.retry
    }

    /// Replaces the visible list with the first page of the current scope.
    pub async fn refresh(&self) {
        let stamp = self.sequence.issue();
        let (scope, controller) = {
            let mut state = self.state.lock().await;
            state.cursor.reset();
            state.loading = true;
            (state.scope.clone(), state.controller.clone())
        };

        let result = fetch_page(&*self.store, &scope, &controller, None, self.page_size).await;

        let mut state = self.state.lock().await;
        if !self.sequence.is_current(stamp) {
            log::trace!("> Discarding stale listing page");
            return;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                log::debug!("> Listing {:?} returned {} recipes", scope, page.rows.len());
                state.cursor.advance(page.next);
                state.visible = page.rows;
                state.retry = false;
            }
            Err(e) => {
                log::error!("> Failed to fetch recipes: {e}");
                state.retry = true;
            }
        }
    }

    /// Appends the page following the cursor. Previously visible recipes keep
    /// their positions. After a failed refresh the first page is fetched again
    /// instead.
    pub async fn load_more(&self) {
        let stamp = self.sequence.current();
        let (scope, controller, cursor) = {
            let state = self.state.lock().await;
            if state.retry && !state.loading {
                drop(state);
                return self.refresh().await;
            }
            match state.cursor.cursor() {
                Some(cursor) if !state.loading => {
                    (state.scope.clone(), state.controller.clone(), cursor.clone())
                }
                _ => return,
            }
        };
        self.state.lock().await.loading = true;

        let result =
            fetch_page(&*self.store, &scope, &controller, Some(cursor.clone()), self.page_size)
                .await;

        let mut state = self.state.lock().await;
        if !self.sequence.is_current(stamp) || state.cursor.cursor() != Some(&cursor) {
            log::trace!("> Discarding stale listing page");
            return;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                state.cursor.advance(page.next);
                state.visible.extend(page.rows);
            }
            Err(e) => log::error!("> Failed to fetch more recipes: {e}"),
        }
    }

    pub async fn set_term(&self, term: &str) {
        {
            let mut state = self.state.lock().await;
            let scope = state.scope.with_term(term);
            if scope == state.scope {
                return;
            }
            state.scope = scope;
        }
        self.refresh().await;
    }

    pub async fn set_sort(&self, sort: SortKey) {
        if !self.state.lock().await.controller.set_sort(sort) {
            return;
        }
        self.refresh().await;
    }

    pub async fn toggle_hashtag(&self, hashtag: &str) {
        self.state.lock().await.controller.toggle_hashtag(hashtag);
        self.refresh().await;
    }

    /// Teardown: in-flight fetches resolve as no-ops.
    pub fn close(&self) {
        self.sequence.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::{
        database::store::MemoryStore,
        search::executor::tests::{kitchen, recipe_document, titles, DelayedStore, FlakyStore},
    };

    #[tokio::test]
    async fn torta_search_sorted_by_recency() {
        let listing = ResultListing::new(Arc::new(kitchen().await), ListingScope::search("torta"), 10);

        listing.set_sort(SortKey::Popular).await;
        listing.set_sort(SortKey::Recent).await;

        assert_eq!(titles(&listing.visible().await), vec!["Torta salata", "Torta di mele"]);
    }

    #[tokio::test]
    async fn blank_search_lists_nothing_without_fetching() {
        let store = Arc::new(FlakyStore::new(kitchen().await));
        let listing = ResultListing::new(store.clone(), ListingScope::search(" "), 10);

        listing.refresh().await;

        assert!(listing.visible().await.is_empty());
        assert!(!listing.can_load_more().await);
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    async fn numbered_store(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for n in 0..count {
            let hashtag = if n % 3 == 0 { "forno" } else { "veloce" };
            let fields = json!({
                "title": format!("Torta {n:02}"),
                "createdAt": format!("2024-01-{:02}T00:00:00Z", n % 28 + 1),
                "rating": n % 4,
                "hashtags": [hashtag],
            });
            store
                .insert(RECIPES_COLLECTION, recipe_document(&format!("id{n:02}"), fields))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn load_more_walks_every_page_without_gaps() {
        let store = Arc::new(numbered_store(23).await);
        let listing = ResultListing::new(store.clone(), ListingScope::search("torta"), 5);
        listing.set_sort(SortKey::Popular).await;

        let mut loads = 0;
        while listing.can_load_more().await {
            listing.load_more().await;
            loads += 1;
        }

        // 23 rows: the first page, three full pages and a last one of three
        assert_eq!(loads, 4);
        assert_eq!(listing.visible().await.len(), 23);

        let everything = fetch_page(
            &*store,
            &ListingScope::search("torta"),
            &SortFilterController::new(SortKey::Popular),
            None,
            usize::MAX,
        )
        .await
        .unwrap();
        assert_eq!(listing.visible().await, everything.rows);
    }

    #[tokio::test]
    async fn loaded_pages_are_appended_in_place() {
        let listing = ResultListing::new(Arc::new(numbered_store(12).await), ListingScope::search("torta"), 5);
        listing.refresh().await;
        let first = listing.visible().await;

        listing.load_more().await;
        let after = listing.visible().await;

        assert_eq!(after.len(), 10);
        assert_eq!(&after[..5], &first[..]);
    }

    #[tokio::test]
    async fn changing_the_hashtag_restarts_pagination() {
        let listing = ResultListing::new(Arc::new(numbered_store(12).await), ListingScope::search("torta"), 5);
        listing.refresh().await;
        listing.load_more().await;
        assert_eq!(listing.visible().await.len(), 10);

        listing.toggle_hashtag("forno").await;
        let filtered = listing.visible().await;
        assert_eq!(filtered.len(), 4);
        assert!(filtered.iter().all(|r| r.has_hashtag("forno")));
        assert!(!listing.can_load_more().await);

        listing.toggle_hashtag("forno").await;
        assert_eq!(listing.hashtag().await, None);
        assert_eq!(listing.visible().await.len(), 5);
    }

    async fn store_of(rows: Vec<(&str, serde_json::Value)>) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for (id, fields) in rows {
            store.insert(RECIPES_COLLECTION, recipe_document(id, fields)).await;
        }
        Arc::new(store)
    }

    async fn load_everything(listing: &ResultListing<MemoryStore>) -> Vec<Recipe> {
        listing.refresh().await;
        while listing.can_load_more().await {
            listing.load_more().await;
        }
        listing.visible().await
    }

    async fn unbounded(store: &MemoryStore, sort: SortKey) -> Vec<Recipe> {
        let controller = SortFilterController::new(sort);
        fetch_page(store, &ListingScope::search("torta"), &controller, None, usize::MAX)
            .await
            .map(|page| page.rows)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn malformed_timestamps_stay_behind_every_page() {
        let store = store_of(vec![
            ("a", json!({ "title": "Torta a", "createdAt": "bad date" })),
            ("b", json!({ "title": "Torta b", "createdAt": "2024-03-01T00:00:00Z" })),
            ("c", json!({ "title": "Torta c", "createdAt": "2024-02-01T00:00:00Z" })),
            ("d", json!({ "title": "Torta d", "createdAt": "2024-01-01T00:00:00Z" })),
        ])
        .await;
        let listing = ResultListing::new(store.clone(), ListingScope::search("torta"), 2);

        let visible = load_everything(&listing).await;

        assert_eq!(titles(&visible), vec!["Torta b", "Torta c", "Torta d", "Torta a"]);
        assert_eq!(visible, unbounded(&store, SortKey::Recent).await);
    }

    #[tokio::test]
    async fn duration_pages_ascend_across_pages() {
        let store = store_of(vec![
            ("a", json!({ "title": "Torta 5", "preparationTime": "5 min" })),
            ("b", json!({ "title": "Torta 90", "preparationTime": "90 min" })),
            ("c", json!({ "title": "Torta 10", "preparationTime": "10 min" })),
            ("d", json!({ "title": "Torta 45", "preparationTime": "45 min" })),
            ("e", json!({ "title": "Torta ?", "preparationTime": "quanto basta" })),
        ])
        .await;
        let listing = ResultListing::new(store.clone(), ListingScope::search("torta"), 2);
        listing.set_sort(SortKey::Duration).await;

        let visible = load_everything(&listing).await;

        assert_eq!(
            titles(&visible),
            vec!["Torta 5", "Torta 10", "Torta 45", "Torta 90", "Torta ?"]
        );
        assert_eq!(visible, unbounded(&store, SortKey::Duration).await);
    }

    #[tokio::test]
    async fn page_tokens_survive_a_deleted_anchor() {
        let store = store_of(vec![
            ("a", json!({ "title": "Torta a", "rating": 5 })),
            ("b", json!({ "title": "Torta b", "rating": 4 })),
            ("c", json!({ "title": "Torta c", "averageRating": 3 })),
        ])
        .await;
        let scope = ListingScope::search("torta");
        let controller = SortFilterController::new(SortKey::Popular);

        let first = fetch_page(&*store, &scope, &controller, None, 2).await.unwrap();
        assert_eq!(titles(&first.rows), vec!["Torta a", "Torta b"]);

        assert!(store.delete(RECIPES_COLLECTION, "b").await.is_ok());
        let second = fetch_page(&*store, &scope, &controller, first.next, 2).await.unwrap();
        assert_eq!(titles(&second.rows), vec!["Torta c"]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn hashtag_rows_far_down_the_collection_fill_the_first_page() {
        let mut rows = vec![];
        for n in 0..9 {
            let hashtag = if n >= 6 { "rara" } else { "comune" };
            let fields = json!({
                "title": format!("Torta {n}"),
                "createdAt": format!("2024-01-{:02}T00:00:00Z", 20 - n),
                "hashtags": [hashtag],
            });
            rows.push((format!("id{n}"), fields));
        }
        let store = store_of(rows.iter().map(|(id, f)| (id.as_str(), f.clone())).collect()).await;
        let listing = ResultListing::new(store, ListingScope::search("torta"), 2);
        listing.refresh().await;

        listing.toggle_hashtag("rara").await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta 6", "Torta 7"]);
        assert!(listing.can_load_more().await);

        listing.load_more().await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta 6", "Torta 7", "Torta 8"]);
        assert!(!listing.can_load_more().await);
    }

    #[tokio::test]
    async fn load_more_after_a_failed_refresh_fetches_again() {
        let store = Arc::new(FlakyStore::new(kitchen().await));
        let listing = ResultListing::new(store.clone(), ListingScope::search("torta"), 1);
        listing.refresh().await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta salata"]);

        store.failing.store(true, Ordering::SeqCst);
        listing.set_sort(SortKey::Popular).await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta salata"]);
        assert!(listing.can_load_more().await);

        store.failing.store(false, Ordering::SeqCst);
        listing.load_more().await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta di mele"]);

        listing.load_more().await;
        assert_eq!(titles(&listing.visible().await), vec!["Torta di mele", "Torta salata"]);
        assert!(!listing.can_load_more().await);
    }

    #[tokio::test]
    async fn category_scope_pushes_predicates_down() {
        let scope = ListingScope::Category {
            title: String::from("Primi"),
            gluten_free: Some(true),
            term: None,
        };
        let listing = ResultListing::new(Arc::new(kitchen().await), scope, 10);
        listing.refresh().await;

        assert_eq!(titles(&listing.visible().await), vec!["Risotto allo zafferano"]);

        listing.set_term("pomodoro").await;
        assert!(listing.visible().await.is_empty());
    }

    #[tokio::test]
    async fn category_term_filters_locally() {
        let listing = ResultListing::new(Arc::new(kitchen().await), ListingScope::category("Primi"), 10);
        listing.set_term("risotto").await;

        assert_eq!(titles(&listing.visible().await), vec!["Risotto allo zafferano"]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_results() {
        let store = Arc::new(FlakyStore::new(kitchen().await));
        let listing = ResultListing::new(store.clone(), ListingScope::search("torta"), 10);
        listing.refresh().await;
        assert_eq!(listing.visible().await.len(), 2);

        store.failing.store(true, Ordering::SeqCst);
        listing.set_sort(SortKey::Duration).await;

        assert_eq!(listing.visible().await.len(), 2);
        assert!(!listing.is_loading().await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stale_refresh_is_discarded() {
        let store = DelayedStore::new(kitchen().await, &[500, 10]);
        let listing = ResultListing::new(Arc::new(store), ListingScope::search("torta"), 10);

        tokio::join!(listing.set_sort(SortKey::Popular), async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            listing.set_sort(SortKey::Recent).await;
        });

        assert_eq!(listing.sort().await, SortKey::Recent);
        assert_eq!(titles(&listing.visible().await), vec!["Torta salata", "Torta di mele"]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_listing_ignores_late_pages() {
        let store = DelayedStore::new(kitchen().await, &[200]);
        let listing = ResultListing::new(Arc::new(store), ListingScope::search("torta"), 10);

        tokio::join!(listing.refresh(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            listing.close();
        });

        assert!(listing.visible().await.is_empty());
    }
}
