use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{mpsc::UnboundedReceiver, Mutex},
    task::JoinHandle,
};

use super::{
    debounce::Debouncer,
    executor::{normalize_term, QueryExecutor},
    highlight::{highlight, MatchSegment},
    navigation::Navigation,
    sequence::RequestSequence,
};
use crate::{
    config::Config,
    database::{
        schema::{DocumentId, Recipe},
        store::DocumentStore,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: DocumentId,
    pub title: Vec<MatchSegment>,
    pub category: String,
    pub image_url: Option<String>,
}

impl Suggestion {
    pub fn from_recipe(recipe: &Recipe, term: &str) -> Self {
        Self {
            id: recipe.id.to_owned(),
            title: highlight(&recipe.title, term),
            category: recipe.category.to_owned(),
            image_url: recipe.image_url.to_owned(),
        }
    }
}

#[derive(Default)]
struct SuggestionState {
    term: String,
    results: Vec<Recipe>,
}

/// Header autocomplete: bounded search results for the latest term.
pub struct SuggestionBox<S> {
    executor: QueryExecutor<S>,
    limit: usize,
    sequence: RequestSequence,
    state: Mutex<SuggestionState>,
}

impl<S: DocumentStore> SuggestionBox<S> {
    pub fn new(store: Arc<S>, limit: usize) -> Self {
        Self {
            executor: QueryExecutor::new(store),
            limit,
            sequence: RequestSequence::new(),
            state: Mutex::new(SuggestionState::default()),
        }
    }

    /// Runs a search for `term`. Results of superseded searches are dropped;
    /// a failed fetch keeps the previous term and suggestions.
    pub async fn search(&self, term: &str) {
        let stamp = self.sequence.issue();
        let term = normalize_term(term);

        let result = self.executor.execute(&term, Some(self.limit)).await;

        let mut state = self.state.lock().await;
        if !self.sequence.is_current(stamp) {
            log::trace!("> Discarding stale suggestions for \"{term}\"");
            return;
        }

        match result {
            Ok(results) => {
                state.term = term;
                state.results = results;
            }
            Err(e) => log::error!("> Failed to search recipes for \"{term}\": {e}"),
        }
    }

    pub async fn term(&self) -> String {
        self.state.lock().await.term.to_owned()
    }

    pub async fn results(&self) -> Vec<Recipe> {
        self.state.lock().await.results.clone()
    }

    pub async fn suggestions(&self) -> Vec<Suggestion> {
        let state = self.state.lock().await;
        state
            .results
            .iter()
            .map(|recipe| Suggestion::from_recipe(recipe, &state.term))
            .collect()
    }

    pub fn select(&self, id: &str) -> Navigation {
        Navigation::Recipe(id.to_string())
    }

    /// `None` when there is nothing to search for.
    pub async fn submit(&self) -> Option<Navigation> {
        let term = self.term().await;
        if term.is_empty() {
            return None;
        }
        Some(Navigation::Search(term))
    }

    /// Teardown: in-flight searches resolve as no-ops.
    pub fn close(&self) {
        self.sequence.invalidate();
    }
}

/// Feeds debounced terms into `suggestions`, one concurrent search per term.
pub fn spawn_debounced_search<S>(
    suggestions: Arc<SuggestionBox<S>>,
    mut terms: UnboundedReceiver<String>,
) -> JoinHandle<()>
where
    S: DocumentStore + 'static,
{
    tokio::spawn(async move {
        while let Some(term) = terms.recv().await {
            let suggestions = suggestions.clone();
            tokio::spawn(async move { suggestions.search(&term).await });
        }
    })
}

/// Header search pipeline: terms pushed into the returned debouncer reach the
/// suggestion box once typing pauses for `config.search_debounce`.
pub fn debounced_suggestions<S>(
    store: Arc<S>,
    config: &Config,
) -> (Debouncer<String>, Arc<SuggestionBox<S>>, JoinHandle<()>)
where
    S: DocumentStore + 'static,
{
    let suggestions = Arc::new(SuggestionBox::new(store, config.suggestion_limit));
    let (debouncer, terms) = Debouncer::new(config.search_debounce);
    let worker = spawn_debounced_search(suggestions.clone(), terms);

    (debouncer, suggestions, worker)
}
