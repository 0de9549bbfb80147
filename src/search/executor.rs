use std::sync::Arc;

use crate::{
    constants::RECIPES_COLLECTION,
    database::{error::QueryError, schema::Recipe, store::DocumentStore},
};

/// Case-insensitive substring match on title, category, author or any hashtag.
/// `term_lower` must already be lowercase.
pub fn matches(recipe: &Recipe, term_lower: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(term_lower);

    contains(&recipe.title)
        || contains(&recipe.category)
        || contains(&recipe.author)
        || recipe.hashtags.iter().any(|tag| contains(tag))
}

/// Keeps the recipes matching `term`, in their original order.
pub fn filter_recipes(recipes: Vec<Recipe>, term: &str) -> Vec<Recipe> {
    let term_lower = term.trim().to_lowercase();

    recipes
        .into_iter()
        .filter(|recipe| matches(recipe, &term_lower))
        .collect()
}

pub fn normalize_term(term: &str) -> String {
    term.trim().to_string()
}

/// Runs free-text recipe searches against the store.
pub struct QueryExecutor<S> {
    store: Arc<S>,
}

impl<S> Clone for QueryExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DocumentStore> QueryExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// An empty term yields no results without touching the store.
    pub async fn execute(&self, term: &str, limit: Option<usize>) -> Result<Vec<Recipe>, QueryError> {
        let term = normalize_term(term);
        if term.is_empty() {
            return Ok(vec![]);
        }

        let documents = self.store.list_all(RECIPES_COLLECTION).await?;
        let recipes = documents.iter().map(Recipe::from_document).collect();

        let mut matched = filter_recipes(recipes, &term);
        if let Some(limit) = limit {
            matched.truncate(limit);
        }

        log::debug!("> Search \"{term}\" matched {} recipes", matched.len());
        Ok(matched)
    }
}
