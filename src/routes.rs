use std::{convert::Infallible, sync::Arc};

use serde::{Deserialize, Serialize};
use warp::{reject::Rejection, Filter, Reply};

use crate::{
    authentication::{jwt::IdentityClaims, middleware::with_possible_session},
    config::Config,
    database::{
        actions::{
            recipes::{get_recipe, latest_recipes, most_popular},
            reviews::viewer_review,
        },
        error::TypeError,
        schema::{Recipe, Review, SortKey},
        store::{Cursor, DocumentStore},
    },
    search::{
        controller::SortFilterController,
        executor::{normalize_term, QueryExecutor},
        listing::{fetch_page, ListingScope},
        suggestions::Suggestion,
    },
};

#[derive(Debug, Deserialize)]
struct SuggestQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    sort: Option<SortKey>,
    hashtag: Option<String>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    recipes: Vec<Recipe>,
    /// Token for the next page; absent once the listing is exhausted.
    after: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecipeResponse {
    recipe: Recipe,
    viewer_review: Option<Review>,
}

fn reject(e: impl Into<potion::Error>) -> Rejection {
    let e: potion::Error = e.into();
    e.into()
}

fn with_store<S: DocumentStore + 'static>(
    store: Arc<S>,
) -> impl Filter<Extract = (Arc<S>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_value<T: Clone + Send + Sync + 'static>(
    value: T,
) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

pub fn routes<S: DocumentStore + 'static>(
    store: Arc<S>,
    config: &Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret: Arc<str> = Arc::from(config.session_secret.as_str());

    let suggest = warp::path!("suggest")
        .and(warp::get())
        .and(warp::query::<SuggestQuery>())
        .and(with_store(store.clone()))
        .and(with_value(config.suggestion_limit))
        .and_then(suggest_recipes::<S>);

    let search = warp::path!("search")
        .and(warp::get())
        .and(warp::query::<SearchQuery>())
        .and(with_store(store.clone()))
        .and(with_value(config.page_size))
        .and_then(search_recipes::<S>);

    let latest = warp::path!("recipes" / "latest")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_store(store.clone()))
        .and_then(latest::<S>);

    let popular = warp::path!("recipes" / "popular")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_store(store.clone()))
        .and_then(popular::<S>);

    let recipe = warp::path!("recipes" / String)
        .and(warp::get())
        .and(with_possible_session(secret))
        .and(with_store(store))
        .and_then(recipe_details::<S>);

    suggest.or(search).or(latest).or(popular).or(recipe)
}

async fn latest<S: DocumentStore>(
    query: ListQuery,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let recipes = latest_recipes(store.as_ref(), query.limit).await.map_err(reject)?;
    Ok(warp::reply::json(&recipes))
}

async fn popular<S: DocumentStore>(
    query: ListQuery,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let recipes = most_popular(store.as_ref(), query.limit).await.map_err(reject)?;
    Ok(warp::reply::json(&recipes))
}

async fn suggest_recipes<S: DocumentStore>(
    query: SuggestQuery,
    store: Arc<S>,
    limit: usize,
) -> Result<impl Reply, Rejection> {
    let term = normalize_term(&query.q.unwrap_or_default());

    let recipes = QueryExecutor::new(store)
        .execute(&term, Some(limit))
        .await
        .map_err(reject)?;

    let suggestions: Vec<Suggestion> = recipes
        .iter()
        .map(|recipe| Suggestion::from_recipe(recipe, &term))
        .collect();

    Ok(warp::reply::json(&suggestions))
}

async fn search_recipes<S: DocumentStore>(
    query: SearchQuery,
    store: Arc<S>,
    page_size: usize,
) -> Result<impl Reply, Rejection> {
    let scope = ListingScope::search(&query.q.unwrap_or_default());

    let mut controller = SortFilterController::new(query.sort.unwrap_or_default());
    if let Some(hashtag) = query.hashtag.as_deref().filter(|h| !h.is_empty()) {
        controller.toggle_hashtag(hashtag);
    }

    let cursor = match query.after {
        Some(after) => Some(
            serde_json::from_str::<Cursor>(&after)
                .map_err(|_| reject(TypeError::new("Invalid page token")))?,
        ),
        None => None,
    };

    let page = fetch_page(store.as_ref(), &scope, &controller, cursor, page_size)
        .await
        .map_err(reject)?;

    let after = match &page.next {
        Some(next) => Some(serde_json::to_string(next).map_err(|e| {
            log::error!("> Failed to encode page token: {e}");
            reject(TypeError::new("Invalid page token"))
        })?),
        None => None,
    };

    Ok(warp::reply::json(&SearchResponse {
        recipes: page.rows,
        after,
        message: page.message,
    }))
}

async fn recipe_details<S: DocumentStore>(
    recipe_id: String,
    viewer: Option<IdentityClaims>,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let Some(recipe) = get_recipe(store.as_ref(), &recipe_id).await.map_err(reject)? else {
        return Err(warp::reject::not_found());
    };

    let viewer_review = viewer
        .and_then(|viewer| viewer_review(&recipe, &viewer.sub).cloned());

    Ok(warp::reply::json(&RecipeResponse {
        recipe,
        viewer_review,
    }))
}
