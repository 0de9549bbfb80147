use chrono::Utc;
use potion::HtmlError;
use serde_json::json;

use super::users::link_recipe;
use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::{LATEST_RECIPE_COUNT, MOST_POPULAR_COUNT, RECIPES_COLLECTION},
    database::{
        form::{Form, FormData},
        schema::{rating_fields, DocumentId, Recipe, SortKey},
        store::{DocumentStore, Predicate, StoreQuery},
    },
    search::controller::compare,
};

pub async fn get_recipe<S: DocumentStore>(
    store: &S,
    recipe_id: &str,
) -> Result<Option<Recipe>, potion::Error> {
    let document = store.get(RECIPES_COLLECTION, recipe_id).await?;
    Ok(document.as_ref().map(Recipe::from_document))
}

pub async fn list_recipes<S: DocumentStore>(store: &S) -> Result<Vec<Recipe>, potion::Error> {
    let documents = store.list_all(RECIPES_COLLECTION).await?;
    Ok(documents.iter().map(Recipe::from_document).collect())
}

/// Parsed order of `sort`, ties by id, cut to `limit`.
async fn ordered_recipes<S: DocumentStore>(
    store: &S,
    query: StoreQuery,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<Vec<Recipe>, potion::Error> {
    let documents = store.query(&query).await?;

    let mut recipes: Vec<Recipe> = documents.iter().map(Recipe::from_document).collect();
    recipes.sort_by(|a, b| compare(sort, a, b).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = limit {
        recipes.truncate(limit);
    }
    Ok(recipes)
}

/// Newest recipes, `LATEST_RECIPE_COUNT` unless a limit is given.
pub async fn latest_recipes<S: DocumentStore>(
    store: &S,
    limit: Option<usize>,
) -> Result<Vec<Recipe>, potion::Error> {
    let limit = limit.unwrap_or(LATEST_RECIPE_COUNT);
    ordered_recipes(
        store,
        StoreQuery::collection(RECIPES_COLLECTION),
        SortKey::Recent,
        Some(limit),
    )
    .await
}

pub async fn most_popular<S: DocumentStore>(
    store: &S,
    limit: Option<usize>,
) -> Result<Vec<Recipe>, potion::Error> {
    let limit = limit.unwrap_or(MOST_POPULAR_COUNT);
    ordered_recipes(
        store,
        StoreQuery::collection(RECIPES_COLLECTION),
        SortKey::Popular,
        Some(limit),
    )
    .await
}

/// Newest first.
pub async fn recipes_by_author<S: DocumentStore>(
    store: &S,
    author_id: &str,
) -> Result<Vec<Recipe>, potion::Error> {
    let query =
        StoreQuery::collection(RECIPES_COLLECTION).filter(Predicate::eq("author_id", author_id));

    ordered_recipes(store, query, SortKey::Recent, None).await
}

/// Stores a new recipe attributed to the session user and links it to their
/// profile. The recipe starts without reviews and without an average.
pub async fn create_recipe<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    data: FormData,
) -> Result<DocumentId, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;

    let form = Form::from_data(&data);
    let title = form.get_str("title")?;
    if title.trim().is_empty() {
        return Err(HtmlError::InvalidRequest.new("Recipe title can't be empty"));
    }
    form.get_str("category")?;

    let mut fields = data.to_owned();
    fields.insert("title".into(), json!(title.trim()));
    fields.insert("author".into(), json!(session.display_name));
    fields.insert("author_id".into(), json!(session.user_id));
    fields.insert("createdAt".into(), json!(Utc::now().to_rfc3339()));
    fields.extend(rating_fields(&[]));

    let recipe_id = store.create(RECIPES_COLLECTION, fields).await?;
    link_recipe(store, &session.user_id, &recipe_id, true).await?;

    log::debug!("> Recipe {recipe_id} created by {}", session.user_id);
    Ok(recipe_id)
}

/// Fields only the system writes: attribution, creation time and rating
/// aggregates.
const PROTECTED_FIELDS: &[&str] = &[
    "author",
    "author_id",
    "createdAt",
    "reviews",
    "totalRating",
    "ratingCount",
    "averageRating",
    "rating",
];

/// Merges `patch` into a recipe. Only its author or an admin may edit, and
/// attribution and rating aggregates are never overwritten.
pub async fn update_recipe<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    recipe_id: &str,
    mut patch: FormData,
) -> Result<(), potion::Error> {
    let recipe = get_recipe(store, recipe_id)
        .await?
        .ok_or(HtmlError::InvalidRequest.new("Recipe not found"))?;

    session.authenticate_owner(
        &recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    for field in PROTECTED_FIELDS {
        if patch.remove(*field).is_some() {
            log::warn!("> Ignoring protected field {field} in update of recipe {recipe_id}");
        }
    }

    let form = Form::from_data(&patch);
    let title = match patch.contains_key("title") {
        true => Some(form.get_str("title")?.trim().to_string()),
        false => None,
    };
    if title.as_deref() == Some("") {
        return Err(HtmlError::InvalidRequest.new("Recipe title can't be empty"));
    }
    if patch.contains_key("category") && form.get_str("category")?.trim().is_empty() {
        return Err(HtmlError::InvalidRequest.new("Recipe category can't be empty"));
    }
    if let Some(title) = title {
        patch.insert("title".into(), json!(title));
    }

    store.update(RECIPES_COLLECTION, recipe_id, patch).await?;

    log::debug!("> Recipe {recipe_id} updated by {}", session.user_id);
    Ok(())
}

pub async fn delete_recipe<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    recipe_id: &str,
) -> Result<(), potion::Error> {
    let recipe = get_recipe(store, recipe_id)
        .await?
        .ok_or(HtmlError::InvalidRequest.new("Recipe not found"))?;

    session.authenticate_owner(
        &recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    store.delete(RECIPES_COLLECTION, recipe_id).await?;
    if !recipe.author_id.is_empty() {
        link_recipe(store, &recipe.author_id, recipe_id, false).await?;
    }

    log::debug!("> Recipe {recipe_id} deleted by {}", session.user_id);
    Ok(())
}
