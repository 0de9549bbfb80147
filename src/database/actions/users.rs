use potion::HtmlError;
use serde_json::{json, Value};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::USERS_COLLECTION,
    database::{
        form::FormData,
        schema::User,
        store::{Document, DocumentStore},
    },
};

pub async fn get_user<S: DocumentStore>(
    store: &S,
    user_id: &str,
) -> Result<Option<User>, potion::Error> {
    let document = store.get(USERS_COLLECTION, user_id).await?;

    match document {
        Some(document) => Ok(Some(User::try_from(&document)?)),
        None => Ok(None),
    }
}

fn parse_users(documents: &[Document]) -> Vec<User> {
    documents
        .iter()
        .filter_map(|document| match User::try_from(document) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("> Skipping malformed user {}: {e}", document.id);
                None
            }
        })
        .collect()
}

pub async fn list_users<S: DocumentStore>(
    store: &S,
    session: &SessionData,
) -> Result<Vec<User>, potion::Error> {
    session.authenticate(ActionType::ManageUsers)?;

    let documents = store.list_all(USERS_COLLECTION).await?;
    Ok(parse_users(&documents))
}

pub async fn set_admin<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    user_id: &str,
    admin: bool,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageUsers)?;

    if get_user(store, user_id).await?.is_none() {
        return Err(HtmlError::InvalidRequest.new("User not found"));
    }

    let mut patch = FormData::new();
    patch.insert("admin".into(), Value::Bool(admin));
    store.update(USERS_COLLECTION, user_id, patch).await?;

    log::debug!("> User {user_id} admin flag set to {admin} by {}", session.user_id);
    Ok(())
}

/// Creates the profile document on first use.
pub async fn update_display_name<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    display_name: &str,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(HtmlError::InvalidRequest.new("Display name can't be empty"));
    }

    let mut patch = FormData::new();
    patch.insert("displayName".into(), json!(display_name));

    match store.get(USERS_COLLECTION, &session.user_id).await? {
        Some(_) => store.update(USERS_COLLECTION, &session.user_id, patch).await?,
        None => {
            patch.insert("email".into(), json!(session.email));
            store.set(USERS_COLLECTION, &session.user_id, patch).await?
        }
    }

    Ok(())
}

/// Adds or removes `recipe_id` in the user's denormalized recipe list.
/// A missing profile is left alone.
pub(crate) async fn link_recipe<S: DocumentStore>(
    store: &S,
    user_id: &str,
    recipe_id: &str,
    linked: bool,
) -> Result<(), potion::Error> {
    let Some(user) = get_user(store, user_id).await? else {
        log::warn!("> No profile for {user_id}, recipe {recipe_id} not linked");
        return Ok(());
    };

    let mut recipes = user.recipes;
    recipes.retain(|id| id != recipe_id);
    if linked {
        recipes.push(recipe_id.to_string());
    }

    let mut patch = FormData::new();
    patch.insert("recipes".into(), json!(recipes));
    store.update(USERS_COLLECTION, user_id, patch).await?;
    Ok(())
}
