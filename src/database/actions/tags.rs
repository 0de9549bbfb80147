use potion::HtmlError;
use serde_json::json;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::HASHTAGS_COLLECTION,
    database::{
        form::FormData,
        schema::{DocumentId, Hashtag},
        store::DocumentStore,
    },
};

pub async fn list_hashtags<S: DocumentStore>(store: &S) -> Result<Vec<Hashtag>, potion::Error> {
    let documents = store.list_all(HASHTAGS_COLLECTION).await?;

    Ok(documents
        .iter()
        .filter_map(|document| match Hashtag::try_from(document) {
            Ok(hashtag) => Some(hashtag),
            Err(e) => {
                log::warn!("> Skipping malformed hashtag {}: {e}", document.id);
                None
            }
        })
        .collect())
}

/// Case-insensitive title lookup.
pub async fn find_hashtag<S: DocumentStore>(
    store: &S,
    title: &str,
) -> Result<Option<Hashtag>, potion::Error> {
    let title = title.trim().to_lowercase();
    let list = list_hashtags(store).await?;

    Ok(list
        .into_iter()
        .find(|hashtag| hashtag.title.to_lowercase() == title))
}

/// Returns the id of an existing hashtag with the same title instead of
/// creating a duplicate.
pub async fn create_hashtag<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    title: &str,
) -> Result<DocumentId, potion::Error> {
    session.authenticate(ActionType::ManageHashtags)?;

    let title = title.trim();
    if title.is_empty() {
        return Err(HtmlError::InvalidRequest.new("Hashtag can't be empty"));
    }

    if let Some(existing) = find_hashtag(store, title).await? {
        return Ok(existing.id);
    }

    let mut fields = FormData::new();
    fields.insert("title".into(), json!(title));
    let id = store.create(HASHTAGS_COLLECTION, fields).await?;

    log::debug!("> Hashtag {title} created as {id}");
    Ok(id)
}

/// Renames a hashtag. Fails when another hashtag already has the title.
pub async fn rename_hashtag<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    hashtag_id: &str,
    title: &str,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageHashtags)?;

    let title = title.trim();
    if title.is_empty() {
        return Err(HtmlError::InvalidRequest.new("Hashtag can't be empty"));
    }
    if store.get(HASHTAGS_COLLECTION, hashtag_id).await?.is_none() {
        return Err(HtmlError::InvalidRequest.new("Hashtag not found"));
    }
    if let Some(existing) = find_hashtag(store, title).await? {
        if existing.id != hashtag_id {
            return Err(HtmlError::InvalidRequest.new("Hashtag already exists"));
        }
    }

    let mut patch = FormData::new();
    patch.insert("title".into(), json!(title));
    store.update(HASHTAGS_COLLECTION, hashtag_id, patch).await?;

    log::debug!("> Hashtag {hashtag_id} renamed to {title}");
    Ok(())
}

pub async fn delete_hashtag<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    hashtag_id: &str,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageHashtags)?;

    store.delete(HASHTAGS_COLLECTION, hashtag_id).await?;
    Ok(())
}
