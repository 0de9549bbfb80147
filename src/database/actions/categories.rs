use potion::HtmlError;
use serde_json::{json, Value};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::CATEGORIES_COLLECTION,
    database::{
        form::FormData,
        schema::{Category, DocumentId},
        store::DocumentStore,
    },
};

/// Categories ordered by title. Hidden ones are left out unless
/// `include_hidden` is set.
pub async fn list_categories<S: DocumentStore>(
    store: &S,
    include_hidden: bool,
) -> Result<Vec<Category>, potion::Error> {
    let documents = store.list_all(CATEGORIES_COLLECTION).await?;

    let mut list: Vec<Category> = documents
        .iter()
        .filter_map(|document| match Category::try_from(document) {
            Ok(category) => Some(category),
            Err(e) => {
                log::warn!("> Skipping malformed category {}: {e}", document.id);
                None
            }
        })
        .filter(|category| include_hidden || category.show)
        .collect();

    list.sort_by_key(|category| category.title.to_lowercase());
    Ok(list)
}

pub async fn find_category<S: DocumentStore>(
    store: &S,
    title: &str,
) -> Result<Option<Category>, potion::Error> {
    let title = title.trim().to_lowercase();
    let list = list_categories(store, true).await?;

    Ok(list
        .into_iter()
        .find(|category| category.title.to_lowercase() == title))
}

pub async fn create_category<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    title: &str,
    img: Option<&str>,
) -> Result<DocumentId, potion::Error> {
    session.authenticate(ActionType::ManageCategories)?;

    let title = title.trim();
    if title.is_empty() {
        return Err(HtmlError::InvalidRequest.new("Category title can't be empty"));
    }
    if find_category(store, title).await?.is_some() {
        return Err(HtmlError::InvalidRequest.new("Category already exists"));
    }

    let mut fields = FormData::new();
    fields.insert("title".into(), json!(title));
    fields.insert("show".into(), Value::Bool(true));
    if let Some(img) = img {
        fields.insert("img".into(), json!(img));
    }

    let id = store.create(CATEGORIES_COLLECTION, fields).await?;
    log::debug!("> Category {title} created as {id}");
    Ok(id)
}

pub async fn set_category_visibility<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    category_id: &str,
    show: bool,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageCategories)?;

    if store.get(CATEGORIES_COLLECTION, category_id).await?.is_none() {
        return Err(HtmlError::InvalidRequest.new("Category not found"));
    }

    let mut patch = FormData::new();
    patch.insert("show".into(), Value::Bool(show));
    store.update(CATEGORIES_COLLECTION, category_id, patch).await?;
    Ok(())
}

/// Changes the title and/or image of a category. Titles stay unique.
pub async fn update_category<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    category_id: &str,
    title: Option<&str>,
    img: Option<&str>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageCategories)?;

    if store.get(CATEGORIES_COLLECTION, category_id).await?.is_none() {
        return Err(HtmlError::InvalidRequest.new("Category not found"));
    }

    let mut patch = FormData::new();
    if let Some(title) = title.map(str::trim) {
        if title.is_empty() {
            return Err(HtmlError::InvalidRequest.new("Category title can't be empty"));
        }
        if let Some(existing) = find_category(store, title).await? {
            if existing.id != category_id {
                return Err(HtmlError::InvalidRequest.new("Category already exists"));
            }
        }
        patch.insert("title".into(), json!(title));
    }
    if let Some(img) = img {
        patch.insert("img".into(), json!(img));
    }

    store.update(CATEGORIES_COLLECTION, category_id, patch).await?;
    log::debug!("> Category {category_id} updated by {}", session.user_id);
    Ok(())
}

pub async fn delete_category<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    category_id: &str,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageCategories)?;

    store.delete(CATEGORIES_COLLECTION, category_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        actions::users::tests::session,
        store::{Document, MemoryStore},
    };

    async fn menu() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = [
            ("c1", json!({ "title": "Primi", "img": "primi.png" })),
            ("c2", json!({ "title": "dolci", "show": true })),
            ("c3", json!({ "title": "Stagionali", "show": false })),
            ("c4", json!({ "title": "" })),
        ];
        for (id, fields) in rows {
            let fields = fields.as_object().cloned().unwrap();
            store.insert(CATEGORIES_COLLECTION, Document::new(id, fields)).await;
        }
        store
    }

    fn titles(list: &[Category]) -> Vec<&str> {
        list.iter().map(|c| c.title.as_str()).collect()
    }

    #[tokio::test]
    async fn hidden_categories_are_opt_in() {
        let store = menu().await;

        let visible = list_categories(&store, false).await.ok().unwrap_or_default();
        assert_eq!(titles(&visible), vec!["dolci", "Primi"]);

        let all = list_categories(&store, true).await.ok().unwrap_or_default();
        assert_eq!(titles(&all), vec!["dolci", "Primi", "Stagionali"]);
    }

    #[tokio::test]
    async fn categories_are_found_case_insensitively() {
        let store = menu().await;

        let found = find_category(&store, " DOLCI ").await.ok().flatten();
        assert_eq!(found.map(|c| c.id), Some(String::from("c2")));
        assert!(matches!(find_category(&store, "Secondi").await, Ok(None)));
    }

    #[tokio::test]
    async fn admins_curate_categories() {
        let store = menu().await;
        let admin = session("marco", true);

        assert!(create_category(&store, &session("giulia", false), "Secondi", None).await.is_err());
        assert!(create_category(&store, &admin, "primi", None).await.is_err());

        let id = create_category(&store, &admin, "Secondi", None).await.ok().unwrap_or_default();
        assert!(set_category_visibility(&store, &admin, &id, false).await.is_ok());
        let visible = list_categories(&store, false).await.ok().unwrap_or_default();
        assert_eq!(titles(&visible), vec!["dolci", "Primi"]);

        assert!(set_category_visibility(&store, &admin, "missing", true).await.is_err());
        assert!(delete_category(&store, &admin, "c1").await.is_ok());
        assert!(matches!(find_category(&store, "primi").await, Ok(None)));
    }

    #[tokio::test]
    async fn categories_are_edited_in_place() {
        let store = menu().await;
        let admin = session("marco", true);

        let user = session("giulia", false);
        assert!(update_category(&store, &user, "c2", Some("Dolci"), None).await.is_err());
        assert!(update_category(&store, &admin, "c2", Some("PRIMI"), None).await.is_err());
        assert!(update_category(&store, &admin, "c2", Some("  "), None).await.is_err());
        assert!(update_category(&store, &admin, "missing", Some("Secondi"), None).await.is_err());

        assert!(update_category(&store, &admin, "c2", Some(" Dolci "), None).await.is_ok());
        assert!(update_category(&store, &admin, "c1", None, Some("pasta.png")).await.is_ok());

        let all = list_categories(&store, true).await.ok().unwrap_or_default();
        assert_eq!(titles(&all), vec!["Dolci", "Primi", "Stagionali"]);
        let primi = find_category(&store, "primi").await.ok().flatten();
        assert_eq!(primi.and_then(|c| c.img), Some(String::from("pasta.png")));
    }
}
