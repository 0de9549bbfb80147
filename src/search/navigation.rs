use serde::Serialize;

use crate::database::schema::DocumentId;

/// Where the host should go after a suggestion is chosen or a search submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "to", content = "target", rename_all = "snake_case")]
pub enum Navigation {
    Recipe(DocumentId),
    Search(String),
    Category(String),
}

impl Navigation {
    pub fn path(&self) -> String {
        match self {
            Navigation::Recipe(id) => format!("/recipe/{id}"),
            Navigation::Search(term) => {
                let query = serde_urlencoded::to_string([("q", term.as_str())]).unwrap_or_else(|e| {
                    log::warn!("> Could not encode search term {term:?}: {e}");
                    String::from("q=")
                });
                format!("/search?{query}")
            }
            Navigation::Category(title) => format!("/category/{}", title.to_lowercase()),
        }
    }
}
