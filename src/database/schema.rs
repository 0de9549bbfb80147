use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    error::TypeError,
    form::{Form, FormData},
    store::Document,
};
use crate::constants::{DIFFICULTY_LEVELS, RECIPE_SORT_OPTIONS, REVIEW_RATINGS};

pub type DocumentId = String;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Recent,
    Popular,
    Duration,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Recent, SortKey::Popular, SortKey::Duration];

    /// Document field the store orders by for this key.
    pub fn field(&self) -> &'static str {
        match self {
            SortKey::Recent => "createdAt",
            SortKey::Popular => "rating",
            SortKey::Duration => "preparationTime",
        }
    }

    /// Option value and label from `RECIPE_SORT_OPTIONS`.
    fn option(&self) -> (&'static str, &'static str) {
        RECIPE_SORT_OPTIONS[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.option().0
    }

    pub fn label(&self) -> &'static str {
        self.option().1
    }
}

impl TryFrom<Value> for SortKey {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Some(value) = value.as_str() else {
            return Err(TypeError::new("Failed to parse value as string"));
        };

        Self::ALL
            .into_iter()
            .find(|key| key.name() == value)
            .ok_or(TypeError::new("Invalid variant"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    pub unit: String,
}

impl TryFrom<&Value> for Ingredient {
    type Error = TypeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let data = value
            .as_object()
            .ok_or(TypeError::new("Ingredient is not a map"))?;
        let form = Form::from_data(data);

        Ok(Self {
            name: form.get_str("name")?,
            quantity: form.get_text("quantity").unwrap_or_default(),
            unit: form.get_str("unit").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub uid: String,
    pub display_name: String,
    pub rating: u8,
    pub review: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "uid": self.uid,
            "displayName": self.display_name,
            "rating": self.rating,
            "review": self.review.clone().unwrap_or_default(),
        });
        if let Some(map) = value.as_object_mut() {
            if let Some(created_at) = self.created_at {
                map.insert("createdAt".into(), json!(created_at.to_rfc3339()));
            }
            if let Some(edited_at) = self.edited_at {
                map.insert("editedAt".into(), json!(edited_at.to_rfc3339()));
            }
        }
        value
    }
}

impl TryFrom<&Value> for Review {
    type Error = TypeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let data = value
            .as_object()
            .ok_or(TypeError::new("Review is not a map"))?;
        let form = Form::from_data(data);

        let rating = form.get_number::<u8>("rating")?;
        if !REVIEW_RATINGS.contains(&rating) {
            return Err(TypeError::new("Review rating out of range"));
        }

        Ok(Self {
            uid: form.get_str("uid")?,
            display_name: form.get_str("displayName").unwrap_or_default(),
            rating,
            review: form.get_str("review").ok().filter(|r| !r.is_empty()),
            created_at: form.get_timestamp("createdAt").ok(),
            edited_at: form.get_timestamp("editedAt").ok(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: DocumentId,
    pub title: String,
    pub category: String,
    pub author: String,
    pub author_id: String,
    pub hashtags: Vec<String>,
    pub difficulty: Option<u8>,

    pub rating: Option<f64>,
    pub average_rating: Option<f64>,
    pub rating_count: u32,
    pub total_rating: f64,

    pub gluten_free: bool,
    pub is_proteic: bool,
    pub is_unique: bool,

    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    pub servings: Option<u32>,

    pub preparation_time: Option<String>,
    pub total_time: Option<String>,
    pub rising_time: Option<String>,
    pub sleep_time: Option<String>,

    pub notes: Option<String>,
    pub conservation: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub reviews: Vec<Review>,
}

impl Recipe {
    /// Never fails: absent or malformed fields normalize to empty values.
    pub fn from_document(document: &Document) -> Self {
        let form = Form::from_data(&document.fields);

        let reviews = form
            .get_list("reviews")
            .map(|list| {
                list.iter()
                    .filter_map(|value| match Review::try_from(value) {
                        Ok(review) => Some(review),
                        Err(e) => {
                            log::warn!("> Skipping malformed review on recipe {}: {e}", document.id);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ingredients = form
            .get_list("ingredients")
            .map(|list| {
                list.iter()
                    .filter_map(|value| Ingredient::try_from(value).ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: document.id.to_owned(),
            title: form.get_str("title").unwrap_or_default(),
            category: form.get_str("category").unwrap_or_default(),
            author: form.get_str("author").unwrap_or_default(),
            author_id: form.get_str("author_id").unwrap_or_default(),
            hashtags: form.get_str_list("hashtags").unwrap_or_default(),
            difficulty: form
                .get_number::<u8>("difficulty")
                .ok()
                .filter(|d| DIFFICULTY_LEVELS.contains(d)),
            rating: form.get_f64("rating").ok(),
            average_rating: form.get_f64("averageRating").ok(),
            rating_count: form.get_number("ratingCount").unwrap_or(0),
            total_rating: form.get_f64("totalRating").unwrap_or(0.),
            gluten_free: form.get_bool("glutenFree").unwrap_or(false),
            is_proteic: form.get_bool("isProteic").unwrap_or(false),
            is_unique: form.get_bool("isUnique").unwrap_or(false),
            ingredients,
            steps: form.get_str_list("steps").unwrap_or_default(),
            servings: form.get_number("servings").ok(),
            preparation_time: form.get_text("preparationTime").ok(),
            total_time: form.get_text("totalTime").ok(),
            rising_time: form.get_text("risingTime").ok(),
            sleep_time: form.get_text("sleepTime").ok(),
            notes: form.get_str("notes").ok(),
            conservation: form.get_str("conservation").ok(),
            created_at: form.get_timestamp("createdAt").ok(),
            image_url: form.get_str("imageUrl").ok(),
            reviews,
        }
    }

    /// Rating used for popularity ordering; absent ratings rank as zero.
    pub fn popularity(&self) -> f64 {
        self.rating.or(self.average_rating).unwrap_or(0.)
    }

    pub fn preparation_minutes(&self) -> Option<u64> {
        self.preparation_time
            .as_deref()
            .and_then(super::form::leading_integer)
    }

    /// Parsed value of the field `sort` orders by, as stored in a page cursor.
    pub fn sort_value(&self, sort: SortKey) -> Option<Value> {
        match sort {
            SortKey::Recent => self.created_at.map(|date| json!(date.to_rfc3339())),
            SortKey::Popular => Some(json!(self.popularity())),
            SortKey::Duration => self.preparation_minutes().map(|minutes| json!(minutes)),
        }
    }

    pub fn has_hashtag(&self, hashtag: &str) -> bool {
        self.hashtags.iter().any(|tag| tag == hashtag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: DocumentId,
    pub title: String,
    pub img: Option<String>,
    pub show: bool,
}

impl TryFrom<&Document> for Category {
    type Error = TypeError;

    fn try_from(document: &Document) -> Result<Self, Self::Error> {
        let form = Form::from_data(&document.fields);
        let title = form.get_str("title")?;
        if title.trim().is_empty() {
            return Err(TypeError::new("Empty category title"));
        }

        Ok(Self {
            id: document.id.to_owned(),
            title,
            img: form.get_str("img").ok(),
            show: form.get_bool("show").unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hashtag {
    pub id: DocumentId,
    pub title: String,
}

impl TryFrom<&Document> for Hashtag {
    type Error = TypeError;

    fn try_from(document: &Document) -> Result<Self, Self::Error> {
        let title = Form::from_data(&document.fields).get_str("title")?;
        if title.trim().is_empty() {
            return Err(TypeError::new("Empty hashtag title"));
        }

        Ok(Self {
            id: document.id.to_owned(),
            title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: DocumentId,
    pub uid: Option<i64>,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub admin: bool,
    pub recipes: Vec<DocumentId>,
}

impl User {
    /// Display name, falling back to the username, then the email.
    pub fn visible_name(&self) -> &str {
        [&self.display_name, &self.username, &self.email]
            .into_iter()
            .find(|name| !name.is_empty())
            .map(|name| name.as_str())
            .unwrap_or("User")
    }
}

impl TryFrom<&Document> for User {
    type Error = TypeError;

    fn try_from(document: &Document) -> Result<Self, Self::Error> {
        let form = Form::from_data(&document.fields);

        let username = form.get_str("username").unwrap_or_default();
        let display_name = form.get_str("displayName").unwrap_or_default();
        let email = form.get_str("email").unwrap_or_default();
        if username.is_empty() && display_name.is_empty() && email.is_empty() {
            return Err(TypeError::new("User has no identity fields"));
        }

        Ok(Self {
            id: document.id.to_owned(),
            uid: form.get_number("uid").ok(),
            username,
            display_name,
            email,
            admin: form.get_bool("admin").unwrap_or(false),
            recipes: form.get_str_list("recipes").unwrap_or_default(),
        })
    }
}

/// Field map for a review list plus its rating aggregates.
pub fn rating_fields(reviews: &[Review]) -> FormData {
    let total: u32 = reviews.iter().map(|r| r.rating as u32).sum();
    let count = reviews.len() as u32;
    let average = average_rating(total as f64, count);

    let mut fields = FormData::new();
    fields.insert(
        "reviews".into(),
        Value::Array(reviews.iter().map(Review::to_value).collect()),
    );
    fields.insert("totalRating".into(), json!(total));
    fields.insert("ratingCount".into(), json!(count));
    fields.insert("averageRating".into(), json!(average));
    fields.insert("rating".into(), json!(average));
    fields
}

/// `total / count` rounded to one decimal; `None` without ratings.
pub fn average_rating(total: f64, count: u32) -> Option<f64> {
    if count == 0 {
        return None;
    }
    Some((total / count as f64 * 10.).round() / 10.)
}
