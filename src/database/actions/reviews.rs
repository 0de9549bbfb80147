use chrono::Utc;
use potion::HtmlError;

use super::recipes::get_recipe;
use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::{RECIPES_COLLECTION, REVIEW_RATINGS},
    database::{
        schema::{rating_fields, Recipe, Review},
        store::DocumentStore,
    },
};

pub fn viewer_review<'a>(recipe: &'a Recipe, viewer_id: &str) -> Option<&'a Review> {
    recipe.reviews.iter().find(|review| review.uid == viewer_id)
}

async fn existing_recipe<S: DocumentStore>(
    store: &S,
    recipe_id: &str,
) -> Result<Recipe, potion::Error> {
    get_recipe(store, recipe_id)
        .await?
        .ok_or_else(|| HtmlError::InvalidRequest.new("Recipe not found"))
}

/// Rewrites the review list together with its aggregates and returns the
/// recipe as stored afterwards.
async fn write_reviews<S: DocumentStore>(
    store: &S,
    recipe_id: &str,
    reviews: &[Review],
) -> Result<Recipe, potion::Error> {
    store
        .update(RECIPES_COLLECTION, recipe_id, rating_fields(reviews))
        .await?;

    existing_recipe(store, recipe_id).await
}

/// Adds the viewer's review, or edits it when one exists.
pub async fn submit_review<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    recipe_id: &str,
    rating: u8,
    text: Option<&str>,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::ManageOwnReviews)?;

    if !REVIEW_RATINGS.contains(&rating) {
        return Err(HtmlError::InvalidRequest.new("Rating must be between 1 and 5"));
    }
    let text = text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let recipe = existing_recipe(store, recipe_id).await?;
    let mut reviews = recipe.reviews;
    let now = Utc::now();

    match reviews.iter_mut().find(|review| review.uid == session.user_id) {
        Some(review) => {
            review.rating = rating;
            review.review = text;
            review.display_name = session.display_name.to_owned();
            review.edited_at = Some(now);
        }
        None => reviews.push(Review {
            uid: session.user_id.to_owned(),
            display_name: session.display_name.to_owned(),
            rating,
            review: text,
            created_at: Some(now),
            edited_at: None,
        }),
    }

    log::debug!("> Review on {recipe_id} saved by {}", session.user_id);
    write_reviews(store, recipe_id, &reviews).await
}

pub async fn delete_review<S: DocumentStore>(
    store: &S,
    session: &SessionData,
    recipe_id: &str,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::ManageOwnReviews)?;

    let recipe = existing_recipe(store, recipe_id).await?;
    if viewer_review(&recipe, &session.user_id).is_none() {
        return Err(HtmlError::InvalidRequest.new("No review to delete"));
    }

    let mut reviews = recipe.reviews;
    reviews.retain(|review| review.uid != session.user_id);

    log::debug!("> Review on {recipe_id} deleted by {}", session.user_id);
    write_reviews(store, recipe_id, &reviews).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{
            actions::{recipes::list_recipes, users::tests::session},
            schema::SortKey,
        },
        search::{controller::SortFilterController, executor::tests::kitchen},
    };

    fn reviewed(result: Result<Recipe, potion::Error>) -> Recipe {
        match result {
            Ok(recipe) => recipe,
            Err(_) => panic!("review action failed"),
        }
    }

    #[tokio::test]
    async fn reviews_update_aggregates() {
        let store = kitchen().await;

        let anna = session("anna", false);
        let bruno = session("bruno", false);

        reviewed(submit_review(&store, &anna, "r3", 4, Some("  Ottima ")).await);
        let recipe = reviewed(submit_review(&store, &bruno, "r3", 5, None).await);

        assert_eq!(recipe.rating_count, 2);
        assert_eq!(recipe.total_rating, 9.);
        assert_eq!(recipe.average_rating, Some(4.5));
        assert_eq!(recipe.rating, Some(4.5));
        assert_eq!(
            viewer_review(&recipe, "anna").and_then(|r| r.review.as_deref()),
            Some("Ottima")
        );
    }

    #[tokio::test]
    async fn resubmitting_edits_the_existing_review() {
        let store = kitchen().await;
        let anna = session("anna", false);

        submit_review(&store, &anna, "r3", 2, None).await.ok();
        let recipe = reviewed(submit_review(&store, &anna, "r3", 5, Some("Meglio")).await);

        assert_eq!(recipe.reviews.len(), 1);
        let review = viewer_review(&recipe, "anna").cloned();
        assert!(matches!(review, Some(r) if r.rating == 5 && r.edited_at.is_some()));
        assert_eq!(recipe.average_rating, Some(5.));
    }

    #[tokio::test]
    async fn deleting_the_last_review_clears_the_rating() {
        let store = kitchen().await;
        let anna = session("anna", false);

        submit_review(&store, &anna, "r3", 3, None).await.ok();
        let recipe = reviewed(delete_review(&store, &anna, "r3").await);

        assert!(recipe.reviews.is_empty());
        assert_eq!(recipe.rating, None);
        assert_eq!(recipe.rating_count, 0);
        assert!(delete_review(&store, &anna, "r3").await.is_err());
    }

    #[tokio::test]
    async fn invalid_reviews_are_rejected() {
        let store = kitchen().await;
        let anna = session("anna", false);

        assert!(submit_review(&store, &anna, "r3", 0, None).await.is_err());
        assert!(submit_review(&store, &anna, "r3", 6, None).await.is_err());
        assert!(submit_review(&store, &anna, "missing", 4, None).await.is_err());
    }

    #[tokio::test]
    async fn reviews_feed_popularity_ordering() {
        let store = kitchen().await;
        submit_review(&store, &session("anna", false), "r5", 5, None).await.ok();

        let recipes = list_recipes(&store).await.ok().unwrap_or_default();
        let view = SortFilterController::new(SortKey::Popular).apply(&recipes);
        assert_eq!(view[0].title, "Insalata estiva");
    }
}
