pub const RECIPE_COUNT_PER_PAGE: usize = 10;
pub const SUGGESTION_COUNT: usize = 10;
pub const MOST_POPULAR_COUNT: usize = 10;
pub const LATEST_RECIPE_COUNT: usize = 10;

pub const SEARCH_DEBOUNCE_MS: u64 = 300;

pub const RECIPES_COLLECTION: &str = "recipes";
pub const CATEGORIES_COLLECTION: &str = "categories";
pub const HASHTAGS_COLLECTION: &str = "hashtags";
pub const USERS_COLLECTION: &str = "users";

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_LIFETIME_HOURS: i64 = 1;

pub const RECIPE_SORT_OPTIONS: &[(&str, &str)] = &[
    ("recent", "Most recent"),
    ("popular", "Most popular"),
    ("duration", "Preparation time"),
];

pub const REVIEW_RATINGS: std::ops::RangeInclusive<u8> = 1..=5;
pub const DIFFICULTY_LEVELS: std::ops::RangeInclusive<u8> = 1..=5;
