use std::{env, fmt::Display, str::FromStr, time::Duration};

use rand::{distributions::Alphanumeric, Rng};

use crate::constants::{RECIPE_COUNT_PER_PAGE, SEARCH_DEBOUNCE_MS, SUGGESTION_COUNT};

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub session_secret: String,
    pub search_debounce: Duration,
    pub suggestion_limit: usize,
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            session_secret: generate_secret(),
            search_debounce: Duration::from_millis(SEARCH_DEBOUNCE_MS),
            suggestion_limit: SUGGESTION_COUNT,
            page_size: RECIPE_COUNT_PER_PAGE,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Reads every setting through `lookup`, falling back to the defaults.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let session_secret = lookup("SESSION_SECRET").unwrap_or_else(|| {
            log::warn!("SESSION_SECRET not set, sessions won't survive a restart");
            defaults.session_secret
        });

        Self {
            port: try_load(&lookup, "RECIPE_HUB_PORT", defaults.port),
            database_url: lookup("DATABASE_URL"),
            session_secret,
            search_debounce: Duration::from_millis(try_load(
                &lookup,
                "SEARCH_DEBOUNCE_MS",
                SEARCH_DEBOUNCE_MS,
            )),
            suggestion_limit: try_load(&lookup, "SUGGESTION_LIMIT", defaults.suggestion_limit),
            page_size: try_load(&lookup, "RECIPE_PAGE_SIZE", defaults.page_size),
        }
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(value) = lookup(key) else {
        log::info!("{key} not set, using default: {default}");
        return default;
    };

    value.trim().parse().unwrap_or_else(|e| {
        log::warn!("Invalid {key} value {value:?} ({e}), using default: {default}");
        default
    })
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
