mod database {
    pub mod actions {
        pub mod categories;
        pub mod recipes;
        pub mod reviews;
        pub mod tags;
        pub mod users;
    }
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod postgres;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod context;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod search {
    pub mod controller;
    pub mod debounce;
    pub mod executor;
    pub mod highlight;
    pub mod listing;
    pub mod navigation;
    pub mod sequence;
    pub mod suggestions;
}
mod config;
mod constants;
mod routes;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use routes::*;
pub use search::*;
