pub mod auth;
pub mod credentials;
pub mod error;
pub mod models;
pub mod openapi;
pub mod pages;
pub mod repo;
pub mod routes;
pub mod settings;
pub mod storage; // uploaded files
pub mod store; // JSON collection files

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use settings::Settings;
