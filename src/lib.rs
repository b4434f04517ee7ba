// Library exports for integration tests and reusable components

pub mod auth;
pub mod chapter_name;
pub mod config;
pub mod discover;
pub mod mangadex;
pub mod name_map;
pub mod publish;
pub mod validate;
