pub mod access;
pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod navigation;
pub mod permissions;
pub mod routes;
pub mod storage;
pub mod stores;

// Re-export commonly used items for tests
pub use app::create_app;
