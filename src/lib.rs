pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod content_hash;
pub mod error;
pub mod progress;
pub mod registry;
pub mod resource;
pub mod store;
pub mod transfer;
pub mod types;
pub mod ui;
pub mod upload;
pub mod upload_cache;
