pub mod client;
pub mod models;

pub use client::StoreClient;
pub use models::*;
