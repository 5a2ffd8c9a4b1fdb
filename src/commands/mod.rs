pub mod attach;
pub mod list_resources;
pub mod utils;
