pub mod api_types;
pub mod cache;
pub mod client;
pub mod search;
pub mod types;
