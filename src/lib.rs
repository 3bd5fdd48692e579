pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod images;
pub mod index;
pub mod server;
pub mod store;
