pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod live;
pub mod models;
pub mod retention;
pub mod scanner;
pub mod server;
pub mod signal;
pub mod store;
pub mod vision;
