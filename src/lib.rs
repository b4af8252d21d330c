pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod oinks;
pub mod state;
pub mod store;
pub mod tokens;
pub mod tx;
pub mod users;
