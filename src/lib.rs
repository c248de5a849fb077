pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod recorder;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod token;
pub mod validation;
