pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod models;
pub mod navigator;
pub mod services;
pub mod session;
pub mod store;
pub mod sync;
pub mod views;
