pub mod auth;
pub mod cli;
pub mod config;
pub mod export;
pub mod gmail_api;
pub mod types;
