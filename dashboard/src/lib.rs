pub mod api;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod maps;
pub mod token_refresh;
pub mod view;
