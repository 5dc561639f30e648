pub mod bimap;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod logger;
pub mod messages;
pub mod network;
pub mod types;
pub mod utils;
