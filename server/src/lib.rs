pub mod config;
pub mod error;
pub mod messages;
pub mod password;
pub mod restrictions;
pub mod server_acceptor;
pub mod server_actors;
pub mod state;
