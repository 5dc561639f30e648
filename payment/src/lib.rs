pub mod gateway_connection;
pub mod payment;
pub mod payment_acceptor;
pub mod settings;
