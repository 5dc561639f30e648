pub mod acceptor;
pub mod extractors;
pub mod request_log;
pub mod responses;
pub mod routes;
