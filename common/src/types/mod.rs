pub mod api;
pub mod booking;
pub mod booking_status;
pub mod covid;
pub mod dashboard;
pub mod payment;
pub mod payment_status;
pub mod service;
pub mod user;
