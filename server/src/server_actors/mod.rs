pub mod payment_service;
pub mod records;
pub mod session_manager;
pub mod storage;
