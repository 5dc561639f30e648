pub mod payment_messages;
pub mod shared_messages;

pub use payment_messages::*;
pub use shared_messages::*;
