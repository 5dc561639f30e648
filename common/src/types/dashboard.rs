use crate::types::booking::{BookingDTO, BookingStats};
use crate::types::user::UserDTO;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Landing data for either dashboard. `earnings` is only set for providers.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub user: UserDTO,
    pub stats: BookingStats,
    pub recent_bookings: Vec<BookingDTO>,
    pub earnings: Option<f64>,
}
