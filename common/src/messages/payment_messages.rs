use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySessionStatus {
    Open,
    Paid,
    Failed,
    Expired,
}

impl fmt::Display for GatewaySessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GatewaySessionStatus::Open => "open",
            GatewaySessionStatus::Paid => "paid",
            GatewaySessionStatus::Failed => "failed",
            GatewaySessionStatus::Expired => "expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCheckout {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    /// Minor units (cents).
    pub amount: u64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCreated {
    pub payment_id: Uuid,
    pub session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutFailed {
    pub payment_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSession {
    pub session_id: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub payment_id: Option<Uuid>,
    pub status: GatewaySessionStatus,
    pub amount: u64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpireSession {
    pub session_id: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompleted {
    pub payment_id: Uuid,
    pub session_id: String,
    pub paid: bool,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::messages::NetworkMessage;
    use super::*;

    #[test]
    fn messages_are_tagged_by_type() {
        let msg = NetworkMessage::ExpireSession(ExpireSession {
            session_id: "cs_test".into(),
        });
        let line = serde_json::to_string(&msg).unwrap();
        assert_eq!(line, r#"{"type":"ExpireSession","session_id":"cs_test"}"#);
    }

    #[test]
    fn status_lines_parse_back() {
        let line = r#"{"type":"SessionStatus","session_id":"cs_1","status":"paid","amount":15000,"currency":"USD"}"#;
        match serde_json::from_str::<NetworkMessage>(line).unwrap() {
            NetworkMessage::SessionStatus(status) => {
                assert_eq!(status.status, GatewaySessionStatus::Paid);
                assert_eq!(status.amount, 15_000);
                assert!(status.payment_id.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
