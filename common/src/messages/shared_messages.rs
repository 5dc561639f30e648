use crate::messages::payment_messages::*;
use actix::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Every message exchanged between the backend and the payment gateway.
///
/// Serialized as one JSON object per line, tagged by `type`.
#[derive(Serialize, Deserialize, Debug, Message, Clone, PartialEq)]
#[serde(tag = "type")]
#[rtype(result = "()")]
pub enum NetworkMessage {
    /// Backend asks the gateway to open a checkout session.
    CreateCheckout(CreateCheckout),
    /// Gateway opened the session.
    CheckoutCreated(CheckoutCreated),
    /// Gateway refused to open the session.
    CheckoutFailed(CheckoutFailed),
    /// Backend asks for the current state of a session.
    GetSession(GetSession),
    /// Reply to `GetSession`.
    SessionStatus(SessionStatus),
    /// Backend voids an open session.
    ExpireSession(ExpireSession),
    /// Gateway reports that the customer finished (or failed) paying.
    SessionCompleted(SessionCompleted),

    /// Local notification that the TCP peer went away. Never sent on the wire.
    ConnectionClosed(ConnectionClosed),
}

#[derive(Serialize, Deserialize, Debug, Message, Clone, PartialEq)]
#[rtype(result = "()")]
pub struct ConnectionClosed {
    pub remote_addr: SocketAddr,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;
